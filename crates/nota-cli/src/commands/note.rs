//! Note command handlers

use anyhow::{bail, Context, Result};

use nota_core::{Note, NoteDraft, NotePatch, RepositoryIndex, Workspace};

use crate::output::{short_id, Output};

/// Create a new note
pub fn create(
    workspace: &mut Workspace,
    repo: &str,
    content: String,
    title: Option<String>,
    tags: Vec<String>,
    folder: Option<String>,
    output: &Output,
) -> Result<()> {
    let note = workspace
        .create_note(
            repo,
            NoteDraft {
                title,
                content,
                tags,
                folder,
            },
        )
        .context("Failed to create note")?;

    if output.is_quiet() || output.is_json() {
        output.print_note(&note);
    } else {
        output.success(&format!(
            "Created note {} in {}",
            short_id(&note.id),
            note.folder
        ));
    }
    Ok(())
}

/// List notes, optionally filtered by folder or tag
pub fn list(
    workspace: &Workspace,
    repo: &str,
    folder: Option<String>,
    tag: Option<String>,
    output: &Output,
) -> Result<()> {
    let index = repository(workspace, repo)?;

    let notes: Vec<&Note> = match (&folder, &tag) {
        (Some(path), None) => index.notes_in_folder(path),
        (None, Some(tag)) => index.notes_with_tag(tag),
        (None, None) => index.notes.values().collect(),
        (Some(_), Some(_)) => bail!("Filter by either --folder or --tag, not both"),
    };

    output.print_notes(&notes);
    Ok(())
}

/// Show a note's full details
pub fn show(workspace: &Workspace, repo: &str, id: String, output: &Output) -> Result<()> {
    let index = repository(workspace, repo)?;
    let note_id = resolve_note_id(index, &id)?;

    // resolve_note_id only returns IDs present in the index
    let note = index.note(&note_id).unwrap();
    output.print_note(note);
    Ok(())
}

/// Apply a partial update to a note
pub fn edit(
    workspace: &mut Workspace,
    repo: &str,
    id: String,
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    folder: Option<String>,
    output: &Output,
) -> Result<()> {
    if title.is_none() && content.is_none() && tags.is_none() && folder.is_none() {
        bail!("Nothing to change. Pass at least one of --title, --content, --tag, --folder.");
    }

    let note_id = resolve_note_id(repository(workspace, repo)?, &id)?;
    let note = workspace
        .update_note(
            repo,
            &note_id,
            NotePatch {
                title,
                preview: None,
                content,
                tags,
                folder,
            },
        )
        .context("Failed to update note")?;

    output.success(&format!("Updated note {}", short_id(&note.id)));
    Ok(())
}

/// Move a note to another folder
pub fn move_note(
    workspace: &mut Workspace,
    repo: &str,
    id: String,
    folder: String,
    output: &Output,
) -> Result<()> {
    let note_id = resolve_note_id(repository(workspace, repo)?, &id)?;
    let note = workspace
        .update_note(
            repo,
            &note_id,
            NotePatch {
                folder: Some(folder),
                ..Default::default()
            },
        )
        .context("Failed to move note")?;

    output.success(&format!("Moved note {} to {}", short_id(&note.id), note.folder));
    Ok(())
}

/// Delete a note
pub fn delete(workspace: &mut Workspace, repo: &str, id: String, output: &Output) -> Result<()> {
    let note_id = resolve_note_id(repository(workspace, repo)?, &id)?;
    workspace
        .delete_note(repo, &note_id)
        .context("Failed to delete note")?;

    output.success(&format!("Deleted note {}", short_id(&note_id)));
    Ok(())
}

fn repository<'a>(workspace: &'a Workspace, repo: &str) -> Result<&'a RepositoryIndex> {
    workspace
        .repository(repo)
        .ok_or_else(|| anyhow::anyhow!("Unknown repository: {}", repo))
}

/// Resolve a note ID (supports full ID or hex prefix)
fn resolve_note_id(index: &RepositoryIndex, input: &str) -> Result<String> {
    let full = if input.starts_with("note:") {
        input.to_string()
    } else {
        format!("note:{}", input)
    };
    if index.note(&full).is_some() {
        return Ok(full);
    }

    // Try prefix match
    let prefix = input.strip_prefix("note:").unwrap_or(input);
    let matches: Vec<&Note> = index
        .notes
        .values()
        .filter(|n| n.id.strip_prefix("note:").unwrap_or(&n.id).starts_with(prefix))
        .collect();

    match matches.len() {
        0 => bail!("No note found matching: {}", input),
        1 => Ok(matches[0].id.clone()),
        _ => {
            eprintln!("Multiple notes match '{}':", input);
            for note in &matches {
                eprintln!("  {} - {}", short_id(&note.id), note.meta.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
