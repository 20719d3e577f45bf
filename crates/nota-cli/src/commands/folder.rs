//! Folder command handlers

use anyhow::{Context, Result};

use nota_core::Workspace;

use crate::output::Output;

/// Create a folder (no-op with a fresh revision if it already exists)
pub fn create(workspace: &mut Workspace, repo: &str, path: String, output: &Output) -> Result<()> {
    let folder = workspace
        .upsert_folder(repo, &path)
        .context("Failed to create folder")?;

    output.success(&format!("Created folder {}", folder.path));
    Ok(())
}

/// List folders with their note counts
pub fn list(workspace: &Workspace, repo: &str, output: &Output) -> Result<()> {
    let index = workspace
        .repository(repo)
        .ok_or_else(|| anyhow::anyhow!("Unknown repository: {}", repo))?;

    let folders: Vec<(String, usize)> = index
        .folders
        .iter()
        .map(|(path, entry)| (path.clone(), entry.notes.len()))
        .collect();

    output.print_folders(&folders);
    Ok(())
}

/// Delete a folder and every note it contains
pub fn delete(workspace: &mut Workspace, repo: &str, path: String, output: &Output) -> Result<()> {
    let contained = workspace
        .repository(repo)
        .and_then(|index| index.folders.get(&path))
        .map(|entry| entry.notes.len())
        .unwrap_or(0);

    workspace
        .delete_folder(repo, &path)
        .context("Failed to delete folder")?;

    output.success(&format!(
        "Deleted folder {} and {} contained note(s)",
        path, contained
    ));
    Ok(())
}

/// Rename a folder, carrying its notes along
pub fn rename(
    workspace: &mut Workspace,
    repo: &str,
    from: String,
    to: String,
    output: &Output,
) -> Result<()> {
    workspace
        .rename_folder(repo, &from, &to)
        .context("Failed to rename folder")?;

    output.success(&format!("Renamed folder {} to {}", from, to));
    Ok(())
}
