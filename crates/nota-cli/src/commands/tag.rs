//! Tag command handlers

use anyhow::{Context, Result};

use nota_core::Workspace;

use crate::output::Output;

/// List all tags with usage counts
pub fn list(workspace: &Workspace, repo: &str, output: &Output) -> Result<()> {
    let index = workspace
        .repository(repo)
        .ok_or_else(|| anyhow::anyhow!("Unknown repository: {}", repo))?;

    output.print_tags(&index.tag_counts());
    Ok(())
}

/// Rename a tag on every note carrying it
pub fn rename(
    workspace: &mut Workspace,
    repo: &str,
    from: String,
    to: String,
    output: &Output,
) -> Result<()> {
    workspace
        .rename_tag(repo, &from, &to)
        .context("Failed to rename tag")?;

    output.success(&format!("Renamed tag {} to {}", from, to));
    Ok(())
}

/// Remove a tag from every note carrying it
pub fn delete(workspace: &mut Workspace, repo: &str, tag: String, output: &Output) -> Result<()> {
    workspace
        .delete_tag(repo, &tag)
        .context("Failed to delete tag")?;

    output.success(&format!("Deleted tag {}", tag));
    Ok(())
}
