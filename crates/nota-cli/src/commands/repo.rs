//! Repository command handlers

use anyhow::{Context, Result};

use nota_core::Workspace;

use crate::output::Output;

/// List repositories with their note counts
pub fn list(workspace: &Workspace, output: &Output) -> Result<()> {
    let repositories: Vec<(String, usize)> = workspace
        .index()
        .repositories
        .iter()
        .map(|(name, index)| (name.clone(), index.notes.len()))
        .collect();

    output.print_repositories(&repositories);
    Ok(())
}

/// Create a new repository
pub fn create(workspace: &mut Workspace, name: String, output: &Output) -> Result<()> {
    workspace
        .create_repository(&name)
        .context("Failed to create repository")?;

    output.success(&format!("Created repository {}", name));
    Ok(())
}
