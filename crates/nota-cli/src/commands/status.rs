//! Status command handler

use anyhow::Result;

use nota_core::Workspace;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(workspace: &Workspace, output: &Output) -> Result<()> {
    let config = workspace.config();

    match output.format {
        OutputFormat::Json => {
            let repositories: Vec<serde_json::Value> = workspace
                .index()
                .repositories
                .iter()
                .map(|(name, index)| {
                    serde_json::json!({
                        "name": name,
                        "notes": index.notes.len(),
                        "folders": index.folders.len(),
                        "tags": index.tags.len(),
                    })
                })
                .collect();

            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "default_repository": config.default_repository,
                    "repositories": repositories,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("nota Status");
            println!("===========");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Default repository: {}", config.default_repository);
            println!();
            println!("Repositories:");
            for (name, index) in &workspace.index().repositories {
                println!(
                    "  {}: {} note(s), {} folder(s), {} tag(s)",
                    name,
                    index.notes.len(),
                    index.folders.len(),
                    index.tags.len()
                );
            }
        }
    }

    Ok(())
}
