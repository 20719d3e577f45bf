//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use nota_core::Note;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is in JSON mode
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a success message (suppressed in quiet mode)
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json | OutputFormat::Quiet => {}
        }
    }

    /// Print a single note with full details
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", note.id);
                println!("Title:   {}", note.meta.title);
                println!("Folder:  {}", note.folder);
                if !note.tags.is_empty() {
                    println!("Tags:    {}", note.tags.join(", "));
                }
                println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M"));
                println!();
                println!("{}", note.content);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(note).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", note.id);
            }
        }
    }

    /// Print a list of notes
    pub fn print_notes(&self, notes: &[&Note]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes found.");
                    return;
                }
                for note in notes {
                    let tags = if note.tags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", note.tags.join(", "))
                    };
                    println!(
                        "{} | {} | {}{}",
                        short_id(&note.id),
                        truncate(&note.meta.title, 35),
                        note.folder,
                        tags
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(notes).unwrap());
            }
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Print folders with their note counts
    pub fn print_folders(&self, folders: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if folders.is_empty() {
                    println!("No folders found.");
                    return;
                }
                for (path, count) in folders {
                    println!("{} ({})", path, count);
                }
            }
            OutputFormat::Json => {
                let value: Vec<serde_json::Value> = folders
                    .iter()
                    .map(|(path, count)| serde_json::json!({ "path": path, "notes": count }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value).unwrap());
            }
            OutputFormat::Quiet => {
                for (path, _) in folders {
                    println!("{}", path);
                }
            }
        }
    }

    /// Print tags with usage counts
    pub fn print_tags(&self, tags: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
            }
            OutputFormat::Json => {
                let value: Vec<serde_json::Value> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({ "name": name, "count": count }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value).unwrap());
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print repositories with their note counts
    pub fn print_repositories(&self, repositories: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                for (name, count) in repositories {
                    println!("{} ({} notes)", name, count);
                }
            }
            OutputFormat::Json => {
                let value: Vec<serde_json::Value> = repositories
                    .iter()
                    .map(|(name, count)| serde_json::json!({ "name": name, "notes": count }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value).unwrap());
            }
            OutputFormat::Quiet => {
                for (name, _) in repositories {
                    println!("{}", name);
                }
            }
        }
    }
}

/// Shorten a note ID for list output
pub fn short_id(id: &str) -> &str {
    let hex = id.strip_prefix("note:").unwrap_or(id);
    &hex[..hex.len().min(8)]
}

/// Truncate a string, appending an ellipsis when shortened
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let shortened: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", shortened)
    }
}
