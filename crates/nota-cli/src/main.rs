//! nota CLI
//!
//! Command-line interface for nota - local-first hierarchical notes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nota_core::Workspace;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "nota")]
#[command(about = "nota - local-first hierarchical notes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Repository to operate on (defaults to the configured default)
    #[arg(short, long, global = true)]
    repo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Manage repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Show status (repositories, counts, storage location)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Create a new note
    #[command(alias = "add")]
    Create {
        /// Note content
        content: String,
        /// Note title (defaults to the first content line)
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Folder path (defaults to /Notes)
        #[arg(short, long)]
        folder: Option<String>,
    },
    /// List notes
    #[command(alias = "ls")]
    List {
        /// Filter by folder path
        #[arg(short, long)]
        folder: Option<String>,
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Show note details
    Show {
        /// Note ID (full or hex prefix)
        id: String,
    },
    /// Edit a note
    Edit {
        /// Note ID (full or hex prefix)
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New content
        #[arg(short, long)]
        content: Option<String>,
        /// Replace the full tag set
        #[arg(short, long)]
        tag: Option<Vec<String>>,
        /// Move to folder
        #[arg(short, long)]
        folder: Option<String>,
    },
    /// Move a note to another folder
    #[command(alias = "mv")]
    Move {
        /// Note ID (full or hex prefix)
        id: String,
        /// Target folder path
        folder: String,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID (full or hex prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Create a folder
    #[command(alias = "add")]
    Create {
        /// Folder path, e.g. /Work
        path: String,
    },
    /// List folders with note counts
    #[command(alias = "ls")]
    List,
    /// Delete a folder and every note it contains
    #[command(alias = "rm")]
    Delete {
        /// Folder path
        path: String,
    },
    /// Rename a folder, carrying its notes along
    #[command(alias = "mv")]
    Rename {
        /// Current folder path
        from: String,
        /// New folder path
        to: String,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// List tags with usage counts
    #[command(alias = "ls")]
    List,
    /// Rename a tag on every note carrying it
    #[command(alias = "mv")]
    Rename {
        /// Current tag name
        from: String,
        /// New tag name
        to: String,
    },
    /// Remove a tag from every note carrying it
    #[command(alias = "rm")]
    Delete {
        /// Tag name
        tag: String,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// List repositories
    #[command(alias = "ls")]
    List,
    /// Create a new repository
    #[command(alias = "add")]
    Create {
        /// Repository name
        name: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, default_repository)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the workspace
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let mut workspace = Workspace::open()?;
    let repo = cli
        .repo
        .unwrap_or_else(|| workspace.config().default_repository.clone());
    tracing::debug!(repository = %repo, "workspace ready");

    match cli.command {
        Commands::Note { command } => handle_note_command(command, &mut workspace, &repo, &output),
        Commands::Folder { command } => {
            handle_folder_command(command, &mut workspace, &repo, &output)
        }
        Commands::Tag { command } => handle_tag_command(command, &mut workspace, &repo, &output),
        Commands::Repo { command } => handle_repo_command(command, &mut workspace, &output),
        Commands::Status => commands::status::show(&workspace, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_note_command(
    command: NoteCommands,
    workspace: &mut Workspace,
    repo: &str,
    output: &Output,
) -> Result<()> {
    match command {
        NoteCommands::Create {
            content,
            title,
            tag,
            folder,
        } => commands::note::create(workspace, repo, content, title, tag, folder, output),
        NoteCommands::List { folder, tag } => {
            commands::note::list(workspace, repo, folder, tag, output)
        }
        NoteCommands::Show { id } => commands::note::show(workspace, repo, id, output),
        NoteCommands::Edit {
            id,
            title,
            content,
            tag,
            folder,
        } => commands::note::edit(workspace, repo, id, title, content, tag, folder, output),
        NoteCommands::Move { id, folder } => {
            commands::note::move_note(workspace, repo, id, folder, output)
        }
        NoteCommands::Delete { id } => commands::note::delete(workspace, repo, id, output),
    }
}

fn handle_folder_command(
    command: FolderCommands,
    workspace: &mut Workspace,
    repo: &str,
    output: &Output,
) -> Result<()> {
    match command {
        FolderCommands::Create { path } => commands::folder::create(workspace, repo, path, output),
        FolderCommands::List => commands::folder::list(workspace, repo, output),
        FolderCommands::Delete { path } => commands::folder::delete(workspace, repo, path, output),
        FolderCommands::Rename { from, to } => {
            commands::folder::rename(workspace, repo, from, to, output)
        }
    }
}

fn handle_tag_command(
    command: TagCommands,
    workspace: &mut Workspace,
    repo: &str,
    output: &Output,
) -> Result<()> {
    match command {
        TagCommands::List => commands::tag::list(workspace, repo, output),
        TagCommands::Rename { from, to } => commands::tag::rename(workspace, repo, from, to, output),
        TagCommands::Delete { tag } => commands::tag::delete(workspace, repo, tag, output),
    }
}

fn handle_repo_command(
    command: RepoCommands,
    workspace: &mut Workspace,
    output: &Output,
) -> Result<()> {
    match command {
        RepoCommands::List => commands::repo::list(workspace, output),
        RepoCommands::Create { name } => commands::repo::create(workspace, name, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
