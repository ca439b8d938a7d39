use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "todome")]
#[command(about = "Offline-first notes and todos from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Owner id for new records (defaults to TODOME_USER_ID or "local")
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connectivity, pending changes, and pull cursors
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List changes waiting to be pushed
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending changes, then pull remote changes
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending changes only
    Push,
    /// Manage todos
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Push periodically until interrupted
    Watch {
        /// Seconds between pushes (defaults to TODOME_PUSH_INTERVAL_SECS or 30)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Forget pull cursors so the next sync fetches everything
    ResetCursors,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TodoCommands {
    /// Create a todo
    #[command(alias = "new")]
    Add {
        /// Todo title
        title: Vec<String>,
        /// Priority from 1 (highest) to 4
        #[arg(short, long)]
        priority: Option<u8>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Mark a todo completed
    Done {
        /// Todo ID or unique ID prefix
        id: String,
    },
    /// Delete a todo
    #[command(alias = "delete")]
    Rm {
        /// Todo ID or unique ID prefix
        id: String,
    },
    /// List todos
    List {
        /// Only show todos with this status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        /// Pull from the remote before listing
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Create a note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: Vec<String>,
        /// Plain text body
        #[arg(short, long)]
        body: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// List notes
    List {
        /// Only show notes carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Pull from the remote before listing
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
