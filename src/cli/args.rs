//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Terminal-resident monitor for Claude rate-limit windows.
#[derive(Parser, Debug)]
#[command(name = "quotapane")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Credential file to use instead of the normal resolution chain
    #[arg(long, value_name = "PATH", global = true)]
    pub credentials_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitor loop in the current pane (default)
    Run(RunArgs),

    /// Fetch and print a single usage summary
    Status(StatusArgs),

    /// Create the monitor pane and start the monitor inside it
    Open(OpenArgs),

    /// Move the monitor pane to another position
    Move(MoveArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub interval: u64,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `open` command.
#[derive(Parser, Debug)]
pub struct OpenArgs {
    /// Pane position (top, bottom, left, right)
    #[arg(long, value_name = "POSITION", default_value = "bottom")]
    pub position: String,

    /// Poll interval in seconds for the monitor started in the pane
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub interval: u64,
}

/// Arguments for the `move` command.
#[derive(Parser, Debug)]
pub struct MoveArgs {
    /// Destination position (top, bottom, left, right)
    #[arg(long, value_name = "POSITION")]
    pub to: String,

    /// Monitor pane id (%N); discovered by title when omitted
    #[arg(long, value_name = "PANE_ID")]
    pub pane: Option<String>,
}
