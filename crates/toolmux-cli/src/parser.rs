//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the tool-server multiplexer.
#[derive(Parser)]
#[command(name = "toolmux")]
#[command(about = "Supervise MCP tool servers and run their tools")]
#[command(version)]
pub struct Cli {
    /// Path to the servers configuration file
    #[arg(
        short = 'c',
        long = "config",
        env = "TOOLMUX_CONFIG",
        default_value = "toolmux.json",
        global = true
    )]
    pub config: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
