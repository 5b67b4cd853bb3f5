//! Available subcommands.

use clap::Subcommand;

/// Every command connects the configured servers, runs, and shuts them down.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the connection status of every configured server
    Status,

    /// List the tools exposed by connected servers
    Tools {
        /// Only list tools of this server id
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Check arguments against a tool's schema without calling it
    Validate {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Call a tool and print its output
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// Record the call in this conversation session
        #[arg(short, long)]
        session: Option<String>,
    },
}
