#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary target.
use dotenvy as _;
use tokio as _;

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, bootstrap, init_tracing};
pub use commands::Commands;
pub use config::CliConfig;
pub use error::CliError;
pub use parser::Cli;
