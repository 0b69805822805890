//! Grabador CLI library
//!
//! Command-line interface for the Grabar session-to-test pipeline.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod commands;
mod config;
mod error;
/// Command handlers
pub mod handlers;
mod output;

pub use commands::{
    BrowserArg, CleanArgs, Cli, ColorArg, Commands, GenerateArgs, LibraryArgs, ParamsArgs, RunArgs,
};
pub use config::{init_tracing, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
