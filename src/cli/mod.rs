//! CLI module for dataserv
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP data server
//! - query: One-shot request execution from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{load_config, query, query_with, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_json};
