//! CLI argument definitions using clap
//!
//! Commands:
//! - dataserv serve --config <path> [--port <n>] [--log-format text|json]
//! - dataserv query --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// dataserv - JSON action endpoint over a single relational table
#[derive(Parser, Debug)]
#[command(name = "dataserv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP data server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./dataserv.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,

        /// Log output format
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },

    /// Run one request envelope from stdin and print the response envelope
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./dataserv.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args() {
        let cli = Cli::try_parse_from([
            "dataserv",
            "serve",
            "--config",
            "svc.json",
            "--port",
            "9000",
            "--log-format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Command::Serve {
                config,
                port,
                log_format,
            } => {
                assert_eq!(config, PathBuf::from("svc.json"));
                assert_eq!(port, Some(9000));
                assert_eq!(log_format, LogFormat::Json);
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_query_defaults() {
        let cli = Cli::try_parse_from(["dataserv", "query"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Query { config } if config == PathBuf::from("./dataserv.json")
        ));
    }
}
