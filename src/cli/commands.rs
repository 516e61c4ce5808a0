//! CLI command implementations
//!
//! Both commands load the same configuration and open the same store;
//! `serve` puts the engine behind HTTP, `query` runs exactly one envelope.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::engine::Engine;
use crate::http_server::DataServer;
use crate::observability::{init_logging, LogFormat};
use crate::store::SqliteStore;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_json};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            port,
            log_format,
        } => {
            init_logging(log_format);
            serve(&config, port)
        }
        Command::Query { config } => {
            init_logging(LogFormat::Text);
            query(&config)
        }
    }
}

/// Load the configuration, applying a port override
pub fn load_config(config_path: &Path, port: Option<u16>) -> CliResult<ServiceConfig> {
    let mut config = ServiceConfig::load(config_path)?;
    if let Some(port) = port {
        config.port = port;
        config.validate()?;
    }
    Ok(config)
}

/// Start the HTTP data server and block until shutdown
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let config = load_config(config_path, port)?;
    let store = Arc::new(SqliteStore::from_config(&config.database)?);

    tracing::info!(
        host = %config.host,
        port = config.port,
        table = %config.table.name,
        database = %config.database.path.display(),
        "starting data server"
    );

    let server = DataServer::new(config, store);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Execute a single request from stdin and print the response envelope
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path, None)?;
    let store = Arc::new(SqliteStore::from_config(&config.database)?);

    let stdin = io::stdin();
    let stdout = io::stdout();
    query_with(&config, store, &mut stdin.lock(), &mut stdout.lock())
}

/// Run one request read from `input` and write its envelope to `output`.
///
/// A Failed envelope is still a successful command run.
pub fn query_with<R: Read, W: Write>(
    config: &ServiceConfig,
    store: Arc<SqliteStore>,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let request = read_request(input)?;
    let engine = Engine::new(config.table.clone(), store);
    let (_, envelope) = engine.respond(&request);
    write_json(output, &envelope.to_json())
}
