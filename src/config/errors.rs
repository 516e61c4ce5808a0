//! Configuration errors

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the service configuration.
///
/// All of them are fatal at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A table or column name is not a plain SQL identifier
    #[error("Invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),

    /// The column allow-list is empty
    #[error("table.columns must list at least one column")]
    NoColumns,

    /// A column appears twice in the allow-list
    #[error("Duplicate column '{0}' in table.columns")]
    DuplicateColumn(String),

    /// A key column is missing from the allow-list
    #[error("Key column '{0}' is not listed in table.columns")]
    UnknownKeyColumn(String),

    /// Any other out-of-range setting
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}
