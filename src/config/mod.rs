//! Service configuration
//!
//! One JSON document loaded at start-up. It names the table the engine
//! operates on, the column allow-list that every request identifier is
//! checked against, where the database lives and how the HTTP listener
//! binds.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8082)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Target table and its allow-listed columns (required)
    pub table: TableConfig,

    /// Upper bound for a single request's store work, in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// CORS allowed origins for preflight handling (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file, ":memory:" for a private in-memory database
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// The single table served by this instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Columns requests may reference
    pub columns: Vec<String>,

    /// Columns allowed to identify a row for update/delete (empty = any column)
    #[serde(default)]
    pub key_columns: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl ServiceConfig {
    /// Build a config around a table with every other setting at its default
    pub fn for_table(table: TableConfig) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: DatabaseConfig::default(),
            table,
            query_timeout_ms: default_query_timeout_ms(),
            cors_origins: Vec::new(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ServiceConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every setting
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "port",
                reason: "must be > 0".to_string(),
            });
        }

        if self.query_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "query_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }

        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "database.busy_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }

        self.table.validate()
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Store call budget per request
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl TableConfig {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            key_columns: Vec::new(),
        }
    }

    /// Restrict which columns may identify a row
    pub fn with_key_columns(mut self, keys: &[&str]) -> Self {
        self.key_columns = keys.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Validate identifiers and allow-list consistency
    pub fn validate(&self) -> ConfigResult<()> {
        check_identifier(&self.name)?;

        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            check_identifier(column)?;
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::DuplicateColumn(column.clone()));
            }
        }

        for key in &self.key_columns {
            if !seen.contains(key.as_str()) {
                return Err(ConfigError::UnknownKeyColumn(key.clone()));
            }
        }

        Ok(())
    }

    /// Look up a request-supplied column name in the allow-list.
    ///
    /// Returns the configured spelling so that identifiers reaching a
    /// query always originate from configuration.
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.as_str() == name)
            .map(String::as_str)
    }

    /// Look up a column allowed to identify a single row
    pub fn key_column(&self, name: &str) -> Option<&str> {
        if self.key_columns.is_empty() {
            return self.column(name);
        }
        self.key_columns
            .iter()
            .find(|c| c.as_str() == name)
            .map(String::as_str)
    }
}

/// Plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`
fn check_identifier(name: &str) -> ConfigResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn minimal() -> serde_json::Value {
        json!({
            "table": { "name": "users", "columns": ["id", "username", "email"] }
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = ServiceConfig::from_json(&minimal().to_string()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8082);
        assert_eq!(config.query_timeout_ms, 5000);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.cors_origins.is_empty());
        assert!(config.table.key_columns.is_empty());
        assert_eq!(config.socket_addr(), "0.0.0.0:8082");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dataserv.json");
        fs::write(&path, minimal().to_string()).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.table.name, "users");
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ServiceConfig::load(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_table_is_required() {
        let result = ServiceConfig::from_json(r#"{"port": 9000}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let config = json!({
            "table": { "name": "users; DROP TABLE x", "columns": ["id"] }
        });
        let result = ServiceConfig::from_json(&config.to_string());
        assert!(matches!(result, Err(ConfigError::InvalidIdentifier(_))));

        let config = json!({
            "table": { "name": "users", "columns": ["1st"] }
        });
        let result = ServiceConfig::from_json(&config.to_string());
        assert!(matches!(result, Err(ConfigError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_keys() {
        let dup = TableConfig::new("users", &["id", "id"]);
        assert!(matches!(dup.validate(), Err(ConfigError::DuplicateColumn(_))));

        let bad_key = TableConfig::new("users", &["id"]).with_key_columns(&["email"]);
        assert!(matches!(bad_key.validate(), Err(ConfigError::UnknownKeyColumn(_))));

        let empty = TableConfig::new("users", &[]);
        assert!(matches!(empty.validate(), Err(ConfigError::NoColumns)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = minimal();
        config["query_timeout_ms"] = json!(0);
        let result = ServiceConfig::from_json(&config.to_string());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidSetting { field: "query_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_key_column_lookup() {
        let open = TableConfig::new("users", &["id", "email"]);
        assert_eq!(open.key_column("email"), Some("email"));

        let restricted = open.clone().with_key_columns(&["id"]);
        assert_eq!(restricted.key_column("id"), Some("id"));
        assert_eq!(restricted.key_column("email"), None);
        assert_eq!(restricted.column("email"), Some("email"));
        assert_eq!(restricted.column("password"), None);
    }
}
