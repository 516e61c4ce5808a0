//! SQLite-backed store
//!
//! One connection behind a mutex; each trait call locks it for exactly one
//! logical operation. A `regexp(pattern, value)` scalar function backs the
//! `REGEXP` operator used by pattern predicates.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

use crate::config::DatabaseConfig;
use crate::engine::query::{Query, SqlValue};

use super::errors::{StoreError, StoreResult};
use super::{Row, Store};

/// Path spelling that selects a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Default busy timeout for stores opened without configuration
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// SQLite store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::init(conn, busy_timeout).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })
    }

    /// Private in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: IN_MEMORY.to_string(),
            source,
        })?;
        Self::init(conn, DEFAULT_BUSY_TIMEOUT).map_err(|source| StoreError::Open {
            path: IN_MEMORY.to_string(),
            source,
        })
    }

    /// Open the database described by the service configuration
    pub fn from_config(config: &DatabaseConfig) -> StoreResult<Self> {
        if config.path.as_os_str() == IN_MEMORY {
            return Self::in_memory();
        }
        Self::open(&config.path, Duration::from_millis(config.busy_timeout_ms))
    }

    fn init(conn: Connection, busy_timeout: Duration) -> rusqlite::Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        register_regexp(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run raw SQL (schema bootstrap, fixtures)
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for SqliteStore {
    fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let statement = query.to_sql();
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&statement.sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                record.insert(name.clone(), json_value(row.get_ref(idx)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn execute(&self, query: &Query) -> StoreResult<usize> {
        let statement = query.to_sql();
        let conn = self.lock()?;
        let affected = conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(affected)
    }

    fn execute_one(&self, query: &Query) -> StoreResult<usize> {
        let statement = query.to_sql();
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;
        let affected = tx.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        if affected == 1 {
            tx.commit()?;
        } else {
            tx.rollback()?;
        }
        Ok(affected)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// `X REGEXP Y` calls `regexp(Y, X)`; NULL and BLOB values never match.
///
/// The pattern is a bound constant for the whole statement, so it is
/// compiled once and kept as auxiliary data on argument 0.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Null | ValueRef::Blob(_) => false,
                ValueRef::Integer(i) => re.is_match(&i.to_string()),
                ValueRef::Real(f) => re.is_match(&f.to_string()),
                ValueRef::Text(t) => re.is_match(&String::from_utf8_lossy(t)),
            };
            Ok(is_match)
        },
    )
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(b.iter().map(|byte| format!("{:02x}", byte)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::engine::predicate::{translate_exact, translate_search, Filter, Relation};
    use crate::engine::query::{build_insert, build_select, Column};
    use serde_json::json;
    use tempfile::TempDir;

    fn table() -> TableConfig {
        TableConfig::new("users", &["id", "username", "email", "score", "avatar"])
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE users (id INTEGER, username TEXT, email TEXT, score REAL, avatar BLOB);
                 INSERT INTO users VALUES (1, 'Ada', 'ada@x.com', 1.5, x'0aff');
                 INSERT INTO users VALUES (2, 'bob', NULL, NULL, NULL);",
            )
            .unwrap();
        store
    }

    fn select_all(store: &SqliteStore) -> Vec<Row> {
        store
            .select(&build_select(&table(), vec![], Filter::default(), None))
            .unwrap()
    }

    #[test]
    fn test_value_mapping() {
        let rows = select_all(&seeded());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["username"], json!("Ada"));
        assert_eq!(rows[0]["score"], json!(1.5));
        assert_eq!(rows[0]["avatar"], json!("0aff"));
        assert_eq!(rows[1]["email"], Value::Null);
    }

    #[test]
    fn test_regexp_is_case_insensitive_and_skips_null() {
        let store = seeded();
        let body = json!({"username": "^a"});
        let filter = translate_search(&table(), body.as_object().unwrap(), Relation::And).unwrap();
        let rows = store
            .select(&build_select(&table(), vec![], filter, None))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["username"], "Ada");

        let body = json!({"email": "x"});
        let filter = translate_search(&table(), body.as_object().unwrap(), Relation::And).unwrap();
        let rows = store
            .select(&build_select(&table(), vec![], filter, None))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_pattern_search_scales_with_rows() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE users (id INTEGER, username TEXT, email TEXT, score REAL, avatar BLOB);
                 WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 5000)
                 INSERT INTO users (id, username) SELECT i, 'user' || i FROM n;",
            )
            .unwrap();

        // Expensive to compile; one compile per row would take seconds
        let alternation: Vec<String> = (0..200).map(|i| format!("name{}x", i)).collect();
        let pattern = format!("^(?:{}|user4999)$", alternation.join("|"));
        let body = json!({ "username": pattern });
        let filter = translate_search(&table(), body.as_object().unwrap(), Relation::Or).unwrap();

        let started = std::time::Instant::now();
        let rows = store
            .select(&build_select(&table(), vec![], filter, None))
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(4999));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "search took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_execute_one_rolls_back_on_zero() {
        let store = seeded();
        let body = json!({"id": 42});
        let filter = translate_exact(&table(), body.as_object().unwrap()).unwrap();
        let key = filter.predicates[0].clone();
        let delete = crate::engine::query::build_delete(&table(), (key.column, key.value));

        assert_eq!(store.execute_one(&delete).unwrap(), 0);
        assert_eq!(select_all(&store).len(), 2);
    }

    #[test]
    fn test_execute_inserts() {
        let store = seeded();
        let insert = build_insert(
            &table(),
            vec![(
                Column::resolve(&table(), "username").unwrap(),
                SqlValue::Text("carol".into()),
            )],
        )
        .unwrap();

        assert_eq!(store.execute(&insert).unwrap(), 1);
        assert_eq!(select_all(&store).len(), 3);
    }

    #[test]
    fn test_statement_errors_surface() {
        let store = SqliteStore::in_memory().unwrap();
        // Table was never created
        let result = store.select(&build_select(&table(), vec![], Filter::default(), None));
        match result {
            Err(StoreError::Sqlite(e)) => assert!(e.to_string().contains("no such table")),
            other => panic!("expected sqlite error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_open_file_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("data.db"),
            busy_timeout_ms: 100,
        };

        let store = SqliteStore::from_config(&config).unwrap();
        store
            .execute_batch("CREATE TABLE users (id INTEGER, username TEXT, email TEXT, score REAL, avatar BLOB);")
            .unwrap();
        drop(store);

        let reopened = SqliteStore::from_config(&config).unwrap();
        assert!(select_all(&reopened).is_empty());
    }
}
