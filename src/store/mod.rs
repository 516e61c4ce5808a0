//! # Relational Store
//!
//! Blocking query interface the data engine runs its queries against.
//! Implementations must be safe to share between concurrently handled
//! requests; the engine never holds a connection across more than one
//! call.

mod errors;
mod sqlite;

pub use errors::{StoreError, StoreResult};
pub use sqlite::SqliteStore;

use serde_json::{Map, Value};

use crate::engine::query::Query;

/// A result row: column name to value
pub type Row = Map<String, Value>;

/// Blocking store operations
pub trait Store: Send + Sync {
    /// Run a select and collect every row
    fn select(&self, query: &Query) -> StoreResult<Vec<Row>>;

    /// Run a mutation, returning the number of affected rows
    fn execute(&self, query: &Query) -> StoreResult<usize>;

    /// Run a mutation that must affect exactly one row.
    ///
    /// The change is committed only when exactly one row was affected and
    /// rolled back otherwise. The affected count is returned either way.
    fn execute_one(&self, query: &Query) -> StoreResult<usize>;
}
