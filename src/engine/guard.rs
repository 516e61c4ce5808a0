//! # Existence Guard
//!
//! Before an update or delete, the identifying key/value pair is looked up
//! and the number of matching rows decides whether the mutation may run:
//!
//! | rows | outcome          |
//! |------|------------------|
//! | 0    | `RecordNotFound` |
//! | 1    | proceed          |
//! | >1   | `AmbiguousKey`   |
//!
//! The lookup and the mutation are separate store acquisitions. The
//! mutation itself goes through [`Store::execute_one`], which re-checks the
//! affected-row count inside one transaction, so a row deleted or
//! duplicated between the two steps can never cause a silent no-op or a
//! multi-row change.

use crate::config::TableConfig;
use crate::store::Store;

use super::errors::{EngineError, EngineResult};
use super::predicate::{Filter, Predicate};
use super::query::{build_select, Column, Query, SqlValue};

/// Rows needed to tell "one" from "many"
const LOOKUP_LIMIT: usize = 2;

/// How many rows an identifying pair matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    None,
    One,
    Many,
}

impl Cardinality {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Cardinality::None,
            1 => Cardinality::One,
            _ => Cardinality::Many,
        }
    }

    /// Turn the count into a go/no-go decision
    pub fn check(self, key: &Column) -> EngineResult<()> {
        match self {
            Cardinality::None => Err(EngineError::RecordNotFound),
            Cardinality::One => Ok(()),
            Cardinality::Many => Err(EngineError::AmbiguousKey {
                column: key.name().to_string(),
            }),
        }
    }
}

/// Pre-mutation lookup for one identifying pair
#[derive(Debug, Clone, PartialEq)]
pub struct ExistenceGuard {
    key: Column,
    lookup: Query,
}

impl ExistenceGuard {
    pub fn new(table: &TableConfig, key: &(Column, SqlValue)) -> Self {
        let filter = Filter::default().with(Predicate::exact(key.0.clone(), key.1.clone()));
        let lookup = build_select(table, vec![key.0.clone()], filter, None).with_limit(LOOKUP_LIMIT);
        Self {
            key: key.0.clone(),
            lookup,
        }
    }

    pub fn key(&self) -> &Column {
        &self.key
    }

    pub fn lookup(&self) -> &Query {
        &self.lookup
    }

    /// Run the lookup and fail fast unless exactly one row matches
    pub fn verify<S: Store + ?Sized>(&self, store: &S) -> EngineResult<()> {
        let rows = store.select(&self.lookup)?;
        Cardinality::from_count(rows.len()).check(&self.key)
    }

    /// Run the guarded mutation, mapping a changed row count to the same
    /// errors the lookup would have produced
    pub fn mutate<S: Store + ?Sized>(&self, store: &S, mutation: &Query) -> EngineResult<usize> {
        let affected = store.execute_one(mutation)?;
        Cardinality::from_count(affected).check(&self.key)?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::query::build_delete;
    use crate::store::SqliteStore;

    fn table() -> TableConfig {
        TableConfig::new("users", &["id", "username", "email"])
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE users (id INTEGER, username TEXT, email TEXT);
                 INSERT INTO users VALUES (1, 'ada', 'ada@x.com');
                 INSERT INTO users VALUES (2, 'bob', 'bob@x.com');
                 INSERT INTO users VALUES (2, 'bob2', 'bob2@x.com');",
            )
            .unwrap();
        store
    }

    fn key(name: &str, value: SqlValue) -> (Column, SqlValue) {
        (Column::resolve(&table(), name).unwrap(), value)
    }

    #[test]
    fn test_cardinality() {
        assert_eq!(Cardinality::from_count(0), Cardinality::None);
        assert_eq!(Cardinality::from_count(1), Cardinality::One);
        assert_eq!(Cardinality::from_count(2), Cardinality::Many);
        assert_eq!(Cardinality::from_count(50), Cardinality::Many);
    }

    #[test]
    fn test_lookup_is_limited() {
        let guard = ExistenceGuard::new(&table(), &key("id", SqlValue::Integer(1)));
        assert_eq!(guard.lookup().limit(), Some(2));
        assert_eq!(
            guard.lookup().to_sql().sql,
            "SELECT \"id\" FROM \"users\" WHERE \"id\" = ?1 LIMIT 2"
        );
    }

    #[test]
    fn test_verify_trichotomy() {
        let store = store();

        let one = ExistenceGuard::new(&table(), &key("id", SqlValue::Integer(1)));
        assert!(one.verify(&store).is_ok());

        let none = ExistenceGuard::new(&table(), &key("id", SqlValue::Integer(9)));
        assert!(matches!(none.verify(&store), Err(EngineError::RecordNotFound)));

        let many = ExistenceGuard::new(&table(), &key("id", SqlValue::Integer(2)));
        assert!(matches!(
            many.verify(&store),
            Err(EngineError::AmbiguousKey { column }) if column == "id"
        ));
    }

    #[test]
    fn test_mutate_refuses_multi_row_change() {
        let store = store();
        let pair = key("id", SqlValue::Integer(2));
        let guard = ExistenceGuard::new(&table(), &pair);
        let delete = build_delete(&table(), pair);

        assert!(matches!(
            guard.mutate(&store, &delete),
            Err(EngineError::AmbiguousKey { .. })
        ));

        // Rolled back: both rows are still there
        let guard = ExistenceGuard::new(&table(), &key("id", SqlValue::Integer(2)));
        assert_eq!(store.select(guard.lookup()).unwrap().len(), 2);
    }
}
