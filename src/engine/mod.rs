//! # Data Access Engine
//!
//! Interprets a JSON action envelope and runs the matching parameter-bound
//! query against the configured table.
//!
//! Data flow:
//!
//! ```text
//! bytes -> RequestEnvelope -> Dispatcher (plan) -> ExistenceGuard (update/delete)
//!       -> Store -> Envelope -> bytes
//! ```
//!
//! Everything is request-scoped; the only shared state is the [`Engine`]
//! context and the store it wraps.

pub mod dispatcher;
pub mod errors;
pub mod guard;
pub mod predicate;
pub mod query;
pub mod request;
pub mod response;

pub use dispatcher::{Dispatcher, Engine, Outcome, Plan, Planner};
pub use errors::{EngineError, EngineResult, ErrorClass};
pub use guard::{Cardinality, ExistenceGuard};
pub use predicate::{Comparator, Direction, Filter, OrderClause, Predicate, Relation};
pub use query::{Column, Query, QueryKind, SqlStatement, SqlValue};
pub use request::{Action, RequestEnvelope};
pub use response::{Envelope, Status};
