//! # Action Dispatcher
//!
//! Routes a parsed envelope through a lookup table of planners. A planner
//! validates the request shape for its action and produces a [`Plan`]:
//! every query the request will run, fully built before the store is
//! touched. [`Engine`] then executes the plan.
//!
//! | action    | plan                                   |
//! |-----------|----------------------------------------|
//! | `insert`  | one INSERT                             |
//! | `update`  | existence guard, then guarded UPDATE   |
//! | `delete`  | existence guard, then guarded DELETE   |
//! | `search`  | SELECT with pattern predicates         |
//! | `searchx` | SELECT with exact predicates           |

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::config::TableConfig;
use crate::store::{Row, Store};

use super::errors::{EngineError, EngineResult, ErrorClass};
use super::guard::ExistenceGuard;
use super::predicate::{translate_exact, translate_order, translate_search, Filter};
use super::query::{build_delete, build_insert, build_select, build_update, Column, Query, SqlValue};
use super::request::{Action, RequestEnvelope};
use super::response::Envelope;

/// Everything a request will run, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Unguarded mutation
    Write(Query),
    /// Mutation of exactly one row identified by the guard
    Guarded {
        guard: ExistenceGuard,
        mutation: Query,
    },
    /// Read
    Read(Query),
}

/// Validates one action's request shape and builds its plan
pub type Planner = fn(&RequestEnvelope, &TableConfig) -> EngineResult<Plan>;

/// Action → planner lookup table
pub struct Dispatcher {
    routes: HashMap<Action, Planner>,
}

impl Dispatcher {
    /// Table with every built-in action
    pub fn new() -> Self {
        Self::empty()
            .route(Action::Insert, plan_insert)
            .route(Action::Update, plan_update)
            .route(Action::Delete, plan_delete)
            .route(Action::Search, plan_search)
            .route(Action::SearchX, plan_searchx)
    }

    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register (or replace) the planner for an action
    pub fn route(mut self, action: Action, planner: Planner) -> Self {
        self.routes.insert(action, planner);
        self
    }

    /// Build the plan for a request
    pub fn plan(&self, request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
        let planner = self
            .routes
            .get(&request.action)
            .ok_or_else(|| EngineError::UnknownAction(request.action.to_string()))?;
        planner(request, table)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn plan_insert(request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
    let values = assignments(table, request.require_body()?)?;
    Ok(Plan::Write(build_insert(table, values)?))
}

fn plan_update(request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
    let ((key_name, key_value), set) = request.update_target()?;
    let key = identifying_key(table, &key_name, &key_value)?;
    let values = assignments(table, set)?;

    let guard = ExistenceGuard::new(table, &key);
    let mutation = build_update(table, values, key)?;
    Ok(Plan::Guarded { guard, mutation })
}

fn plan_delete(request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
    let (key_name, key_value) = request.delete_target()?;
    let key = identifying_key(table, &key_name, &key_value)?;

    let guard = ExistenceGuard::new(table, &key);
    let mutation = build_delete(table, key);
    Ok(Plan::Guarded { guard, mutation })
}

fn plan_search(request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
    let relation = request.require_relation()?;
    let filter = translate_search(table, request.require_body()?, relation)?;
    select_plan(request, table, filter)
}

fn plan_searchx(request: &RequestEnvelope, table: &TableConfig) -> EngineResult<Plan> {
    let filter = translate_exact(table, request.require_body()?)?;
    select_plan(request, table, filter)
}

fn select_plan(
    request: &RequestEnvelope,
    table: &TableConfig,
    filter: Filter,
) -> EngineResult<Plan> {
    let projection = request
        .columns
        .iter()
        .map(|name| Column::resolve(table, name))
        .collect::<EngineResult<Vec<_>>>()?;
    let order = translate_order(
        table,
        request.order_column.as_deref(),
        request.order_by.as_deref(),
    )?;

    Ok(Plan::Read(build_select(table, projection, filter, order)))
}

fn assignments(
    table: &TableConfig,
    body: &Map<String, Value>,
) -> EngineResult<Vec<(Column, SqlValue)>> {
    body.iter()
        .map(|(name, value)| Ok((Column::resolve(table, name)?, SqlValue::from_json(name, value)?)))
        .collect()
}

fn identifying_key(
    table: &TableConfig,
    name: &str,
    value: &Value,
) -> EngineResult<(Column, SqlValue)> {
    Ok((Column::resolve_key(table, name)?, SqlValue::from_json(name, value)?))
}

/// Successful result of one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows changed by a mutation
    Changed { action: Action, affected: usize },
    /// Rows returned by a search
    Rows { action: Action, rows: Vec<Row> },
}

impl Outcome {
    pub fn into_envelope(self) -> Envelope {
        match self {
            Outcome::Changed { .. } => Envelope::ok(),
            Outcome::Rows { rows, .. } => Envelope::with_payload(Value::Array(
                rows.into_iter().map(Value::Object).collect(),
            )),
        }
    }
}

/// Service context: the configured table, the store and the dispatch table
pub struct Engine<S: Store> {
    table: TableConfig,
    store: Arc<S>,
    dispatcher: Dispatcher,
}

impl<S: Store> Engine<S> {
    pub fn new(table: TableConfig, store: Arc<S>) -> Self {
        Self {
            table,
            store,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Parse, plan and execute one request
    pub fn handle(&self, bytes: &[u8]) -> EngineResult<Outcome> {
        let request = RequestEnvelope::parse(bytes)?;
        let plan = self.dispatcher.plan(&request, &self.table)?;
        self.execute(request.action, &plan)
    }

    /// Run a plan against the store. No retries.
    pub fn execute(&self, action: Action, plan: &Plan) -> EngineResult<Outcome> {
        let store = self.store.as_ref();
        match plan {
            Plan::Write(query) => {
                let affected = store.execute(query)?;
                Ok(Outcome::Changed { action, affected })
            }
            Plan::Guarded { guard, mutation } => {
                guard.verify(store)?;
                let affected = guard.mutate(store, mutation)?;
                Ok(Outcome::Changed { action, affected })
            }
            Plan::Read(query) => {
                let rows = store.select(query)?;
                Ok(Outcome::Rows { action, rows })
            }
        }
    }

    /// Handle a request and always produce an envelope, logging the result
    pub fn respond(&self, bytes: &[u8]) -> (StatusCode, Envelope) {
        match self.handle(bytes) {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Changed { action, affected } => {
                        tracing::info!(%action, affected, "data request done")
                    }
                    Outcome::Rows { action, rows } => {
                        tracing::info!(%action, rows = rows.len(), "data request done")
                    }
                }
                (StatusCode::OK, outcome.into_envelope())
            }
            Err(err) => {
                log_failure(&err);
                (err.status_code(), Envelope::failed(&err))
            }
        }
    }
}

/// Client mistakes at warn, everything else at error
pub fn log_failure(err: &EngineError) {
    match err.class() {
        ErrorClass::Client => tracing::warn!(error = %err, "data request failed"),
        ErrorClass::Ambiguity | ErrorClass::Server => {
            tracing::error!(class = ?err.class(), error = %err, "data request failed")
        }
    }
}
