//! # Predicate Translator
//!
//! Turns request `body` pairs into filter predicates and the optional
//! `order_column`/`order_by` pair into an ordering clause.
//!
//! - `search`: every pair is a case-insensitive, unanchored pattern match,
//!   all sharing one relation (AND or OR). No mixed grouping.
//! - `searchx`: every pair is an exact-equality match, always ANDed.
//!
//! Without an ordering clause rows come back in the store's natural order,
//! which is not guaranteed to be stable between calls.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::TableConfig;

use super::errors::{EngineError, EngineResult};
use super::query::{Column, SqlValue};

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Exact,
    /// `~*`: case-insensitive regular expression, unanchored
    Pattern,
}

/// How predicates combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl Relation {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Relation::And => "AND",
            Relation::Or => "OR",
        }
    }
}

impl FromStr for Relation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(Relation::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(Relation::Or)
        } else {
            Err(EngineError::invalid_field(
                "relation",
                format!("expected AND or OR, got '{}'", s),
            ))
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Descending only when the request says `desc` (any case)
    pub fn from_order_by(order_by: Option<&str>) -> Self {
        match order_by {
            Some(s) if s.eq_ignore_ascii_case("desc") => Direction::Desc,
            _ => Direction::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A single column/comparator/value test
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: Column,
    pub comparator: Comparator,
    pub value: SqlValue,
}

impl Predicate {
    pub fn exact(column: Column, value: SqlValue) -> Self {
        Self {
            column,
            comparator: Comparator::Exact,
            value,
        }
    }

    /// Build a pattern predicate, compiling the pattern up front so an
    /// invalid one fails before any I/O.
    pub fn pattern(column: Column, raw: &str) -> EngineResult<Self> {
        let pattern = format!("(?i){}", raw);
        Regex::new(&pattern).map_err(|e| EngineError::InvalidPattern {
            column: column.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            column,
            comparator: Comparator::Pattern,
            value: SqlValue::Text(pattern),
        })
    }

    /// Render with the given 1-based placeholder index
    pub fn render(&self, placeholder: usize) -> String {
        match self.comparator {
            Comparator::Exact => format!("{} = ?{}", self.column, placeholder),
            Comparator::Pattern => format!("{} REGEXP ?{}", self.column, placeholder),
        }
    }
}

/// Predicates sharing one relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
    pub relation: Relation,
}

impl Filter {
    pub fn new(relation: Relation) -> Self {
        Self {
            predicates: Vec::new(),
            relation,
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Ordering clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub column: Column,
    pub direction: Direction,
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Pattern predicates for `search`
pub fn translate_search(
    table: &TableConfig,
    body: &Map<String, Value>,
    relation: Relation,
) -> EngineResult<Filter> {
    require_pairs(body)?;

    let mut filter = Filter::new(relation);
    for (name, value) in body {
        let column = Column::resolve(table, name)?;
        let text = pattern_text(name, value)?;
        filter.predicates.push(Predicate::pattern(column, &text)?);
    }
    Ok(filter)
}

/// Exact-equality predicates for `searchx`, implicitly ANDed
pub fn translate_exact(table: &TableConfig, body: &Map<String, Value>) -> EngineResult<Filter> {
    require_pairs(body)?;

    let mut filter = Filter::new(Relation::And);
    for (name, value) in body {
        let column = Column::resolve(table, name)?;
        let value = SqlValue::from_json(name, value)?;
        filter.predicates.push(Predicate::exact(column, value));
    }
    Ok(filter)
}

/// Ordering from `order_column` / `order_by`; none when no column is given
pub fn translate_order(
    table: &TableConfig,
    order_column: Option<&str>,
    order_by: Option<&str>,
) -> EngineResult<Option<OrderClause>> {
    let Some(name) = order_column else {
        return Ok(None);
    };

    Ok(Some(OrderClause {
        column: Column::resolve(table, name)?,
        direction: Direction::from_order_by(order_by),
    }))
}

fn require_pairs(body: &Map<String, Value>) -> EngineResult<()> {
    if body.is_empty() {
        return Err(EngineError::invalid_body(
            "body must contain at least one key/value pair",
        ));
    }
    Ok(())
}

/// Pattern source text: strings as-is, numbers by their decimal form
fn pattern_text(name: &str, value: &Value) -> EngineResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(EngineError::invalid_body(format!(
            "search value for '{}' must be a string or number",
            name
        ))),
    }
}
