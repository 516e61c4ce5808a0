//! # Query Builder
//!
//! Produces fully determined, parameter-bound queries. A `Query` is built
//! before any I/O happens and is rendered to SQL text plus a separate
//! parameter list; request values never become part of the SQL text.
//!
//! Identifiers come only from configuration: a [`Column`] can only be
//! obtained by resolving a name against the table's allow-list.

use std::fmt;

use serde_json::Value;

use crate::config::TableConfig;

use super::errors::{EngineError, EngineResult};
use super::predicate::{Filter, OrderClause, Predicate};

/// A column name taken from the configured allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column(String);

impl Column {
    /// Resolve a request-supplied name against the allow-list
    pub fn resolve(table: &TableConfig, name: &str) -> EngineResult<Self> {
        table
            .column(name)
            .map(|c| Column(c.to_string()))
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    /// Resolve a name allowed to identify a single row
    pub fn resolve_key(table: &TableConfig, name: &str) -> EngineResult<Self> {
        table
            .key_column(name)
            .map(|c| Column(c.to_string()))
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Column {
    /// Quoted identifier. Allow-listed names are plain identifiers, so no
    /// escaping is needed inside the quotes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// A bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a request value. Arrays and objects have no column
    /// representation and are rejected.
    pub fn from_json(column: &str, value: &Value) -> EngineResult<Self> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Real(f))
                } else {
                    Err(EngineError::invalid_body(format!(
                        "value for '{}' is out of range",
                        column
                    )))
                }
            }
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(EngineError::invalid_body(format!(
                "value for '{}' must be a scalar",
                column
            ))),
        }
    }
}

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Insert,
    Update,
    Delete,
    Select,
}

/// SQL text with its positional parameters (`?1..?n`)
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// A fully determined query against the configured table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    kind: QueryKind,
    assignments: Vec<(Column, SqlValue)>,
    filter: Filter,
    projection: Vec<Column>,
    order: Option<OrderClause>,
    limit: Option<usize>,
}

impl Query {
    fn new(table: &TableConfig, kind: QueryKind) -> Self {
        Self {
            table: table.name.clone(),
            kind,
            assignments: Vec::new(),
            filter: Filter::default(),
            projection: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Cap the number of rows a select returns
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render SQL text and parameters
    pub fn to_sql(&self) -> SqlStatement {
        let mut params = Vec::new();
        let table = format!("\"{}\"", self.table);

        let sql = match self.kind {
            QueryKind::Insert => {
                let columns: Vec<String> =
                    self.assignments.iter().map(|(c, _)| c.to_string()).collect();
                let placeholders: Vec<String> = self
                    .assignments
                    .iter()
                    .map(|(_, v)| bind(&mut params, v))
                    .collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(", "),
                    placeholders.join(", ")
                )
            }
            QueryKind::Update => {
                let sets: Vec<String> = self
                    .assignments
                    .iter()
                    .map(|(c, v)| format!("{} = {}", c, bind(&mut params, v)))
                    .collect();
                format!(
                    "UPDATE {} SET {}{}",
                    table,
                    sets.join(", "),
                    where_clause(&self.filter, &mut params)
                )
            }
            QueryKind::Delete => {
                format!(
                    "DELETE FROM {}{}",
                    table,
                    where_clause(&self.filter, &mut params)
                )
            }
            QueryKind::Select => {
                let projection = if self.projection.is_empty() {
                    "*".to_string()
                } else {
                    self.projection
                        .iter()
                        .map(Column::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let mut sql = format!(
                    "SELECT {} FROM {}{}",
                    projection,
                    table,
                    where_clause(&self.filter, &mut params)
                );
                if let Some(order) = &self.order {
                    sql.push_str(&format!(" ORDER BY {}", order));
                }
                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {}", limit));
                }
                sql
            }
        };

        SqlStatement { sql, params }
    }
}

fn bind(params: &mut Vec<SqlValue>, value: &SqlValue) -> String {
    params.push(value.clone());
    format!("?{}", params.len())
}

fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    if filter.is_empty() {
        return String::new();
    }

    let joiner = format!(" {} ", filter.relation.as_sql());
    let rendered: Vec<String> = filter
        .predicates
        .iter()
        .map(|p| {
            params.push(p.value.clone());
            p.render(params.len())
        })
        .collect();

    format!(" WHERE {}", rendered.join(&joiner))
}

/// `INSERT` of one row
pub fn build_insert(table: &TableConfig, values: Vec<(Column, SqlValue)>) -> EngineResult<Query> {
    if values.is_empty() {
        return Err(EngineError::invalid_body(
            "insert needs at least one key/value pair",
        ));
    }

    let mut query = Query::new(table, QueryKind::Insert);
    query.assignments = values;
    Ok(query)
}

/// `UPDATE` of the row identified by exactly one key/value pair
pub fn build_update(
    table: &TableConfig,
    values: Vec<(Column, SqlValue)>,
    key: (Column, SqlValue),
) -> EngineResult<Query> {
    if values.is_empty() {
        return Err(EngineError::invalid_body(
            "update needs at least one key/value pair to set",
        ));
    }

    let mut query = Query::new(table, QueryKind::Update);
    query.assignments = values;
    query.filter = Filter::default().with(Predicate::exact(key.0, key.1));
    Ok(query)
}

/// `DELETE` of the row identified by exactly one key/value pair
pub fn build_delete(table: &TableConfig, key: (Column, SqlValue)) -> Query {
    let mut query = Query::new(table, QueryKind::Delete);
    query.filter = Filter::default().with(Predicate::exact(key.0, key.1));
    query
}

/// `SELECT` with optional projection, filter and ordering
pub fn build_select(
    table: &TableConfig,
    projection: Vec<Column>,
    filter: Filter,
    order: Option<OrderClause>,
) -> Query {
    let mut query = Query::new(table, QueryKind::Select);
    query.projection = projection;
    query.filter = filter;
    query.order = order;
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::predicate::{Direction, Relation};
    use serde_json::json;

    fn table() -> TableConfig {
        TableConfig::new("users", &["id", "username", "email"])
    }

    fn col(name: &str) -> Column {
        Column::resolve(&table(), name).unwrap()
    }

    #[test]
    fn test_insert_sql() {
        let query = build_insert(
            &table(),
            vec![
                (col("username"), SqlValue::Text("ada".into())),
                (col("email"), SqlValue::Text("ada@x.com".into())),
            ],
        )
        .unwrap();

        let stmt = query.to_sql();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"username\", \"email\") VALUES (?1, ?2)"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_insert_requires_values() {
        assert!(matches!(
            build_insert(&table(), vec![]),
            Err(EngineError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_update_sql_binds_key_last() {
        let query = build_update(
            &table(),
            vec![(col("email"), SqlValue::Text("new@x.com".into()))],
            (col("id"), SqlValue::Integer(1)),
        )
        .unwrap();

        let stmt = query.to_sql();
        assert_eq!(stmt.sql, "UPDATE \"users\" SET \"email\" = ?1 WHERE \"id\" = ?2");
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("new@x.com".into()), SqlValue::Integer(1)]
        );
    }

    #[test]
    fn test_delete_sql() {
        let stmt = build_delete(&table(), (col("username"), SqlValue::Text("ada".into()))).to_sql();
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"username\" = ?1");
    }

    #[test]
    fn test_select_sql_full() {
        let filter = Filter::new(Relation::Or)
            .with(Predicate::exact(col("id"), SqlValue::Integer(1)))
            .with(Predicate::pattern(col("email"), "x\\.com").unwrap());
        let order = OrderClause {
            column: col("username"),
            direction: Direction::Desc,
        };

        let stmt = build_select(&table(), vec![col("id"), col("email")], filter, Some(order))
            .with_limit(2)
            .to_sql();

        assert_eq!(
            stmt.sql,
            "SELECT \"id\", \"email\" FROM \"users\" WHERE \"id\" = ?1 OR \"email\" REGEXP ?2 \
             ORDER BY \"username\" DESC LIMIT 2"
        );
        assert_eq!(stmt.params[1], SqlValue::Text("(?i)x\\.com".into()));
    }

    #[test]
    fn test_select_all_without_filter() {
        let stmt = build_select(&table(), vec![], Filter::default(), None).to_sql();
        assert_eq!(stmt.sql, "SELECT * FROM \"users\"");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_hostile_values_stay_out_of_sql() {
        let hostile = "'; DROP TABLE users; --";
        let stmt = build_delete(&table(), (col("username"), SqlValue::Text(hostile.into()))).to_sql();
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params, vec![SqlValue::Text(hostile.into())]);
    }

    #[test]
    fn test_column_resolution() {
        assert!(matches!(
            Column::resolve(&table(), "id\" OR 1=1 --"),
            Err(EngineError::UnknownColumn(_))
        ));

        let keyed = table().with_key_columns(&["id"]);
        assert!(Column::resolve_key(&keyed, "id").is_ok());
        assert!(Column::resolve_key(&keyed, "email").is_err());
    }

    #[test]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from_json("a", &json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(SqlValue::from_json("a", &json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(SqlValue::from_json("a", &json!(7)).unwrap(), SqlValue::Integer(7));
        assert_eq!(SqlValue::from_json("a", &json!(1.5)).unwrap(), SqlValue::Real(1.5));
        assert_eq!(
            SqlValue::from_json("a", &json!("x")).unwrap(),
            SqlValue::Text("x".into())
        );
        assert!(SqlValue::from_json("a", &json!([1])).is_err());
        assert!(SqlValue::from_json("a", &json!({"b": 1})).is_err());
    }
}
