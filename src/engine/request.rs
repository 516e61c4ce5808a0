//! # Request Envelope Parser
//!
//! Extracts `action`, `body`, `body2`, `key`, `value`, `columns`,
//! `relation`, `order_column` and `order_by` from the raw request bytes.
//!
//! Absent fields, wrongly shaped fields and undecodable bytes are distinct
//! error variants; callers match on the variant, never on message text.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::errors::{EngineError, EngineResult};
use super::predicate::Relation;

/// Operation keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Search,
    SearchX,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Insert,
        Action::Update,
        Action::Delete,
        Action::Search,
        Action::SearchX,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Search => "search",
            Action::SearchX => "searchx",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| EngineError::UnknownAction(s.to_string()))
    }
}

/// Parsed request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub action: Action,
    pub body: Option<Map<String, Value>>,
    pub body2: Option<Map<String, Value>>,
    pub key: Option<String>,
    pub value: Option<Value>,
    pub columns: Vec<String>,
    /// Raw `relation`; only pattern search reads it
    pub relation: Option<Value>,
    pub order_column: Option<String>,
    pub order_by: Option<String>,
}

impl RequestEnvelope {
    /// Parse raw request bytes
    pub fn parse(bytes: &[u8]) -> EngineResult<Self> {
        let root: Value =
            serde_json::from_slice(bytes).map_err(|e| EngineError::MalformedJson(e.to_string()))?;
        let Value::Object(obj) = root else {
            return Err(EngineError::MalformedJson(
                "expected a JSON object".to_string(),
            ));
        };

        let action = match obj.get("action") {
            None | Some(Value::Null) => return Err(EngineError::MissingAction),
            Some(Value::String(s)) => Action::from_str(s)?,
            Some(_) => return Err(EngineError::InvalidAction),
        };

        Ok(Self {
            action,
            body: optional_object(&obj, "body")?,
            body2: optional_object(&obj, "body2")?,
            key: optional_str(&obj, "key")?.map(str::to_string),
            value: obj.get("value").cloned(),
            columns: string_list(&obj, "columns")?,
            relation: obj.get("relation").filter(|v| !v.is_null()).cloned(),
            order_column: optional_str(&obj, "order_column")?.map(str::to_string),
            order_by: optional_str(&obj, "order_by")?.map(str::to_string),
        })
    }

    /// `body`, which every action except a key/value-addressed delete needs
    pub fn require_body(&self) -> EngineResult<&Map<String, Value>> {
        self.body.as_ref().ok_or(EngineError::MissingField("body"))
    }

    /// `relation`, required by pattern search
    pub fn require_relation(&self) -> EngineResult<Relation> {
        match &self.relation {
            None => Err(EngineError::MissingField("relation")),
            Some(Value::String(s)) => Relation::from_str(s),
            Some(_) => Err(EngineError::invalid_field("relation", "expected a string")),
        }
    }

    /// Identifying pair and the pairs to set for an update.
    ///
    /// Top-level `key`/`value` identify the row and `body` holds the new
    /// values; otherwise `body2` holds the new values and `body` must be
    /// the identifier.
    pub fn update_target(&self) -> EngineResult<((String, Value), &Map<String, Value>)> {
        if let Some(pair) = self.top_level_pair()? {
            return Ok((pair, self.require_body()?));
        }

        match &self.body2 {
            Some(values) => Ok((identifying_pair(self.require_body()?)?, values)),
            None => Err(EngineError::WrongKeyCount(0)),
        }
    }

    /// Identifying pair for a delete
    pub fn delete_target(&self) -> EngineResult<(String, Value)> {
        if let Some(pair) = self.top_level_pair()? {
            return Ok(pair);
        }
        identifying_pair(self.require_body()?)
    }

    fn top_level_pair(&self) -> EngineResult<Option<(String, Value)>> {
        match (&self.key, &self.value) {
            (None, None) => Ok(None),
            (Some(key), Some(value)) => Ok(Some((key.clone(), value.clone()))),
            (None, Some(_)) => Err(EngineError::MissingField("key")),
            (Some(_), None) => Err(EngineError::MissingField("value")),
        }
    }
}

/// Accepts `{"key": <column>, "value": <v>}` or a single `{<column>: <v>}`
fn identifying_pair(map: &Map<String, Value>) -> EngineResult<(String, Value)> {
    if map.len() == 2 {
        if let (Some(key), Some(value)) = (map.get("key"), map.get("value")) {
            let Value::String(column) = key else {
                return Err(EngineError::invalid_field("key", "expected a column name"));
            };
            return Ok((column.clone(), value.clone()));
        }
    }

    let mut pairs = map.iter();
    match (pairs.next(), pairs.next()) {
        (Some((column, value)), None) => Ok((column.clone(), value.clone())),
        _ => Err(EngineError::WrongKeyCount(map.len())),
    }
}

fn optional_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> EngineResult<Option<&'a str>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(EngineError::invalid_field(field, "expected a string")),
    }
}

fn optional_object(
    obj: &Map<String, Value>,
    field: &'static str,
) -> EngineResult<Option<Map<String, Value>>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(EngineError::invalid_field(field, "expected an object")),
    }
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> EngineResult<Vec<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(EngineError::invalid_field(field, "expected an array of strings")),
            })
            .collect(),
        Some(_) => Err(EngineError::invalid_field(field, "expected an array of strings")),
    }
}
