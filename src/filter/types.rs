use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Predicates the entity models are allowed to push down to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$any")] AnyOf,
    #[serde(rename = "$contains")] Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { column: column.into(), operator: FilterOp::Eq, data: value.into() }
    }

    /// Membership in a set of integer ids. An empty set matches nothing.
    pub fn any_of<I>(column: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let data = Value::Array(ids.into_iter().map(Value::from).collect());
        Self { column: column.into(), operator: FilterOp::AnyOf, data }
    }

    /// Case-sensitive substring match
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self { column: column.into(), operator: FilterOp::Contains, data: Value::String(needle.into()) }
    }

    /// Evaluate the predicate against an in-memory row, with the same
    /// semantics the SQL rendering has.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.operator {
            FilterOp::Eq => field == &self.data,
            FilterOp::AnyOf => match &self.data {
                Value::Array(values) => values.iter().any(|v| v == field),
                other => other == field,
            },
            FilterOp::Contains => match (field, &self.data) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
