use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::database::Row;

/// One soft error: which selector failed, why, and for which value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorItem {
    pub selector: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ErrorItem {
    pub fn new(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { selector: selector.into(), reason: reason.into(), value: None }
    }

    pub fn with_value(selector: impl Into<String>, reason: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { selector: selector.into(), reason: reason.into(), value: Some(value.into()) }
    }
}

/// Project a storage row onto the client-visible fields, in field order
pub fn result_item<S: AsRef<str>>(record: &Row, fields: &[S]) -> Value {
    let item: Map<String, Value> = fields
        .iter()
        .map(|f| {
            let f = f.as_ref();
            (f.to_string(), record.get(f).cloned().unwrap_or(Value::Null))
        })
        .collect();
    Value::Object(item)
}

pub fn row_id(record: &Row) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// One error per id in `requested` that is missing from `found`, ascending
pub fn not_found_errors(
    requested: &BTreeSet<i64>,
    found: &BTreeSet<i64>,
    selector: &str,
    reason: &str,
) -> Vec<ErrorItem> {
    requested
        .difference(found)
        .map(|id| ErrorItem::with_value(selector, reason, *id))
        .collect()
}
