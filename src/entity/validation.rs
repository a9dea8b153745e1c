use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::database::Row;
use super::descriptor::{FieldKind, FieldRule};
use super::result_builder::ErrorItem;

pub const MISSING: &str = "Missing data for required field.";
pub const NULL_NOT_ALLOWED: &str = "Field may not be null.";

/// Check `data` against `rules` and return the accepted fields. Keys without a
/// rule are dropped. Every failing field yields one error, in rule order.
pub fn validate(data: &Value, rules: &[FieldRule]) -> Result<Row, Vec<ErrorItem>> {
    let Value::Object(input) = data else {
        return Err(vec![ErrorItem::new("body", "Invalid input type.")]);
    };

    let mut accepted = Row::new();
    let mut errors = Vec::new();

    for rule in rules {
        match input.get(rule.name) {
            None if rule.required => errors.push(ErrorItem::new(rule.name, MISSING)),
            None => {}
            Some(value) => match check(rule, value) {
                Ok(normalized) => {
                    accepted.insert(rule.name.to_string(), normalized);
                }
                Err(reason) => errors.push(ErrorItem::new(rule.name, reason)),
            },
        }
    }

    if errors.is_empty() { Ok(accepted) } else { Err(errors) }
}

fn check(rule: &FieldRule, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        // Optional text columns are nullable; nothing else is
        return match rule.kind {
            FieldKind::Text { .. } if !rule.required => Ok(Value::Null),
            _ => Err(NULL_NOT_ALLOWED.to_string()),
        };
    }

    match rule.kind {
        FieldKind::Integer => value
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| "Not a valid integer.".to_string()),
        FieldKind::Text { max_len } => {
            let text = value.as_str().ok_or_else(|| "Not a valid string.".to_string())?;
            if text.chars().count() > max_len {
                return Err(format!("Longer than maximum length {}.", max_len));
            }
            if rule.required && text.trim().is_empty() {
                return Err("Field may not be blank.".to_string());
            }
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Timestamp => {
            let text = value.as_str().ok_or_else(|| "Not a valid datetime.".to_string())?;
            let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| "Not a valid datetime.".to_string())?;
            Ok(Value::String(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)))
        }
        FieldKind::IntegerList => {
            let items = value.as_array().ok_or_else(|| "Not a valid list.".to_string())?;
            items
                .iter()
                .map(|item| item.as_i64().map(Value::from).ok_or_else(|| "Not a valid list of integers.".to_string()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}
