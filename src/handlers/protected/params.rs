use serde::Deserialize;
use std::collections::BTreeSet;

use crate::entity::ErrorItem;
use crate::error::ApiError;

/// Raw list query string; every list is comma separated
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub ids: Option<String>,
    pub fields: Option<String>,
    pub schedules: Option<String>,
    pub name: Option<String>,
}

/// Parsed list parameters. Absent and empty lists are both `None`.
#[derive(Debug, Default, PartialEq)]
pub struct ListParams {
    pub ids: Option<Vec<i64>>,
    pub fields: Option<Vec<String>>,
    pub schedules: Option<BTreeSet<i64>>,
    pub name: Option<String>,
}

impl ListQuery {
    pub fn parse(self) -> Result<ListParams, ApiError> {
        let mut errors = Vec::new();

        let ids = parse_ids("ids", self.ids.as_deref(), &mut errors);
        let schedules = parse_ids("schedules", self.schedules.as_deref(), &mut errors)
            .map(|ids| ids.into_iter().collect());
        let fields = self.fields.as_deref().and_then(|raw| {
            let fields: Vec<String> = split(raw).map(str::to_string).collect();
            (!fields.is_empty()).then_some(fields)
        });

        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid query parameters", errors));
        }
        Ok(ListParams { ids, fields, schedules, name: self.name.filter(|n| !n.is_empty()) })
    }
}

fn split(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_ids(selector: &str, raw: Option<&str>, errors: &mut Vec<ErrorItem>) -> Option<Vec<i64>> {
    let mut ids = Vec::new();
    for item in split(raw?) {
        match item.parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => errors.push(ErrorItem::with_value(selector, "Not a valid integer.", item)),
        }
    }
    (!ids.is_empty()).then_some(ids)
}
