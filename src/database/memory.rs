use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::filter::{Condition, Filter};
use super::storage::{Row, Storage, StorageError};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// In-process storage used by `--memory` servers and the test suite. Mirrors
/// the Postgres backend: generated ids, `created_at`/`updated_at` stamps,
/// unique columns, rows ordered by id.
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
    unique: Vec<(String, String)>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            unique: vec![("users".to_string(), "login".to_string())],
        }
    }

    fn now() -> Value {
        Value::String(Utc::now().to_rfc3339())
    }

    fn check_unique(&self, table_name: &str, table: &Table, values: &Row, skip_id: Option<i64>) -> Result<(), StorageError> {
        for (unique_table, column) in &self.unique {
            if unique_table != table_name {
                continue;
            }
            let Some(candidate) = values.get(column) else { continue };
            let clash = table
                .rows
                .iter()
                .any(|(id, row)| Some(*id) != skip_id && row.get(column) == Some(candidate));
            if clash {
                return Err(StorageError::Conflict(format!("{}.{} already exists", table_name, column)));
            }
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn select(&self, table: &str, columns: &[&str], conditions: &[Condition]) -> Result<Vec<Row>, StorageError> {
        // Same identifier rules as the SQL backend
        let mut filter = Filter::new(table)?;
        filter.select(columns)?.where_conditions(conditions)?;

        let tables = self.tables.read().await;
        let Some(table) = tables.get(table) else { return Ok(vec![]) };

        let rows = table
            .rows
            .values()
            .filter(|row| conditions.iter().all(|c| c.matches(row)))
            .map(|row| {
                if columns.is_empty() || columns.contains(&"*") {
                    row.clone()
                } else {
                    columns
                        .iter()
                        .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                        .collect()
                }
            })
            .collect();
        Ok(rows)
    }

    async fn insert(&self, table_name: &str, mut values: Row) -> Result<Row, StorageError> {
        Filter::new(table_name)?.to_insert_sql(&values)?;

        let mut tables = self.tables.write().await;
        let table = tables.entry(table_name.to_string()).or_default();
        self.check_unique(table_name, table, &values, None)?;

        table.next_id += 1;
        let id = table.next_id;
        values.insert("id".to_string(), Value::from(id));
        values.entry("created_at").or_insert_with(Self::now);
        values.entry("updated_at").or_insert_with(Self::now);
        table.rows.insert(id, values.clone());
        Ok(values)
    }

    async fn update(&self, table_name: &str, id: i64, values: Row) -> Result<Option<Row>, StorageError> {
        Filter::new(table_name)?.to_update_sql(id, &values, true)?;

        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table_name) else { return Ok(None) };
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        self.check_unique(table_name, table, &values, Some(id))?;

        let Some(row) = table.rows.get_mut(&id) else { return Ok(None) };
        for (k, v) in values {
            row.insert(k, v);
        }
        row.insert("updated_at".to_string(), Self::now());
        Ok(Some(row.clone()))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
