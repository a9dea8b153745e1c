use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{Condition, SqlResult};

/// SQL builder for one table. Every statement returns rows as JSON objects
/// (`row_to_json`) in a column named `row`, so callers never decode columns
/// individually.
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            conditions: vec![],
        })
    }

    pub fn select<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<&mut Self, FilterError> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        Self::validate_select_columns(&columns)?;
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_conditions(&mut self, conditions: &[Condition]) -> Result<&mut Self, FilterError> {
        for condition in conditions {
            Self::validate_column(&condition.column)?;
        }
        self.conditions = conditions.to_vec();
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.conditions, 0)?;
        let order_clause = if self.selects_id() { " ORDER BY t.\"id\"" } else { "" };
        let query = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT {} FROM \"{}\" WHERE {}) t{}",
            self.build_select_clause(),
            self.table_name,
            where_clause,
            order_clause,
        );
        Ok(SqlResult { query, params })
    }

    /// INSERT of the given values. `$1` is the values object; postgres casts
    /// each field to its column type through `jsonb_populate_record`, and
    /// omitted columns keep their defaults.
    pub fn to_insert_sql(&self, values: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let columns = self.write_columns(values)?;
        let query = format!(
            "WITH created AS (INSERT INTO \"{table}\" ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING *) \
             SELECT row_to_json(created) AS row FROM created",
            table = self.table_name,
            cols = columns.join(", "),
        );
        Ok(SqlResult { query, params: vec![Value::Object(values.clone())] })
    }

    /// UPDATE by primary key. `$1` is the values object, `$2` the id.
    pub fn to_update_sql(&self, id: i64, values: &Map<String, Value>, touch_updated_at: bool) -> Result<SqlResult, FilterError> {
        let columns = self.write_columns(values)?;
        let mut assignments: Vec<String> = columns.iter().map(|c| format!("{c} = src.{c}")).collect();
        if touch_updated_at {
            assignments.push("\"updated_at\" = now()".to_string());
        }
        let query = format!(
            "WITH changed AS (UPDATE \"{table}\" AS target SET {sets} FROM jsonb_populate_record(NULL::\"{table}\", $1) AS src \
             WHERE target.\"id\" = $2 RETURNING target.*) SELECT row_to_json(changed) AS row FROM changed",
            table = self.table_name,
            sets = assignments.join(", "),
        );
        Ok(SqlResult { query, params: vec![Value::Object(values.clone()), Value::from(id)] })
    }

    fn write_columns(&self, values: &Map<String, Value>) -> Result<Vec<String>, FilterError> {
        if values.is_empty() {
            return Err(FilterError::EmptyValues(self.table_name.clone()));
        }
        values
            .keys()
            .map(|k| Self::validate_column(k).map(|_| format!("\"{}\"", k)))
            .collect()
    }

    fn selects_id(&self) -> bool {
        self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "id" || c == "*")
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    pub(crate) fn validate_column(column: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn validate_select_columns(columns: &[String]) -> Result<(), FilterError> {
        for column in columns {
            if column == "*" { continue; }
            Self::validate_column(column)?;
        }
        Ok(())
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }
}
