use serde_json::Value;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{Condition, FilterOp};

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Render a conjunction of conditions. Returns the clause body (without
    /// `WHERE`) and the positional parameters it references.
    pub fn generate(conditions: &[Condition], starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(conditions)
    }

    fn build(&mut self, conditions: &[Condition]) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = Vec::with_capacity(conditions.len());
        for condition in conditions {
            Filter::validate_column(&condition.column)?;
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone()))) }
            }
            FilterOp::AnyOf => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() { return Ok("1=0".to_string()); }
                    if !values.iter().all(|v| v.as_i64().is_some()) {
                        return Err(FilterError::InvalidOperatorData(format!("$any on {} requires integers", condition.column)));
                    }
                    // One array parameter however many ids there are
                    Ok(format!("{} = ANY({})", quoted_column, self.param(condition.data.clone())))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone())))
                }
            }
            FilterOp::Contains => {
                let needle = condition.data.as_str().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("$contains on {} requires a string", condition.column))
                })?;
                let pattern = format!("%{}%", escape_like(needle));
                Ok(format!("{} LIKE {}", quoted_column, self.param(Value::String(pattern))))
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Escape LIKE wildcards so user input is matched literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
