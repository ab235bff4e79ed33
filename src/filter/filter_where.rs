use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::types::{FilterCondition, FilterOp, FilterWhereInfo};

pub struct FilterWhere;

impl FilterWhere {
    pub fn validate_column(column: &str) -> Result<(), FilterError> {
        if column.is_empty() { return Err(FilterError::InvalidColumn("Column name cannot be empty".to_string())); }
        let mut chars = column.chars();
        let first_ok = chars.next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false);
        if !first_ok || !column.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    pub fn validate(info: &FilterWhereInfo) -> Result<(), FilterError> {
        Self::validate_column(&info.column)?;
        match info.operator {
            FilterOp::Like | FilterOp::ILike if !info.data.is_string() => {
                Err(FilterError::InvalidWhereClause(format!("{} requires a string pattern", info.operator.keyword())))
            }
            FilterOp::Is if !(info.data.is_null() || info.data.is_boolean()) => {
                Err(FilterError::InvalidWhereClause("is requires null or a boolean".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Render a condition as one query pair of the REST filter dialect
    pub fn to_param(condition: &FilterCondition) -> (String, String) {
        match condition {
            FilterCondition::Field(info) => (
                info.column.clone(),
                format!("{}.{}", info.operator.keyword(), Self::encode_value(info.operator, &info.data)),
            ),
            FilterCondition::Or(infos) => {
                let parts: Vec<String> = infos
                    .iter()
                    .map(|i| format!("{}.{}.{}", i.column, i.operator.keyword(), Self::quote(&Self::encode_value(i.operator, &i.data))))
                    .collect();
                ("or".to_string(), format!("({})", parts.join(",")))
            }
        }
    }

    pub fn matches(condition: &FilterCondition, row: &Value) -> bool {
        match condition {
            FilterCondition::Field(info) => Self::matches_info(info, row),
            FilterCondition::Or(infos) => infos.iter().any(|i| Self::matches_info(i, row)),
        }
    }

    fn matches_info(info: &FilterWhereInfo, row: &Value) -> bool {
        let actual = row.get(&info.column).unwrap_or(&Value::Null);
        match info.operator {
            FilterOp::Eq => Self::values_equal(actual, &info.data),
            FilterOp::Neq => !Self::values_equal(actual, &info.data),
            FilterOp::Gt => FilterOrder::compare_values(actual, &info.data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(FilterOrder::compare_values(actual, &info.data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => FilterOrder::compare_values(actual, &info.data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(FilterOrder::compare_values(actual, &info.data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => match (actual.as_str(), info.data.as_str()) {
                (Some(text), Some(pattern)) => like_match(pattern, text, info.operator == FilterOp::ILike),
                _ => false,
            },
            FilterOp::Is => actual == &info.data,
        }
    }

    fn values_equal(actual: &Value, expected: &Value) -> bool {
        if actual == expected { return true; }
        match (actual, expected) {
            // Query values travel as strings; compare against the row's typed value
            (Value::Bool(b), Value::String(s)) => s.parse::<bool>().map(|p| p == *b).unwrap_or(false),
            (Value::Number(n), Value::String(s)) => s.parse::<f64>().ok().zip(n.as_f64()).map(|(a, b)| a == b).unwrap_or(false),
            _ => FilterOrder::compare_values(actual, expected) == Some(Ordering::Equal),
        }
    }

    fn encode_value(op: FilterOp, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::String(s) if matches!(op, FilterOp::Like | FilterOp::ILike) => s.replace('%', "*"),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    // Values inside or=(...) must be quoted when they contain list syntax
    fn quote(value: &str) -> String {
        if value.chars().any(|c| matches!(c, ',' | '(' | ')' | '"' | ':')) {
            format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            value.to_string()
        }
    }
}

/// SQL LIKE matching with `%` (any run) and `_` (single char) wildcards
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // dp[j] == pattern[..i] matches text[..j]
    let mut dp = vec![false; t.len() + 1];
    dp[0] = true;
    for pc in &p {
        let mut next = vec![false; t.len() + 1];
        if *pc == '%' {
            let mut seen = false;
            for j in 0..=t.len() {
                seen = seen || dp[j];
                next[j] = seen;
            }
        } else {
            for j in 1..=t.len() {
                next[j] = dp[j - 1] && (*pc == '_' || *pc == t[j - 1]);
            }
        }
        dp = next;
    }
    dp[t.len()]
}
