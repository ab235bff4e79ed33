use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse "created_at desc, full_name" style specs
    pub fn parse(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                FilterWhere::validate_column(col)?;
                let sort = match it.next() {
                    None => SortDirection::Asc,
                    Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                    Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    Some(dir) => return Err(FilterError::InvalidOrder(format!("unknown direction '{}' for {}", dir, col))),
                };
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    pub fn to_param(infos: &[FilterOrderInfo]) -> Option<String> {
        if infos.is_empty() { return None; }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{}.{}", i.column, i.sort.keyword()))
            .collect();
        Some(parts.join(","))
    }

    pub fn compare_rows(infos: &[FilterOrderInfo], a: &Value, b: &Value) -> Ordering {
        for info in infos {
            let left = a.get(&info.column).unwrap_or(&Value::Null);
            let right = b.get(&info.column).unwrap_or(&Value::Null);
            let ord = Self::compare_values(left, right).unwrap_or(Ordering::Equal);
            let ord = match info.sort {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal { return ord; }
        }
        Ordering::Equal
    }

    /// Total order over JSON scalars; timestamps compare chronologically, nulls sort first
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            (Value::String(x), Value::String(y)) => {
                match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                    (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
                    _ => Some(x.cmp(y)),
                }
            }
            _ => None,
        }
    }
}
