use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{CountMode, FilterCondition, FilterOp, FilterOrderInfo, FilterWhereInfo};

/// Query against one backend table: projection, conditions, ordering, range, count
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    conditions: Vec<FilterCondition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<u64>,
    offset: Option<u64>,
    count: Option<CountMode>,
    head: bool,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
            count: None,
            head: false,
        })
    }

    pub fn select(&mut self, columns: &[&str]) -> Result<&mut Self, FilterError> {
        for column in columns {
            if *column != "*" { FilterWhere::validate_column(column)?; }
        }
        self.select_columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(self)
    }

    pub fn filter(&mut self, column: &str, operator: FilterOp, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        let info = FilterWhereInfo { column: column.to_string(), operator, data: data.into() };
        FilterWhere::validate(&info)?;
        self.conditions.push(FilterCondition::Field(info));
        Ok(self)
    }

    pub fn eq(&mut self, column: &str, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        self.filter(column, FilterOp::Eq, data)
    }

    pub fn neq(&mut self, column: &str, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        self.filter(column, FilterOp::Neq, data)
    }

    pub fn is_null(&mut self, column: &str) -> Result<&mut Self, FilterError> {
        self.filter(column, FilterOp::Is, Value::Null)
    }

    /// Case-insensitive pattern match on any of the columns (`%` wildcards)
    pub fn any_ilike(&mut self, columns: &[&str], pattern: &str) -> Result<&mut Self, FilterError> {
        if columns.is_empty() {
            return Err(FilterError::InvalidWhereClause("or-group needs at least one column".to_string()));
        }
        let mut infos = Vec::with_capacity(columns.len());
        for column in columns {
            let info = FilterWhereInfo { column: column.to_string(), operator: FilterOp::ILike, data: Value::String(pattern.to_string()) };
            FilterWhere::validate(&info)?;
            infos.push(info);
        }
        self.conditions.push(FilterCondition::Or(infos));
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &str) -> Result<&mut Self, FilterError> {
        self.order_data.extend(FilterOrder::parse(order_spec)?);
        Ok(self)
    }

    /// Inclusive row range, zero-based
    pub fn range(&mut self, from: u64, to: u64) -> Result<&mut Self, FilterError> {
        if to < from {
            return Err(FilterError::InvalidRange(format!("range end {} precedes start {}", to, from)));
        }
        self.limit(to - from + 1)?;
        self.offset = Some(from);
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64) -> Result<&mut Self, FilterError> {
        if limit == 0 { return Err(FilterError::InvalidLimit("Limit must be positive".to_string())); }

        // Apply max limit from config
        let max_limit = u64::from(crate::config::CONFIG.query.max_page_size);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.query.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        Ok(self)
    }

    pub fn count(&mut self, mode: CountMode) -> &mut Self {
        self.count = Some(mode);
        self
    }

    /// Count only; no rows are returned
    pub fn head(&mut self) -> &mut Self {
        self.head = true;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn count_mode(&self) -> Option<CountMode> {
        self.count
    }

    pub fn is_head(&self) -> bool {
        self.head
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Query pairs in the REST filter dialect. Conditions only are used for update/delete.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.build_select_clause())];
        pairs.extend(self.to_condition_pairs());
        if let Some(order) = FilterOrder::to_param(&self.order_data) {
            pairs.push(("order".to_string(), order));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    pub fn to_condition_pairs(&self) -> Vec<(String, String)> {
        self.conditions.iter().map(FilterWhere::to_param).collect()
    }

    pub fn prefer_header(&self) -> Option<String> {
        self.count.map(|mode| format!("count={}", mode.keyword()))
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| FilterWhere::matches(c, row))
    }

    /// Evaluate against in-memory rows: returns the requested window and the total match count
    pub fn apply(&self, rows: &[Value]) -> (Vec<Value>, usize) {
        let mut matched: Vec<&Value> = rows.iter().filter(|row| self.matches(row)).collect();
        let total = matched.len();
        if self.head {
            return (vec![], total);
        }

        matched.sort_by(|a, b| FilterOrder::compare_rows(&self.order_data, a, b));

        let offset = self.offset.unwrap_or(0) as usize;
        let window = matched
            .into_iter()
            .skip(offset)
            .take(self.limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .map(|row| self.project(row))
            .collect();
        (window, total)
    }

    fn project(&self, row: &Value) -> Value {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            return row.clone();
        }
        match row {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| self.select_columns.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() { return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())); }
        let first_ok = name.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false);
        if !first_ok || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.join(",")
        }
    }
}
