use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}
