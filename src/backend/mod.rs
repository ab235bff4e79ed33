//! Backend client adapter.
//!
//! The hosted backend offers password auth plus tabular data over two tables.
//! Stores only ever talk to it through the [`Backend`] trait so that the REST
//! client and the in-memory backend are interchangeable.

pub mod memory;
pub mod rest;
pub mod session;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::filter::{CountMode, Filter};
use crate::models::{AuthResponse, AuthUser, Session};

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError};

pub const USER_PROFILES: &str = "user_profiles";
pub const NOTIFICATIONS: &str = "notifications";

/// Rows returned by a select plus the total match count when one was requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError>;

    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> Result<AuthResponse, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Current session, restored from persistence and refreshed if expired
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Canonical user object for the current session
    async fn get_user(&self) -> Result<Option<AuthUser>, BackendError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<(), BackendError>;

    async fn update_user_metadata(&self, data: Map<String, Value>) -> Result<AuthUser, BackendError>;

    async fn select(&self, filter: &Filter) -> Result<QueryResult, BackendError>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError>;

    async fn update(&self, filter: &Filter, changes: Value) -> Result<(), BackendError>;

    async fn delete(&self, filter: &Filter) -> Result<(), BackendError>;

    /// Reachability probe: a minimal count select against `user_profiles`
    async fn health_check(&self) -> bool {
        let probe = match health_probe() {
            Ok(filter) => filter,
            Err(e) => {
                tracing::warn!("Health probe could not be built: {}", e);
                return false;
            }
        };
        match self.select(&probe).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Backend health check failed: {}", e);
                false
            }
        }
    }
}

pub fn health_probe() -> Result<Filter, BackendError> {
    let mut filter = Filter::new(USER_PROFILES)?;
    filter.select(&["id"])?.limit(1)?.count(CountMode::Exact);
    Ok(filter)
}

/// Count-only query, optionally narrowed by a single equality condition
pub fn count_query(table: &str, eq: Option<(&str, Value)>) -> Result<Filter, BackendError> {
    let mut filter = Filter::new(table)?;
    filter.count(CountMode::Exact).head();
    if let Some((column, value)) = eq {
        filter.eq(column, value)?;
    }
    Ok(filter)
}

/// Decode JSON rows into typed records, failing on the first bad row
pub fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}
