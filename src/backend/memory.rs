//! In-process backend.
//!
//! Keeps accounts, the current session and table rows in memory, evaluates
//! [`Filter`]s directly against JSON rows, and exposes knobs for failure
//! injection, call counting and holding table requests in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use uuid::Uuid;

use super::{Backend, QueryResult, NOTIFICATIONS, USER_PROFILES};
use crate::error::BackendError;
use crate::filter::Filter;
use crate::models::{AuthResponse, AuthUser, Session};

/// Backend calls, for counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    SignIn,
    SignUp,
    SignOut,
    GetSession,
    GetUser,
    ResetPassword,
    UpdateUser,
    Select,
    Insert,
    Update,
    Delete,
}

struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    tables: HashMap<String, Vec<Value>>,
    unavailable: Option<String>,
    failures: HashMap<Call, VecDeque<BackendError>>,
    calls: Vec<(Call, Option<String>)>,
    password_resets: Vec<String>,
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    // Table requests wait while the gate is closed
    gate: watch::Sender<bool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.tables.insert(USER_PROFILES.to_string(), Vec::new());
        state.tables.insert(NOTIFICATIONS.to_string(), Vec::new());
        let (gate, _) = watch::channel(true);
        Self { state: Mutex::new(state), gate }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an account that can sign in; returns its identity
    pub fn register_account(&self, email: &str, password: &str, metadata: Map<String, Value>) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
            created_at: Some(Utc::now()),
        };
        self.lock().accounts.insert(
            email.to_string(),
            Account { password: password.to_string(), user: user.clone() },
        );
        user
    }

    /// Pretend a session was persisted by an earlier run
    pub fn restore_session(&self, email: &str) -> Option<Session> {
        let mut state = self.lock();
        let user = state.accounts.get(email)?.user.clone();
        let session = new_session(user);
        state.session = Some(session.clone());
        Some(session)
    }

    pub fn seed<T: Serialize>(&self, table: &str, row: &T) -> Result<(), BackendError> {
        let value = serde_json::to_value(row)?;
        self.lock().tables.entry(table.to_string()).or_default().push(value);
        Ok(())
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// While set, every call fails with this message (and the health probe fails)
    pub fn set_unavailable(&self, message: Option<&str>) {
        self.lock().unavailable = message.map(str::to_string);
    }

    /// Fail the next call of this kind with the given error
    pub fn fail_next(&self, call: Call, error: BackendError) {
        self.lock().failures.entry(call).or_default().push_back(error);
    }

    pub fn call_count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|(c, _)| *c == call).count()
    }

    pub fn table_call_count(&self, call: Call, table: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(c, t)| *c == call && t.as_deref() == Some(table))
            .count()
    }

    pub fn password_resets(&self) -> Vec<String> {
        self.lock().password_resets.clone()
    }

    /// Hold table requests in flight until [`release`](Self::release)
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn wait_for_gate(&self) {
        let mut rx = self.gate.subscribe();
        // Sender lives as long as self, so this only errors if it was dropped
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Record the call and apply injected failures
    fn enter(&self, call: Call, table: Option<&str>) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        let mut state = self.lock();
        state.calls.push((call, table.map(str::to_string)));
        if let Some(message) = &state.unavailable {
            return Err(BackendError::api(503, message.clone()));
        }
        if let Some(err) = state.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }
}

fn new_session(user: AuthUser) -> Session {
    Session {
        access_token: format!("memory-{}", Uuid::new_v4().simple()),
        refresh_token: Some(format!("refresh-{}", Uuid::new_v4().simple())),
        token_type: "bearer".to_string(),
        expires_in: Some(3600),
        expires_at: None,
        user,
    }
    .stamp_expiry(Utc::now())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let mut state = self.enter(Call::SignIn, None)?;
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(BackendError::api_with_code(400, "invalid_credentials", "Invalid login credentials")),
        };
        let session = new_session(user);
        state.session = Some(session.clone());
        Ok(AuthResponse::from_session(session))
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> Result<AuthResponse, BackendError> {
        let mut state = self.enter(Call::SignUp, None)?;
        if state.accounts.contains_key(email) {
            return Err(BackendError::api_with_code(422, "user_already_exists", "User already registered"));
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
            created_at: Some(Utc::now()),
        };
        state.accounts.insert(
            email.to_string(),
            Account { password: password.to_string(), user: user.clone() },
        );
        let session = new_session(user);
        state.session = Some(session.clone());
        Ok(AuthResponse::from_session(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let mut state = self.enter(Call::SignOut, None)?;
        state.session = None;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let state = self.enter(Call::GetSession, None)?;
        Ok(state.session.clone())
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let state = self.enter(Call::GetUser, None)?;
        Ok(state.session.as_ref().map(|s| s.user.clone()))
    }

    async fn reset_password_for_email(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), BackendError> {
        let mut state = self.enter(Call::ResetPassword, None)?;
        state.password_resets.push(email.to_string());
        Ok(())
    }

    async fn update_user_metadata(&self, data: Map<String, Value>) -> Result<AuthUser, BackendError> {
        let mut state = self.enter(Call::UpdateUser, None)?;
        let Some(session) = state.session.as_mut() else {
            return Err(BackendError::NotAuthenticated);
        };
        session.user.user_metadata.extend(data);
        let user = session.user.clone();
        if let Some(email) = user.email.clone() {
            if let Some(account) = state.accounts.get_mut(&email) {
                account.user = user.clone();
            }
        }
        Ok(user)
    }

    async fn select(&self, filter: &Filter) -> Result<QueryResult, BackendError> {
        self.wait_for_gate().await;
        let state = self.enter(Call::Select, Some(filter.table_name()))?;
        let rows = state
            .tables
            .get(filter.table_name())
            .ok_or_else(|| BackendError::api_with_code(404, "42P01", format!("relation \"{}\" does not exist", filter.table_name())))?;
        let (rows, total) = filter.apply(rows);
        Ok(QueryResult {
            rows,
            count: filter.count_mode().map(|_| total as u64),
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        self.wait_for_gate().await;
        let mut state = self.enter(Call::Insert, Some(table))?;
        let now = serde_json::to_value(Utc::now())?;
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| BackendError::api_with_code(404, "42P01", format!("relation \"{}\" does not exist", table)))?;
        for row in rows {
            let Value::Object(mut map) = row else {
                return Err(BackendError::api(400, "insert rows must be JSON objects"));
            };
            map.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            map.entry("created_at").or_insert_with(|| now.clone());
            if table == USER_PROFILES {
                map.entry("updated_at").or_insert_with(|| now.clone());
            }
            target.push(Value::Object(map));
        }
        Ok(())
    }

    async fn update(&self, filter: &Filter, changes: Value) -> Result<(), BackendError> {
        self.wait_for_gate().await;
        let mut state = self.enter(Call::Update, Some(filter.table_name()))?;
        let Value::Object(changes) = changes else {
            return Err(BackendError::api(400, "update payload must be a JSON object"));
        };
        if let Some(rows) = state.tables.get_mut(filter.table_name()) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                if let Value::Object(map) = row {
                    map.extend(changes.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), BackendError> {
        self.wait_for_gate().await;
        let mut state = self.enter(Call::Delete, Some(filter.table_name()))?;
        if let Some(rows) = state.tables.get_mut(filter.table_name()) {
            rows.retain(|row| !filter.matches(row));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let backend = MemoryBackend::new();
        backend.register_account("ana@example.com", "secret123", Map::new());

        let err = backend.sign_in_with_password("ana@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");

        let response = backend.sign_in_with_password("ana@example.com", "secret123").await.unwrap();
        assert!(response.session.is_some());
        assert!(backend.get_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let backend = MemoryBackend::new();
        backend
            .insert(USER_PROFILES, vec![json!({"email": "a@b.c", "full_name": "A"})])
            .await
            .unwrap();
        let rows = backend.rows(USER_PROFILES);
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["id"].is_string());
        assert!(rows[0]["created_at"].is_string());
        assert!(rows[0]["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let backend = MemoryBackend::new();
        backend.fail_next(Call::Select, BackendError::api(500, "boom"));
        let filter = Filter::new(NOTIFICATIONS).unwrap();
        assert!(backend.select(&filter).await.is_err());
        assert!(backend.select(&filter).await.is_ok());
        assert_eq!(backend.table_call_count(Call::Select, NOTIFICATIONS), 2);
    }

    #[tokio::test]
    async fn test_unavailable_fails_health_check() {
        let backend = MemoryBackend::new();
        assert!(backend.health_check().await);
        backend.set_unavailable(Some("insufficient_resources"));
        assert!(!backend.health_check().await);
    }
}
