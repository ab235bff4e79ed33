#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use admin_dashboard::backend::{MemoryBackend, NOTIFICATIONS, USER_PROFILES};
use admin_dashboard::config::{BackendConfig, StoreConfig};
use admin_dashboard::models::{Notification, Role, UserProfile, UserStatus};
use admin_dashboard::store::{AppStore, AuthStore, MemorySettingsStorage};

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "secret123";

pub fn memory_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

/// Backend with one registered account
pub fn backend_with_account() -> Arc<MemoryBackend> {
    let backend = memory_backend();
    let mut metadata = Map::new();
    metadata.insert("full_name".into(), json!("Ana Lima"));
    backend.register_account(EMAIL, PASSWORD, metadata);
    backend
}

pub fn auth_store(backend: &Arc<MemoryBackend>, config: StoreConfig) -> AuthStore {
    AuthStore::new(backend.clone(), config)
}

pub fn app_store(backend: &Arc<MemoryBackend>, config: StoreConfig) -> AppStore {
    AppStore::new(backend.clone(), config, Box::new(MemorySettingsStorage::new()))
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap_or_else(Utc::now)
}

/// Profile number `i`; higher numbers are newer. Even numbers are active.
pub fn profile(i: usize) -> UserProfile {
    let created = base_time() + Duration::minutes(i as i64);
    UserProfile {
        id: Uuid::new_v4(),
        email: format!("user{:02}@example.com", i),
        full_name: format!("User {:02}", i),
        avatar_url: None,
        role: if i == 0 { Role::Admin } else { Role::User },
        status: if i % 2 == 0 { UserStatus::Active } else { UserStatus::Inactive },
        created_at: created,
        updated_at: created,
    }
}

pub fn seed_users(backend: &MemoryBackend, count: usize) -> Result<Vec<UserProfile>> {
    let mut users = Vec::with_capacity(count);
    for i in 0..count {
        let user = profile(i);
        backend.seed(USER_PROFILES, &user)?;
        users.push(user);
    }
    Ok(users)
}

pub fn notification(user_id: Uuid, i: usize, is_read: bool) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id,
        title: format!("Notice {}", i),
        message: format!("Message body {}", i),
        is_read,
        created_at: base_time() + Duration::minutes(i as i64),
    }
}

/// Seeds `read` read notifications followed by `unread` newer unread ones
pub fn seed_notifications(backend: &MemoryBackend, read: usize, unread: usize) -> Result<Vec<Notification>> {
    let owner = Uuid::new_v4();
    let mut notifications = Vec::with_capacity(read + unread);
    for i in 0..read + unread {
        let n = notification(owner, i, i < read);
        backend.seed(NOTIFICATIONS, &n)?;
        notifications.push(n);
    }
    Ok(notifications)
}

// ---------------------------------------------------------------------------
// Mock REST backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub prefer: Option<String>,
    pub authorization: Option<String>,
    pub apikey: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
pub struct MockData {
    pub requests: Vec<RecordedRequest>,
    pub rows: Vec<Value>,
    pub total: Option<u64>,
    pub metadata: Map<String, Value>,
    /// Status and body returned by every `/rest/v1` call while set
    pub rest_failure: Option<(u16, Value)>,
    pub logout_failure: Option<u16>,
}

#[derive(Clone, Default)]
pub struct MockState {
    pub data: Arc<Mutex<MockData>>,
    pub user_id: Uuid,
}

impl MockState {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.data.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self, method: Method, path_suffix: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == method && r.path.ends_with(path_suffix))
    }

    pub fn with_data<T>(&self, f: impl FnOnce(&mut MockData) -> T) -> T {
        f(&mut self.data.lock().unwrap())
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: MockState,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state = MockState { user_id: Uuid::new_v4(), ..Default::default() };

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { base_url, state })
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            url: Some(self.base_url.clone()),
            anon_key: Some("anon-key".into()),
            request_timeout_secs: 5,
            health_check_timeout_secs: 2,
            site_url: Some("https://admin.example.com".into()),
        }
    }
}

fn auth_user(state: &MockState, metadata: &Map<String, Value>) -> Value {
    json!({
        "id": state.user_id,
        "email": EMAIL,
        "user_metadata": metadata,
        "created_at": "2024-03-01T12:00:00Z"
    })
}

fn session_body(state: &MockState, metadata: &Map<String, Value>) -> Value {
    json!({
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": auth_user(state, metadata)
    })
}

async fn handle(State(state): State<MockState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let query: Vec<(String, String)> = url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();
    let body_json = serde_json::from_slice::<Value>(&body).ok();
    let path = uri.path().to_string();

    let mut data = state.data.lock().unwrap();
    data.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        prefer: header("prefer"),
        authorization: header("authorization"),
        apikey: header("apikey"),
        body: body_json.clone(),
    });

    if path.starts_with("/rest/v1/") {
        if let Some((status, body)) = data.rest_failure.clone() {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(body)).into_response();
        }
        return match method {
            Method::GET | Method::HEAD => {
                let total = data.total.unwrap_or(data.rows.len() as u64);
                let mut response = Json(Value::Array(data.rows.clone())).into_response();
                let range = if data.rows.is_empty() {
                    format!("*/{}", total)
                } else {
                    format!("0-{}/{}", data.rows.len() - 1, total)
                };
                if let Ok(value) = HeaderValue::from_str(&range) {
                    response.headers_mut().insert("content-range", value);
                }
                response
            }
            Method::POST => StatusCode::CREATED.into_response(),
            _ => StatusCode::NO_CONTENT.into_response(),
        };
    }

    let grant_type = query.iter().find(|(k, _)| k == "grant_type").map(|(_, v)| v.clone());
    match (method, path.as_str()) {
        (Method::POST, "/auth/v1/token") if grant_type.as_deref() == Some("password") => {
            let credentials = body_json.unwrap_or_default();
            if credentials["email"] == EMAIL && credentials["password"] == PASSWORD {
                Json(session_body(&state, &data.metadata)).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
                )
                    .into_response()
            }
        }
        (Method::POST, "/auth/v1/token") => Json(session_body(&state, &data.metadata)).into_response(),
        (Method::POST, "/auth/v1/logout") => match data.logout_failure {
            Some(status) => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(json!({"msg": "logout failed"})),
            )
                .into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        (Method::GET, "/auth/v1/user") => Json(auth_user(&state, &data.metadata)).into_response(),
        (Method::PUT, "/auth/v1/user") => {
            if let Some(Value::Object(updates)) = body_json.and_then(|b| b.get("data").cloned()) {
                data.metadata.extend(updates);
            }
            Json(auth_user(&state, &data.metadata)).into_response()
        }
        (Method::POST, "/auth/v1/recover") => Json(json!({})).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"msg": "not found"}))).into_response(),
    }
}
