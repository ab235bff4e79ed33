//! REST client for the hosted backend.
//!
//! Auth lives under `/auth/v1`, tables under `/rest/v1/{table}` using the
//! PostgREST filter dialect produced by [`Filter::to_query_pairs`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::session::SessionStore;
use super::{Backend, QueryResult};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::filter::Filter;
use crate::models::{AuthResponse, AuthUser, Session};

#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: String,
    /// Current session; mirrored into `store` on every change
    session: RwLock<Option<Session>>,
    store: Box<dyn SessionStore>,
}

impl RestBackend {
    /// Build a client from configuration, restoring any persisted session
    pub fn new(config: &BackendConfig, store: Box<dyn SessionStore>) -> Result<Self, BackendError> {
        let url = config.url.as_deref().ok_or(BackendError::ConfigMissing("DASHBOARD_BACKEND_URL"))?;
        let anon_key = config.anon_key.clone().ok_or(BackendError::ConfigMissing("DASHBOARD_ANON_KEY"))?;

        // Url::join drops the last path segment unless the base ends in '/'
        let normalized = format!("{}/", url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| BackendError::Query(format!("invalid backend URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::connection(format!("failed to build HTTP client: {}", e)))?;

        let restored = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring unreadable persisted session: {}", e);
                None
            }
        };

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url,
                anon_key,
                session: RwLock::new(restored),
                store,
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| BackendError::Query(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn auth_url(&self, path: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("auth/v1/{}", path))
    }

    fn rest_url(&self, table: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{}", table))
    }

    async fn access_token(&self) -> Option<String> {
        self.inner.session.read().await.as_ref().map(|s| s.access_token.clone())
    }

    /// Attach the API key and the session token (or the anon key when signed out)
    async fn authorized(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self.access_token().await.unwrap_or_else(|| self.inner.anon_key.clone());
        self.inner
            .client
            .request(method, url)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(parse_error(status, &body))
    }

    async fn store_session(&self, session: Session) {
        if let Err(e) = self.inner.store.save(&session) {
            warn!("Failed to persist session: {}", e);
        }
        *self.inner.session.write().await = Some(session);
    }

    async fn clear_session(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!("Failed to clear persisted session: {}", e);
        }
        *self.inner.session.write().await = None;
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, BackendError> {
        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let request = self
            .authorized(Method::POST, url)
            .await
            .json(&json!({ "refresh_token": refresh_token }));

        match self.send(request).await {
            Ok(response) => {
                let session = response.json::<Session>().await?.stamp_expiry(Utc::now());
                self.store_session(session.clone()).await;
                debug!("Session refreshed");
                Ok(Some(session))
            }
            // Refresh token rejected: the session is gone
            Err(BackendError::Api { status, .. }) if (400..500).contains(&status) => {
                self.clear_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Backend for RestBackend {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self
            .authorized(Method::POST, url)
            .await
            .json(&json!({ "email": email, "password": password }));

        let session = self.send(request).await?.json::<Session>().await?.stamp_expiry(Utc::now());
        self.store_session(session.clone()).await;
        Ok(AuthResponse::from_session(session))
    }

    #[instrument(skip(self, password, metadata))]
    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> Result<AuthResponse, BackendError> {
        let request = self
            .authorized(Method::POST, self.auth_url("signup")?)
            .await
            .json(&json!({ "email": email, "password": password, "data": metadata }));

        let body = self.send(request).await?.json::<Value>().await?;

        // With auto-confirm the provider returns a full session, otherwise just the user
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<Session>(body)?.stamp_expiry(Utc::now());
            self.store_session(session.clone()).await;
            return Ok(AuthResponse::from_session(session));
        }
        let user_value = match body.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => body,
        };
        let user = serde_json::from_value::<AuthUser>(user_value)?;
        Ok(AuthResponse { user: Some(user), session: None })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(token) = self.access_token().await else {
            return Ok(());
        };
        let request = self
            .inner
            .client
            .post(self.auth_url("logout")?)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token);

        let result = match self.send(request).await {
            Ok(_) => Ok(()),
            // Token already invalid on the server side
            Err(BackendError::Api { status: 401 | 403 | 404, .. }) => Ok(()),
            Err(e) => Err(e),
        };
        self.clear_session().await;
        result
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let current = self.inner.session.read().await.clone();
        match current {
            None => Ok(None),
            Some(session) if !session.is_expired(Utc::now()) => Ok(Some(session)),
            Some(session) => match session.refresh_token {
                Some(refresh_token) => self.refresh(&refresh_token).await,
                None => {
                    self.clear_session().await;
                    Ok(None)
                }
            },
        }
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, BackendError> {
        if self.access_token().await.is_none() {
            return Ok(None);
        }
        let request = self.authorized(Method::GET, self.auth_url("user")?).await;
        match self.send(request).await {
            Ok(response) => Ok(Some(response.json::<AuthUser>().await?)),
            Err(BackendError::Api { status: 401, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<(), BackendError> {
        let mut url = self.auth_url("recover")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        let request = self.authorized(Method::POST, url).await.json(&json!({ "email": email }));
        self.send(request).await?;
        Ok(())
    }

    async fn update_user_metadata(&self, data: Map<String, Value>) -> Result<AuthUser, BackendError> {
        if self.access_token().await.is_none() {
            return Err(BackendError::NotAuthenticated);
        }
        let request = self
            .authorized(Method::PUT, self.auth_url("user")?)
            .await
            .json(&json!({ "data": data }));
        let user = self.send(request).await?.json::<AuthUser>().await?;

        let updated = self.inner.session.read().await.clone().map(|mut session| {
            session.user = user.clone();
            session
        });
        if let Some(session) = updated {
            self.store_session(session).await;
        }
        Ok(user)
    }

    #[instrument(skip(self), fields(table = filter.table_name()))]
    async fn select(&self, filter: &Filter) -> Result<QueryResult, BackendError> {
        let method = if filter.is_head() { Method::HEAD } else { Method::GET };
        let mut request = self
            .authorized(method, self.rest_url(filter.table_name())?)
            .await
            .query(&filter.to_query_pairs());
        if let Some(prefer) = filter.prefer_header() {
            request = request.header("Prefer", prefer);
        }

        let response = self.send(request).await?;
        let count = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows = if filter.is_head() {
            Vec::new()
        } else {
            response.json::<Vec<Value>>().await?
        };
        Ok(QueryResult { rows, count })
    }

    #[instrument(skip(self, rows))]
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        let request = self
            .authorized(Method::POST, self.rest_url(table)?)
            .await
            .header("Prefer", "return=minimal")
            .json(&rows);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, changes), fields(table = filter.table_name()))]
    async fn update(&self, filter: &Filter, changes: Value) -> Result<(), BackendError> {
        let request = self
            .authorized(Method::PATCH, self.rest_url(filter.table_name())?)
            .await
            .query(&filter.to_condition_pairs())
            .header("Prefer", "return=minimal")
            .json(&changes);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(table = filter.table_name()))]
    async fn delete(&self, filter: &Filter) -> Result<(), BackendError> {
        let request = self
            .authorized(Method::DELETE, self.rest_url(filter.table_name())?)
            .await
            .query(&filter.to_condition_pairs());
        self.send(request).await?;
        Ok(())
    }
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/42`
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

/// Build an API error from whichever message field the backend used
fn parse_error(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let message = ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            let code = ["error_code", "code"].iter().find_map(|key| {
                json.get(*key).and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            });
            BackendError::Api { status, code, message }
        }
        Err(_) if body.trim().is_empty() => BackendError::api(status, format!("request failed with status {}", status)),
        Err(_) => BackendError::api(status, body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemorySessionStore;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/7"), Some(7));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_parse_error_prefers_message_fields() {
        let err = parse_error(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(err, BackendError::Api { status: 400, code: None, message: "Invalid login credentials".into() });

        let err = parse_error(409, r#"{"code":"23505","message":"duplicate key value"}"#);
        assert_eq!(err, BackendError::Api { status: 409, code: Some("23505".into()), message: "duplicate key value".into() });

        let err = parse_error(502, "");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_new_requires_url_and_key() {
        let mut config = crate::config::config().backend.clone();
        config.url = None;
        config.anon_key = Some("anon".into());
        let err = RestBackend::new(&config, Box::new(MemorySessionStore::new())).err();
        assert_eq!(err, Some(BackendError::ConfigMissing("DASHBOARD_BACKEND_URL")));
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let mut config = crate::config::config().backend.clone();
        config.url = Some("https://project.example.co/base".into());
        config.anon_key = Some("anon".into());
        let backend = RestBackend::new(&config, Box::new(MemorySessionStore::new())).unwrap();
        assert_eq!(backend.rest_url("notifications").unwrap().as_str(), "https://project.example.co/base/rest/v1/notifications");
        assert_eq!(backend.auth_url("signup").unwrap().as_str(), "https://project.example.co/base/auth/v1/signup");
    }
}
