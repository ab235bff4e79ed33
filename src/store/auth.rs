use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::StoreConfig;
use crate::error::{BackendError, UNAVAILABLE_MESSAGE};
use crate::models::{AuthResponse, AuthUser, Session};
use crate::observer::{ObserverRegistry, StoreEvent, StoreObserver, SubscriptionId};
use crate::store::request::Deadline;
use crate::store::{ActionError, ActionResult};

/// Snapshot of the authentication store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set once the signed-in status is known: after `initialize`, or after
    /// a sign-in, sign-up or sign-out has settled
    pub initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unknown,
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        if self.user.is_some() {
            AuthPhase::Authenticated
        } else if self.initialized {
            AuthPhase::Unauthenticated
        } else {
            AuthPhase::Unknown
        }
    }
}

/// Owns the signed-in identity and its session.
///
/// Overlapping calls are not serialized; callers (the route guard, the view)
/// are expected not to issue them.
pub struct AuthStore {
    backend: Arc<dyn Backend>,
    config: StoreConfig,
    state: RwLock<AuthState>,
    observers: ObserverRegistry,
    deadline: Deadline,
}

impl AuthStore {
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig) -> Self {
        let deadline = Deadline::new(config.operation_timeout());
        Self {
            backend,
            config,
            state: RwLock::new(AuthState::default()),
            observers: ObserverRegistry::new(),
            deadline,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.read().unwrap_or_else(|e| e.into_inner()).phase()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == AuthPhase::Authenticated
    }

    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Abort outstanding backend calls; they settle as cancelled
    pub fn cancel_pending(&self) {
        self.deadline.cancel_all();
    }

    fn update(&self, apply: impl FnOnce(&mut AuthState)) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            apply(&mut state);
        }
        self.observers.notify(StoreEvent::AuthChanged);
    }

    fn begin(&self) {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn fail(&self, message: String) -> ActionResult {
        self.update(|s| {
            s.is_loading = false;
            s.error = Some(message.clone());
        });
        Err(ActionError::new(message))
    }

    /// Failed sign-in or sign-up: whoever was signed in before stays signed in
    fn reject(&self, message: String) -> ActionResult {
        self.update(|s| {
            s.is_loading = false;
            s.error = Some(message.clone());
            s.initialized = true;
        });
        Err(ActionError::new(message))
    }

    fn authenticate(&self, response: AuthResponse) {
        let AuthResponse { user, session } = response;
        let user = user.or_else(|| session.as_ref().map(|s| s.user.clone()));
        self.update(|s| {
            s.user = user;
            s.session = session;
            s.is_loading = false;
            s.error = None;
            s.initialized = true;
        });
    }

    async fn probe(&self) -> bool {
        let reachable = self
            .deadline
            .run_within(self.config.health_check_timeout(), async {
                Ok::<_, BackendError>(self.backend.health_check().await)
            })
            .await;
        reachable.unwrap_or(false)
    }

    /// Restore the persisted session, if any. Never fails; errors land in `error`.
    pub async fn initialize(&self) {
        self.update(|s| s.is_loading = true);

        match self.deadline.run(self.backend.get_session()).await {
            Ok(Some(session)) => {
                info!("Restored session for {}", session.user.id);
                self.update(|s| {
                    s.user = Some(session.user.clone());
                    s.session = Some(session);
                    s.is_loading = false;
                    s.error = None;
                    s.initialized = true;
                });
            }
            Ok(None) => {
                debug!("No session to restore");
                self.update(|s| {
                    s.user = None;
                    s.session = None;
                    s.is_loading = false;
                    s.error = None;
                    s.initialized = true;
                });
            }
            Err(e) => {
                warn!("Session restore failed: {}", e);
                self.update(|s| {
                    s.is_loading = false;
                    s.error = Some(e.user_message());
                    s.initialized = true;
                });
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ActionResult {
        self.begin();

        if !self.probe().await {
            warn!("Backend unreachable, sign-in not attempted");
            return self.reject(UNAVAILABLE_MESSAGE.to_string());
        }

        match self.deadline.run(self.backend.sign_in_with_password(email, password)).await {
            Ok(response) => {
                info!("Signed in {}", email);
                self.authenticate(response);
                Ok(())
            }
            Err(e) => {
                warn!("Sign-in failed for {}: {}", email, e);
                self.reject(e.user_message())
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>) -> ActionResult {
        self.begin();

        if !self.probe().await {
            warn!("Backend unreachable, sign-up not attempted");
            return self.reject(UNAVAILABLE_MESSAGE.to_string());
        }

        let mut metadata = Map::new();
        if let Some(name) = full_name {
            metadata.insert("full_name".to_string(), Value::String(name.to_string()));
        }

        match self.deadline.run(self.backend.sign_up(email, password, metadata)).await {
            Ok(response) => {
                info!("Registered {}", email);
                self.authenticate(response);
                Ok(())
            }
            Err(e) => {
                warn!("Sign-up failed for {}: {}", email, e);
                self.reject(e.user_message())
            }
        }
    }

    /// Local identity is cleared whether or not the backend confirms
    pub async fn sign_out(&self) -> ActionResult {
        self.update(|s| s.is_loading = true);

        let result = self.deadline.run(self.backend.sign_out()).await;
        let message = result.as_ref().err().map(|e| {
            warn!("Remote sign-out failed: {}", e);
            e.user_message()
        });

        self.update(|s| {
            s.user = None;
            s.session = None;
            s.is_loading = false;
            s.error = message.clone();
            s.initialized = true;
        });
        info!("Signed out");

        match message {
            Some(message) => Err(ActionError::new(message)),
            None => Ok(()),
        }
    }

    pub async fn reset_password(&self, email: &str) -> ActionResult {
        self.begin();

        let redirect = self
            .config
            .site_url
            .as_deref()
            .map(|site| format!("{}/reset-password", site.trim_end_matches('/')));

        match self
            .deadline
            .run(self.backend.reset_password_for_email(email, redirect.as_deref()))
            .await
        {
            Ok(()) => {
                info!("Password reset requested for {}", email);
                self.update(|s| s.is_loading = false);
                Ok(())
            }
            Err(e) => {
                warn!("Password reset failed for {}: {}", email, e);
                self.fail(e.user_message())
            }
        }
    }

    /// Write metadata, then replace the local identity with the backend's copy
    pub async fn update_profile(&self, updates: Map<String, Value>) -> ActionResult {
        self.begin();

        let written = match self.deadline.run(self.backend.update_user_metadata(updates)).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Profile update failed: {}", e);
                return self.fail(e.user_message());
            }
        };

        match self.deadline.run(self.backend.get_user()).await {
            Ok(canonical) => {
                let user = canonical.unwrap_or(written);
                debug!("Refreshed identity for {}", user.id);
                self.update(|s| {
                    if let Some(session) = s.session.as_mut() {
                        session.user = user.clone();
                    }
                    s.user = Some(user);
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(())
            }
            Err(e) => {
                warn!("Identity refresh after profile update failed: {}", e);
                self.fail(e.user_message())
            }
        }
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{Call, MemoryBackend};

    fn store(backend: &Arc<MemoryBackend>) -> AuthStore {
        AuthStore::new(backend.clone(), StoreConfig::default())
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = AuthState::default();
        assert_eq!(state.phase(), AuthPhase::Unknown);
        state.initialized = true;
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sign_up_stores_full_name() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = store(&backend);

        auth.sign_up("bia@example.com", "secret123", Some("Bia Costa")).await.unwrap();
        let user = auth.user().unwrap();
        assert_eq!(user.full_name(), Some("Bia Costa"));
        assert!(auth.is_authenticated());
        assert_eq!(backend.call_count(Call::SignUp), 1);
    }

    #[tokio::test]
    async fn test_clear_error_only_touches_error() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = store(&backend);

        assert!(auth.sign_in("nobody@example.com", "x").await.is_err());
        let before = auth.state();
        assert!(before.error.is_some());

        auth.clear_error();
        let after = auth.state();
        assert_eq!(after.error, None);
        assert_eq!(after.user, before.user);
        assert_eq!(after.is_loading, before.is_loading);
    }
}
