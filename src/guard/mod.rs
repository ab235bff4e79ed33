//! Route guard over the authentication store.
//!
//! A guard decides, for one mounted route, whether to show a pending
//! indicator, redirect, or render the guarded content.

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::store::{AuthState, AuthStore};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum GuardDecision {
    /// Session check still running
    Pending,
    /// Identity does not match the route; `from` is kept for returning after login
    Redirect { to: String, from: Option<String> },
    Render,
}

#[derive(Debug)]
pub struct RouteGuard {
    require_auth: bool,
    redirect_to: String,
    // Set once this guard's initialize call has settled
    mounted: OnceCell<()>,
}

impl RouteGuard {
    pub fn new(require_auth: bool, redirect_to: impl Into<String>) -> Self {
        Self {
            require_auth,
            redirect_to: redirect_to.into(),
            mounted: OnceCell::new(),
        }
    }

    /// Login, registration: signed-in users go to the dashboard
    pub fn public_only() -> Self {
        Self::new(false, DASHBOARD_PATH)
    }

    /// Everything behind login
    pub fn private_only() -> Self {
        Self::new(true, LOGIN_PATH)
    }

    pub fn require_auth(&self) -> bool {
        self.require_auth
    }

    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.initialized()
    }

    /// Run the store's `initialize` at most once for this guard.
    /// Concurrent callers wait for the same call.
    pub async fn mount(&self, auth: &AuthStore) {
        self.mounted
            .get_or_init(|| async {
                debug!("Route guard mounting, checking session");
                auth.initialize().await;
            })
            .await;
    }

    pub fn evaluate(&self, state: &AuthState, location: &str) -> GuardDecision {
        if state.is_loading || !self.is_mounted() {
            return GuardDecision::Pending;
        }

        let signed_in = state.user.is_some();
        if self.require_auth != signed_in {
            return GuardDecision::Redirect {
                to: self.redirect_to.clone(),
                from: self.require_auth.then(|| location.to_string()),
            };
        }
        GuardDecision::Render
    }

    /// Mount, then evaluate against the settled state
    pub async fn resolve(&self, auth: &AuthStore, location: &str) -> GuardDecision {
        self.mount(auth).await;
        self.evaluate(&auth.state(), location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthUser;
    use uuid::Uuid;

    fn signed_in() -> AuthState {
        AuthState {
            user: Some(AuthUser {
                id: Uuid::new_v4(),
                email: Some("ana@example.com".into()),
                user_metadata: Default::default(),
                created_at: None,
            }),
            initialized: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_unmounted_guard_is_pending() {
        let guard = RouteGuard::private_only();
        assert_eq!(guard.evaluate(&signed_in(), "/users"), GuardDecision::Pending);
    }

    #[tokio::test]
    async fn test_decisions_after_mount() {
        let private = RouteGuard::private_only();
        let public = RouteGuard::public_only();
        private.mounted.set(()).unwrap();
        public.mounted.set(()).unwrap();

        let anonymous = AuthState { initialized: true, ..Default::default() };
        assert_eq!(
            private.evaluate(&anonymous, "/users"),
            GuardDecision::Redirect { to: "/login".into(), from: Some("/users".into()) }
        );
        assert_eq!(private.evaluate(&signed_in(), "/users"), GuardDecision::Render);

        assert_eq!(public.evaluate(&anonymous, "/login"), GuardDecision::Render);
        assert_eq!(
            public.evaluate(&signed_in(), "/login"),
            GuardDecision::Redirect { to: "/dashboard".into(), from: None }
        );

        let loading = AuthState { is_loading: true, ..signed_in() };
        assert_eq!(private.evaluate(&loading, "/users"), GuardDecision::Pending);
    }
}
