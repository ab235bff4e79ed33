//! Client-side state stores.
//!
//! [`AuthStore`] owns the signed-in identity; [`AppStore`] owns the cached
//! users, notifications, dashboard counters, settings and sidebar state.
//! Both are plain service objects: construct them with a [`Backend`], share
//! them behind an `Arc`, and subscribe to their change events.
//!
//! Write actions return [`ActionResult`] carrying a user-facing message.
//! Read actions never fail; they return a [`FetchOutcome`] describing how the
//! cache was refreshed.
//!
//! [`Backend`]: crate::backend::Backend

pub mod app;
pub mod auth;
pub mod notifications;
pub mod request;
pub mod settings;
pub mod stats;
pub mod users;

use thiserror::Error;

pub use app::{AppState, AppStore};
pub use auth::{AuthPhase, AuthState, AuthStore};
pub use request::{Admission, RequestGuard, RequestPermit, RequestPhase};
pub use settings::{FileSettingsStorage, MemorySettingsStorage, SettingsError, SettingsStorage, SETTINGS_KEY};
pub use users::UserQuery;

/// Failure of a write action, already translated for display
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub type ActionResult = Result<(), ActionError>;

/// Result of a read action
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Backend answered; the cache holds the fresh value
    Completed(T),
    /// Backend failed, fully or in part; the cache holds this fallback value
    Degraded(T),
    /// Another fetch of the same resource was running; nothing changed
    Skipped,
    /// Waited for the running fetch and reused its result from the cache
    Coalesced,
}

impl<T> FetchOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            FetchOutcome::Completed(v) | FetchOutcome::Degraded(v) => Some(v),
            FetchOutcome::Skipped | FetchOutcome::Coalesced => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            FetchOutcome::Completed(v) | FetchOutcome::Degraded(v) => Some(v),
            FetchOutcome::Skipped | FetchOutcome::Coalesced => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded(_))
    }
}
