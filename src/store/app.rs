use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::config::{FallbackPolicy, StoreConfig};
use crate::error::BackendError;
use crate::models::{count_unread, AppSettings, DashboardStats, Notification, UserProfile};
use crate::observer::{ObserverRegistry, StoreEvent, StoreObserver, SubscriptionId};
use crate::store::request::{Deadline, RequestGuard, RequestPhase};
use crate::store::settings::SettingsStorage;
use crate::store::{ActionError, ActionResult};
use crate::types::Resource;

/// Snapshot of the application store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub users: Vec<UserProfile>,
    pub users_loading: bool,
    pub users_error: Option<String>,

    pub notifications: Vec<Notification>,
    pub notifications_loading: bool,
    pub notifications_error: Option<String>,
    /// Always equals the number of unread entries in `notifications`
    pub unread_count: usize,

    pub stats: Option<DashboardStats>,
    pub stats_loading: bool,
    pub stats_error: Option<String>,

    pub settings: AppSettings,
    pub sidebar_collapsed: bool,
}

impl AppState {
    pub fn is_loading(&self, resource: Resource) -> bool {
        match resource {
            Resource::Users => self.users_loading,
            Resource::Notifications => self.notifications_loading,
            Resource::Stats => self.stats_loading,
        }
    }

    pub fn error(&self, resource: Resource) -> Option<&str> {
        match resource {
            Resource::Users => self.users_error.as_deref(),
            Resource::Notifications => self.notifications_error.as_deref(),
            Resource::Stats => self.stats_error.as_deref(),
        }
    }

    fn loading_mut(&mut self, resource: Resource) -> &mut bool {
        match resource {
            Resource::Users => &mut self.users_loading,
            Resource::Notifications => &mut self.notifications_loading,
            Resource::Stats => &mut self.stats_loading,
        }
    }

    pub(super) fn error_mut(&mut self, resource: Resource) -> &mut Option<String> {
        match resource {
            Resource::Users => &mut self.users_error,
            Resource::Notifications => &mut self.notifications_error,
            Resource::Stats => &mut self.stats_error,
        }
    }

    /// Replace the notification cache and recount unread entries
    pub(super) fn set_notifications(&mut self, notifications: Vec<Notification>) {
        self.notifications = notifications;
        self.recount_unread();
    }

    pub(super) fn recount_unread(&mut self) {
        self.unread_count = count_unread(&self.notifications);
    }
}

struct Inner {
    state: AppState,
    // Overlapping actions on one resource share its loading flag
    loading: HashMap<Resource, usize>,
}

/// Cached users, notifications, dashboard counters, settings and UI state.
///
/// Fetches go through a per-resource [`RequestGuard`]; every backend call is
/// bounded by the configured operation timeout and can be aborted with
/// [`cancel_pending`](Self::cancel_pending).
pub struct AppStore {
    pub(super) backend: Arc<dyn Backend>,
    pub(super) config: StoreConfig,
    pub(super) storage: Box<dyn SettingsStorage>,
    inner: RwLock<Inner>,
    observers: ObserverRegistry,
    users_guard: RequestGuard,
    notifications_guard: RequestGuard,
    stats_guard: RequestGuard,
    deadline: Deadline,
}

/// Keeps a resource's loading flag raised until dropped
pub(super) struct LoadingScope<'a> {
    store: &'a AppStore,
    resource: Resource,
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        let resource = self.resource;
        self.store.update(StoreEvent::for_resource(resource), |inner| {
            let count = inner.loading.entry(resource).or_insert(0);
            *count = count.saturating_sub(1);
            if *count == 0 {
                *inner.state.loading_mut(resource) = false;
            }
        });
    }
}

impl AppStore {
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig, storage: Box<dyn SettingsStorage>) -> Self {
        let settings = match storage.load() {
            Ok(Some(settings)) => {
                debug!("Loaded persisted settings");
                settings
            }
            Ok(None) => AppSettings::default(),
            Err(e) => {
                warn!("Ignoring unreadable settings, using defaults: {}", e);
                AppSettings::default()
            }
        };

        let in_flight = config.in_flight;
        Self {
            backend,
            deadline: Deadline::new(config.operation_timeout()),
            users_guard: RequestGuard::new(in_flight),
            notifications_guard: RequestGuard::new(in_flight),
            stats_guard: RequestGuard::new(in_flight),
            config,
            storage,
            inner: RwLock::new(Inner {
                state: AppState { settings, ..AppState::default() },
                loading: HashMap::new(),
            }),
            observers: ObserverRegistry::new(),
        }
    }

    pub fn state(&self) -> AppState {
        self.read(|state| state.clone())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn phase(&self, resource: Resource) -> RequestPhase {
        self.guard(resource).phase()
    }

    pub fn watch_phase(&self, resource: Resource) -> watch::Receiver<RequestPhase> {
        self.guard(resource).watch()
    }

    /// Abort outstanding backend calls. Their fetches settle through the
    /// fallback path and release their guards and loading flags.
    pub fn cancel_pending(&self) {
        debug!("Cancelling pending backend calls");
        self.deadline.cancel_all();
    }

    pub fn toggle_sidebar(&self) {
        self.update(StoreEvent::SidebarChanged, |inner| {
            inner.state.sidebar_collapsed = !inner.state.sidebar_collapsed;
        });
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.update(StoreEvent::SidebarChanged, |inner| inner.state.sidebar_collapsed = collapsed);
    }

    pub(super) fn guard(&self, resource: Resource) -> &RequestGuard {
        match resource {
            Resource::Users => &self.users_guard,
            Resource::Notifications => &self.notifications_guard,
            Resource::Stats => &self.stats_guard,
        }
    }

    pub(super) fn read<T>(&self, f: impl FnOnce(&AppState) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(|e| e.into_inner()).state)
    }

    fn update(&self, event: StoreEvent, apply: impl FnOnce(&mut Inner)) {
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            apply(&mut inner);
        }
        self.observers.notify(event);
    }

    pub(super) fn update_state(&self, event: StoreEvent, apply: impl FnOnce(&mut AppState)) {
        self.update(event, |inner| apply(&mut inner.state));
    }

    /// Raise the loading flag and clear the previous error
    pub(super) fn begin_loading(&self, resource: Resource) -> LoadingScope<'_> {
        self.update(StoreEvent::for_resource(resource), |inner| {
            *inner.loading.entry(resource).or_insert(0) += 1;
            *inner.state.loading_mut(resource) = true;
            *inner.state.error_mut(resource) = None;
        });
        LoadingScope { store: self, resource }
    }

    pub(super) async fn run<T, F>(&self, fut: F) -> Result<T, BackendError>
    where
        F: std::future::Future<Output = Result<T, BackendError>>,
    {
        self.deadline.run(fut).await
    }

    /// Error field value after a failed read, per the fallback policy
    pub(super) fn fallback_error(&self, err: &BackendError) -> Option<String> {
        match self.config.fallback {
            FallbackPolicy::Silent => None,
            FallbackPolicy::Surface => Some(err.user_message()),
        }
    }

    /// Reset a resource's cache after a failed read
    pub(super) fn apply_fallback(&self, resource: Resource, err: &BackendError) {
        warn!("FALLBACK: {} fetch failed, showing empty data: {}", resource.as_str(), err);
        let error = self.fallback_error(err);
        self.update_state(StoreEvent::for_resource(resource), |state| {
            match resource {
                Resource::Users => state.users.clear(),
                Resource::Notifications => state.set_notifications(Vec::new()),
                Resource::Stats => state.stats = Some(DashboardStats::default()),
            }
            *state.error_mut(resource) = error;
        });
    }

    /// Record a failed write on the resource and hand the message back
    pub(super) fn write_failed(&self, resource: Resource, action: &str, err: BackendError) -> ActionResult {
        warn!("Failed to {}: {}", action, err);
        let message = err.user_message();
        self.update_state(StoreEvent::for_resource(resource), |state| {
            *state.error_mut(resource) = Some(message.clone());
        });
        Err(ActionError::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::store::settings::MemorySettingsStorage;
    use std::sync::Mutex;

    fn store() -> AppStore {
        AppStore::new(
            Arc::new(MemoryBackend::new()),
            StoreConfig::default(),
            Box::new(MemorySettingsStorage::new()),
        )
    }

    #[test]
    fn test_sidebar_toggles_and_notifies() {
        let store = store();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(Arc::new(move |event: StoreEvent| sink.lock().unwrap().push(event)));

        store.toggle_sidebar();
        assert!(store.state().sidebar_collapsed);
        store.toggle_sidebar();
        assert!(!store.state().sidebar_collapsed);
        store.set_sidebar_collapsed(true);
        assert!(store.state().sidebar_collapsed);

        assert_eq!(events.lock().unwrap().len(), 3);
        assert!(events.lock().unwrap().iter().all(|e| *e == StoreEvent::SidebarChanged));
    }

    #[test]
    fn test_nested_loading_scopes_share_flag() {
        let store = store();
        let outer = store.begin_loading(Resource::Users);
        let inner = store.begin_loading(Resource::Users);
        drop(inner);
        assert!(store.state().users_loading);
        drop(outer);
        assert!(!store.state().users_loading);
        assert!(!store.state().notifications_loading);
    }

    #[test]
    fn test_all_guards_start_idle() {
        let store = store();
        for resource in [Resource::Users, Resource::Notifications, Resource::Stats] {
            assert_eq!(store.phase(resource), RequestPhase::Idle);
        }
    }
}
