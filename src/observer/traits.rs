use serde::{Deserialize, Serialize};

use crate::types::Resource;

/// State change published by a store. Observers read the new state from the
/// store itself; the event only says which slice changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreEvent {
    AuthChanged,
    UsersChanged,
    NotificationsChanged,
    StatsChanged,
    SettingsChanged,
    SidebarChanged,
}

impl StoreEvent {
    pub fn for_resource(resource: Resource) -> Self {
        match resource {
            Resource::Users => StoreEvent::UsersChanged,
            Resource::Notifications => StoreEvent::NotificationsChanged,
            Resource::Stats => StoreEvent::StatsChanged,
        }
    }
}

/// Subscriber to store changes.
///
/// Called synchronously after the state lock is released, so implementations
/// may read the store but should not block.
pub trait StoreObserver: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str {
        "anonymous"
    }

    /// Check if observer wants this event
    fn applies_to(&self, _event: StoreEvent) -> bool {
        true
    }

    fn notify(&self, event: StoreEvent);
}

impl<F> StoreObserver for F
where
    F: Fn(StoreEvent) + Send + Sync,
{
    fn notify(&self, event: StoreEvent) {
        self(event)
    }
}
