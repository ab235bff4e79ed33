use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::observer::traits::{StoreEvent, StoreObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer registry owned by each store
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn StoreObserver>)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("Registered observer '{}' as {:?}", observer.name(), id);
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, observer));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: StoreEvent) {
        // Snapshot so observers may subscribe/unsubscribe from inside notify
        let observers: Vec<Arc<dyn StoreObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();

        for observer in observers.iter().filter(|o| o.applies_to(event)) {
            tracing::trace!("Notifying observer '{}' of {:?}", observer.name(), event);
            observer.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct UsersOnly(Mutex<Vec<StoreEvent>>);

    impl StoreObserver for UsersOnly {
        fn name(&self) -> &'static str {
            "users-only"
        }

        fn applies_to(&self, event: StoreEvent) -> bool {
            event == StoreEvent::UsersChanged
        }

        fn notify(&self, event: StoreEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_closure_observer_receives_events() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(Arc::new(move |event: StoreEvent| sink.lock().unwrap().push(event)));

        registry.notify(StoreEvent::SettingsChanged);
        registry.notify(StoreEvent::SidebarChanged);
        assert_eq!(*seen.lock().unwrap(), vec![StoreEvent::SettingsChanged, StoreEvent::SidebarChanged]);
    }

    #[test]
    fn test_applies_to_filters_events() {
        let registry = ObserverRegistry::new();
        let observer = Arc::new(UsersOnly(Mutex::new(Vec::new())));
        registry.subscribe(observer.clone());

        registry.notify(StoreEvent::StatsChanged);
        registry.notify(StoreEvent::UsersChanged);
        assert_eq!(*observer.0.lock().unwrap(), vec![StoreEvent::UsersChanged]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry = ObserverRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = registry.subscribe(Arc::new(move |_: StoreEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(StoreEvent::AuthChanged);
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify(StoreEvent::AuthChanged);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
