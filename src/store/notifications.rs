use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{decode_rows, NOTIFICATIONS};
use crate::error::BackendError;
use crate::filter::Filter;
use crate::models::{NewNotification, Notification};
use crate::observer::StoreEvent;
use crate::store::app::AppStore;
use crate::store::request::Admission;
use crate::store::{ActionError, ActionResult, FetchOutcome};
use crate::types::Resource;

impl AppStore {
    /// Load every notification, newest first, and recount unread ones
    pub async fn fetch_notifications(&self) -> FetchOutcome<Vec<Notification>> {
        let _permit = match self.guard(Resource::Notifications).admit().await {
            Admission::Run(permit) => permit,
            Admission::Skipped => {
                debug!("Notification fetch already in flight, skipping");
                return FetchOutcome::Skipped;
            }
            Admission::Coalesced => return FetchOutcome::Coalesced,
        };
        let _loading = self.begin_loading(Resource::Notifications);

        match self.run(self.select_notifications()).await {
            Ok(notifications) => {
                debug!("Fetched {} notifications", notifications.len());
                self.update_state(StoreEvent::NotificationsChanged, |state| {
                    state.set_notifications(notifications.clone());
                    state.notifications_error = None;
                });
                FetchOutcome::Completed(notifications)
            }
            Err(e) => {
                self.apply_fallback(Resource::Notifications, &e);
                FetchOutcome::Degraded(Vec::new())
            }
        }
    }

    async fn select_notifications(&self) -> Result<Vec<Notification>, BackendError> {
        let mut filter = Filter::new(NOTIFICATIONS)?;
        filter.select(&["*"])?.order("created_at desc")?;
        let result = self.backend.select(&filter).await?;
        decode_rows(result.rows)
    }

    /// Mark one notification read. The cache changes only if the backend accepted it.
    pub async fn mark_notification_as_read(&self, id: Uuid) -> ActionResult {
        let result = self.run(self.write_read_flag(Some(id))).await;
        if let Err(e) = result {
            warn!("Failed to mark notification {} as read: {}", id, e);
            return Err(ActionError::new(e.user_message()));
        }

        self.update_state(StoreEvent::NotificationsChanged, |state| {
            for notification in state.notifications.iter_mut().filter(|n| n.id == id) {
                notification.is_read = true;
            }
            state.recount_unread();
        });
        Ok(())
    }

    pub async fn mark_all_notifications_as_read(&self) -> ActionResult {
        let result = self.run(self.write_read_flag(None)).await;
        if let Err(e) = result {
            warn!("Failed to mark all notifications as read: {}", e);
            return Err(ActionError::new(e.user_message()));
        }

        info!("Marked all notifications as read");
        self.update_state(StoreEvent::NotificationsChanged, |state| {
            for notification in state.notifications.iter_mut() {
                notification.is_read = true;
            }
            state.recount_unread();
        });
        Ok(())
    }

    /// Set `is_read` on one notification, or on every unread one
    async fn write_read_flag(&self, id: Option<Uuid>) -> Result<(), BackendError> {
        let mut filter = Filter::new(NOTIFICATIONS)?;
        match id {
            Some(id) => filter.eq("id", id.to_string())?,
            None => filter.eq("is_read", false)?,
        };
        self.backend.update(&filter, serde_json::json!({ "is_read": true })).await
    }

    /// Insert a notification, then reload the list
    pub async fn create_notification(&self, notification: NewNotification) -> ActionResult {
        if let Err(e) = self.run(self.insert_notification(&notification)).await {
            warn!("Failed to create notification: {}", e);
            return Err(ActionError::new(e.user_message()));
        }
        info!("Created notification for {}", notification.user_id);

        self.fetch_notifications().await;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), BackendError> {
        let row = serde_json::to_value(notification)?;
        self.backend.insert(NOTIFICATIONS, vec![row]).await
    }
}
