use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: u64,
    pub active_users: u64,
    pub total_notifications: u64,
    pub unread_notifications: u64,
}

impl DashboardStats {
    /// Legacy estimate: 70% of users active, 30% of notifications unread, floored
    pub fn estimated(total_users: u64, total_notifications: u64) -> Self {
        Self {
            total_users,
            active_users: total_users * 7 / 10,
            total_notifications,
            unread_notifications: total_notifications * 3 / 10,
        }
    }
}
