use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{count_query, NOTIFICATIONS, USER_PROFILES};
use crate::config::StatsAggregation;
use crate::error::BackendError;
use crate::models::DashboardStats;
use crate::observer::StoreEvent;
use crate::store::app::AppStore;
use crate::store::request::Admission;
use crate::store::FetchOutcome;
use crate::types::Resource;

impl AppStore {
    /// Refresh the dashboard counters.
    ///
    /// Count queries run concurrently and are all awaited. A failed count is
    /// taken as zero; if any failed, the result is reported as degraded and
    /// the fallback policy decides the error field.
    pub async fn fetch_dashboard_stats(&self) -> FetchOutcome<DashboardStats> {
        let _permit = match self.guard(Resource::Stats).admit().await {
            Admission::Run(permit) => permit,
            Admission::Skipped => {
                debug!("Stats fetch already in flight, skipping");
                return FetchOutcome::Skipped;
            }
            Admission::Coalesced => return FetchOutcome::Coalesced,
        };
        let _loading = self.begin_loading(Resource::Stats);

        let (stats, failure) = match self.config.stats {
            StatsAggregation::Exact => self.exact_stats().await,
            StatsAggregation::Estimated => self.estimated_stats().await,
        };

        let error = match &failure {
            Some(e) => {
                warn!("FALLBACK: stats count failed, counting it as zero: {}", e);
                self.fallback_error(e)
            }
            None => None,
        };
        self.update_state(StoreEvent::StatsChanged, |state| {
            state.stats = Some(stats);
            state.stats_error = error;
        });

        debug!("Dashboard stats: {:?}", stats);
        match failure {
            Some(_) => FetchOutcome::Degraded(stats),
            None => FetchOutcome::Completed(stats),
        }
    }

    /// Same operation as [`fetch_dashboard_stats`](Self::fetch_dashboard_stats)
    pub async fn fetch_stats(&self) -> FetchOutcome<DashboardStats> {
        self.fetch_dashboard_stats().await
    }

    async fn exact_stats(&self) -> (DashboardStats, Option<BackendError>) {
        let (total_users, active_users, total_notifications, unread_notifications) = futures::join!(
            self.count_rows(USER_PROFILES, None),
            self.count_rows(USER_PROFILES, Some(("status", Value::from("active")))),
            self.count_rows(NOTIFICATIONS, None),
            self.count_rows(NOTIFICATIONS, Some(("is_read", Value::Bool(false)))),
        );

        let mut failure = None;
        let mut take = |result: Result<u64, BackendError>| match result {
            Ok(count) => count,
            Err(e) => {
                failure.get_or_insert(e);
                0
            }
        };
        let stats = DashboardStats {
            total_users: take(total_users),
            active_users: take(active_users),
            total_notifications: take(total_notifications),
            unread_notifications: take(unread_notifications),
        };
        (stats, failure)
    }

    async fn estimated_stats(&self) -> (DashboardStats, Option<BackendError>) {
        let (total_users, total_notifications) = futures::join!(
            self.count_rows(USER_PROFILES, None),
            self.count_rows(NOTIFICATIONS, None),
        );

        let mut failure = None;
        let mut take = |result: Result<u64, BackendError>| match result {
            Ok(count) => count,
            Err(e) => {
                failure.get_or_insert(e);
                0
            }
        };
        let stats = DashboardStats::estimated(take(total_users), take(total_notifications));
        (stats, failure)
    }

    async fn count_rows(&self, table: &str, eq: Option<(&str, Value)>) -> Result<u64, BackendError> {
        let filter = count_query(table, eq)?;
        let result = self.run(self.backend.select(&filter)).await?;
        Ok(result.count.unwrap_or(0))
    }
}
