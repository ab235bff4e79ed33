use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{decode_rows, USER_PROFILES};
use crate::config::config;
use crate::error::BackendError;
use crate::filter::{CountMode, Filter};
use crate::models::{NewUserProfile, UserProfile, UserProfilePatch};
use crate::observer::StoreEvent;
use crate::store::app::AppStore;
use crate::store::request::Admission;
use crate::store::{ActionResult, FetchOutcome};
use crate::types::{Paginated, Resource};

/// Page request for the user list. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: u32,
    pub page_size: u32,
    /// Case-insensitive substring of name or email; empty matches everyone
    pub search: String,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: config().query.default_page_size,
            search: String::new(),
        }
    }
}

impl UserQuery {
    pub fn page(page: u32) -> Self {
        Self { page, ..Self::default() }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Page size as sent to the backend, capped at the configured maximum
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, config().query.max_page_size.max(1))
    }

    /// Inclusive zero-based row window for this page
    pub fn row_range(&self) -> (u64, u64) {
        let page = u64::from(self.page.max(1));
        let page_size = u64::from(self.effective_page_size());
        let from = (page - 1) * page_size;
        (from, from + page_size - 1)
    }

    fn to_filter(&self) -> Result<Filter, BackendError> {
        let (from, to) = self.row_range();
        let mut filter = Filter::new(USER_PROFILES)?;
        filter.select(&["*"])?.order("created_at desc")?;
        if !self.search.is_empty() {
            filter.any_ilike(&["full_name", "email"], &format!("%{}%", self.search))?;
        }
        filter.range(from, to)?.count(CountMode::Exact);
        Ok(filter)
    }
}

impl AppStore {
    /// Load one page of user profiles, newest first
    pub async fn fetch_users(&self, query: UserQuery) -> FetchOutcome<Paginated<UserProfile>> {
        let _permit = match self.guard(Resource::Users).admit().await {
            Admission::Run(permit) => permit,
            Admission::Skipped => {
                debug!("User fetch already in flight, skipping");
                return FetchOutcome::Skipped;
            }
            Admission::Coalesced => return FetchOutcome::Coalesced,
        };
        let _loading = self.begin_loading(Resource::Users);

        let page = query.page.max(1);
        let page_size = query.effective_page_size();

        match self.run(self.select_users(&query)).await {
            Ok((users, count)) => {
                debug!("Fetched {} of {} users (page {})", users.len(), count, page);
                self.update_state(StoreEvent::UsersChanged, |state| {
                    state.users = users.clone();
                    state.users_error = None;
                });
                FetchOutcome::Completed(Paginated::new(users, count, page, page_size))
            }
            Err(e) => {
                self.apply_fallback(Resource::Users, &e);
                FetchOutcome::Degraded(Paginated::empty(page, page_size))
            }
        }
    }

    async fn select_users(&self, query: &UserQuery) -> Result<(Vec<UserProfile>, u64), BackendError> {
        let filter = query.to_filter()?;
        let result = self.backend.select(&filter).await?;
        let count = result.count.unwrap_or(result.rows.len() as u64);
        Ok((decode_rows(result.rows)?, count))
    }

    /// Insert a profile, then reload the first page
    pub async fn create_user(&self, profile: NewUserProfile) -> ActionResult {
        let _loading = self.begin_loading(Resource::Users);

        if let Err(e) = self.run(self.insert_user(&profile)).await {
            return self.write_failed(Resource::Users, "create user", e);
        }
        info!("Created user {}", profile.email);

        self.fetch_users(UserQuery::default()).await;
        Ok(())
    }

    async fn insert_user(&self, profile: &NewUserProfile) -> Result<(), BackendError> {
        let row = serde_json::to_value(profile)?;
        self.backend.insert(USER_PROFILES, vec![row]).await
    }

    /// Update a profile remotely and merge the change into the cached entry
    pub async fn update_user(&self, id: Uuid, patch: UserProfilePatch) -> ActionResult {
        let _loading = self.begin_loading(Resource::Users);

        if let Err(e) = self.run(self.write_user(id, &patch)).await {
            return self.write_failed(Resource::Users, "update user", e);
        }
        info!("Updated user {}", id);

        self.update_state(StoreEvent::UsersChanged, |state| {
            for user in state.users.iter_mut().filter(|u| u.id == id) {
                user.apply(&patch);
            }
            state.users_error = None;
        });
        Ok(())
    }

    async fn write_user(&self, id: Uuid, patch: &UserProfilePatch) -> Result<(), BackendError> {
        let mut filter = Filter::new(USER_PROFILES)?;
        filter.eq("id", id.to_string())?;
        let changes = serde_json::to_value(patch)?;
        self.backend.update(&filter, changes).await
    }

    /// Delete a profile remotely and drop it from the cache without refetching
    pub async fn delete_user(&self, id: Uuid) -> ActionResult {
        let _loading = self.begin_loading(Resource::Users);

        if let Err(e) = self.run(self.remove_user(id)).await {
            return self.write_failed(Resource::Users, "delete user", e);
        }
        info!("Deleted user {}", id);

        self.update_state(StoreEvent::UsersChanged, |state| {
            state.users.retain(|u| u.id != id);
            state.users_error = None;
        });
        Ok(())
    }

    async fn remove_user(&self, id: Uuid) -> Result<(), BackendError> {
        let mut filter = Filter::new(USER_PROFILES)?;
        filter.eq("id", id.to_string())?;
        self.backend.delete(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range_is_inclusive() {
        assert_eq!(UserQuery::default().row_range(), (0, 9));
        assert_eq!(UserQuery::page(3).with_page_size(5).row_range(), (10, 14));
        // Page zero is treated as the first page
        assert_eq!(UserQuery::page(0).with_page_size(5).row_range(), (0, 4));
    }

    #[test]
    fn test_page_size_is_capped_before_offsets() {
        let max = config().query.max_page_size;
        let query = UserQuery::page(2).with_page_size(max + 200);
        assert_eq!(query.effective_page_size(), max);
        let max = u64::from(max);
        assert_eq!(query.row_range(), (max, 2 * max - 1));
    }

    #[test]
    fn test_filter_renders_search_and_order() {
        let filter = UserQuery::page(2).with_search("ana").to_filter().unwrap();
        let pairs = filter.to_query_pairs();
        assert!(pairs.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(pairs.contains(&("or".to_string(), "(full_name.ilike.*ana*,email.ilike.*ana*)".to_string())));
        assert!(pairs.contains(&("offset".to_string(), "10".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
        assert_eq!(filter.prefer_header().as_deref(), Some("count=exact"));
    }

    #[test]
    fn test_filter_without_search_has_no_or_group() {
        let filter = UserQuery::default().to_filter().unwrap();
        assert!(filter.to_query_pairs().iter().all(|(k, _)| k != "or"));
    }
}
