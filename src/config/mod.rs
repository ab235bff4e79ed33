use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub request_timeout_secs: u64,
    pub health_check_timeout_secs: u64,
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub fallback: FallbackPolicy,
    pub in_flight: InFlightPolicy,
    pub stats: StatsAggregation,
    pub operation_timeout_ms: u64,
    /// Bound on the reachability probe run before sign-in and sign-up
    pub health_check_timeout_ms: u64,
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub debug_logging: bool,
}

/// What a read operation leaves behind when the backend fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Reset the cache to its empty value and clear the error field
    Silent,
    /// Reset the cache to its empty value and record the translated error
    Surface,
}

/// What a fetch does when the same resource is already being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Return immediately without touching state
    Drop,
    /// Wait for the running fetch, then issue a fresh one
    Queue,
    /// Wait for the running fetch and reuse its result
    Coalesce,
}

/// How dashboard counters for active users and unread notifications are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsAggregation {
    /// Filtered count queries on the backend
    Exact,
    /// Fixed fractions of the totals (0.7 active users, 0.3 unread notifications)
    Estimated,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(FallbackPolicy::Silent),
            "surface" => Ok(FallbackPolicy::Surface),
            other => Err(format!("unknown fallback policy: {}", other)),
        }
    }
}

impl FromStr for InFlightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(InFlightPolicy::Drop),
            "queue" => Ok(InFlightPolicy::Queue),
            "coalesce" => Ok(InFlightPolicy::Coalesce),
            other => Err(format!("unknown in-flight policy: {}", other)),
        }
    }
}

impl FromStr for StatsAggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(StatsAggregation::Exact),
            "estimated" => Ok(StatsAggregation::Estimated),
            other => Err(format!("unknown stats aggregation: {}", other)),
        }
    }
}

impl StoreConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_in_flight(mut self, in_flight: InFlightPolicy) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn with_stats(mut self, stats: StatsAggregation) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        AppConfig::development().store
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides (SUPABASE_* accepted for projects migrating from the JS client)
        if let Some(v) = first_var(&["DASHBOARD_BACKEND_URL", "SUPABASE_URL"]) {
            self.backend.url = Some(v);
        }
        if let Some(v) = first_var(&["DASHBOARD_ANON_KEY", "SUPABASE_ANON_KEY"]) {
            self.backend.anon_key = Some(v);
        }
        if let Ok(v) = env::var("BACKEND_REQUEST_TIMEOUT_SECS") {
            self.backend.request_timeout_secs = v.parse().unwrap_or(self.backend.request_timeout_secs);
        }
        if let Ok(v) = env::var("BACKEND_HEALTH_CHECK_TIMEOUT_SECS") {
            self.backend.health_check_timeout_secs = v.parse().unwrap_or(self.backend.health_check_timeout_secs);
            self.store.health_check_timeout_ms = self.backend.health_check_timeout_secs * 1000;
        }
        if let Ok(v) = env::var("DASHBOARD_SITE_URL") {
            self.backend.site_url = Some(v.trim_end_matches('/').to_string());
            self.store.site_url = self.backend.site_url.clone();
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_FALLBACK_POLICY") {
            self.store.fallback = v.parse().unwrap_or(self.store.fallback);
        }
        if let Ok(v) = env::var("STORE_IN_FLIGHT_POLICY") {
            self.store.in_flight = v.parse().unwrap_or(self.store.in_flight);
        }
        if let Ok(v) = env::var("STORE_STATS_AGGREGATION") {
            self.store.stats = v.parse().unwrap_or(self.store.stats);
        }
        if let Ok(v) = env::var("STORE_OPERATION_TIMEOUT_MS") {
            self.store.operation_timeout_ms = v.parse().unwrap_or(self.store.operation_timeout_ms);
        }

        // Query overrides
        if let Ok(v) = env::var("QUERY_DEFAULT_PAGE_SIZE") {
            self.query.default_page_size = v.parse().unwrap_or(self.query.default_page_size);
        }
        if let Ok(v) = env::var("QUERY_MAX_PAGE_SIZE") {
            self.query.max_page_size = v.parse().unwrap_or(self.query.max_page_size);
        }
        if let Ok(v) = env::var("QUERY_DEBUG_LOGGING") {
            self.query.debug_logging = v.parse().unwrap_or(self.query.debug_logging);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                url: None,
                anon_key: None,
                request_timeout_secs: 30,
                health_check_timeout_secs: 5,
                site_url: Some("http://localhost:5173".to_string()),
            },
            store: StoreConfig {
                fallback: FallbackPolicy::Silent,
                in_flight: InFlightPolicy::Drop,
                stats: StatsAggregation::Exact,
                operation_timeout_ms: 30_000,
                health_check_timeout_ms: 5_000,
                site_url: Some("http://localhost:5173".to_string()),
            },
            query: QueryConfig {
                default_page_size: 10,
                max_page_size: 1000,
                debug_logging: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                url: None,
                anon_key: None,
                request_timeout_secs: 15,
                health_check_timeout_secs: 5,
                site_url: None,
            },
            store: StoreConfig {
                fallback: FallbackPolicy::Surface,
                in_flight: InFlightPolicy::Drop,
                stats: StatsAggregation::Exact,
                operation_timeout_ms: 15_000,
                health_check_timeout_ms: 5_000,
                site_url: None,
            },
            query: QueryConfig {
                default_page_size: 10,
                max_page_size: 500,
                debug_logging: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                url: None,
                anon_key: None,
                request_timeout_secs: 10,
                health_check_timeout_secs: 3,
                site_url: None,
            },
            store: StoreConfig {
                fallback: FallbackPolicy::Silent,
                in_flight: InFlightPolicy::Drop,
                stats: StatsAggregation::Exact,
                operation_timeout_ms: 10_000,
                health_check_timeout_ms: 3_000,
                site_url: None,
            },
            query: QueryConfig {
                default_page_size: 10,
                max_page_size: 100,
                debug_logging: false,
            },
        }
    }
}

fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.store.fallback, FallbackPolicy::Silent);
        assert_eq!(config.store.in_flight, InFlightPolicy::Drop);
        assert_eq!(config.query.default_page_size, 10);
        assert!(config.query.debug_logging);
    }

    #[test]
    fn test_default_staging_config_surfaces_errors() {
        let config = AppConfig::staging();
        assert_eq!(config.store.fallback, FallbackPolicy::Surface);
        assert_eq!(config.query.max_page_size, 500);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.query.max_page_size, 100);
        assert_eq!(config.backend.health_check_timeout(), Duration::from_secs(3));
        assert_eq!(config.store.health_check_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Surface".parse::<FallbackPolicy>(), Ok(FallbackPolicy::Surface));
        assert_eq!(" coalesce ".parse::<InFlightPolicy>(), Ok(InFlightPolicy::Coalesce));
        assert_eq!("estimated".parse::<StatsAggregation>(), Ok(StatsAggregation::Estimated));
        assert!("sometimes".parse::<InFlightPolicy>().is_err());
    }

    #[test]
    fn test_store_config_builders() {
        let config = StoreConfig::default()
            .with_in_flight(InFlightPolicy::Queue)
            .with_operation_timeout(Duration::from_millis(250))
            .with_health_check_timeout(Duration::from_millis(40));
        assert_eq!(config.in_flight, InFlightPolicy::Queue);
        assert_eq!(config.operation_timeout(), Duration::from_millis(250));
        assert_eq!(config.health_check_timeout(), Duration::from_millis(40));
    }
}
