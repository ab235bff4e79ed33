use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{Backend, FileSessionStore, RestBackend};
use crate::config::AppConfig;
use crate::store::{AppStore, AuthStore, FileSettingsStorage};

pub const SESSION_FILE: &str = "session.json";

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("DASH_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("admin-dashboard")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Backend client and both stores, wired against the configured backend
pub struct Context {
    pub backend: Arc<dyn Backend>,
    pub auth: AuthStore,
    pub app: AppStore,
}

impl Context {
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = get_config_dir()?;
        let sessions = FileSessionStore::new(config_dir.join(SESSION_FILE));
        let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(&config.backend, Box::new(sessions))?);

        let mut store_config = config.store.clone();
        if store_config.site_url.is_none() {
            store_config.site_url = config.backend.site_url.clone();
        }

        Ok(Self {
            auth: AuthStore::new(Arc::clone(&backend), store_config.clone()),
            app: AppStore::new(
                Arc::clone(&backend),
                store_config,
                Box::new(FileSettingsStorage::in_dir(&config_dir)),
            ),
            backend,
        })
    }
}
