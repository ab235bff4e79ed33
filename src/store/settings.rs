use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{AppSettings, SettingsPatch};
use crate::observer::StoreEvent;
use crate::store::app::AppStore;

/// Fixed storage key; the file backend appends `.json`
pub const SETTINGS_KEY: &str = "app-settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable home of the settings object. Always written whole.
pub trait SettingsStorage: Send + Sync {
    fn load(&self) -> Result<Option<AppSettings>, SettingsError>;
    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError>;
}

pub struct FileSettingsStorage {
    path: PathBuf,
}

impl FileSettingsStorage {
    /// Settings file `app-settings.json` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{}.json", SETTINGS_KEY)))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStorage for FileSettingsStorage {
    fn load(&self) -> Result<Option<AppSettings>, SettingsError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }
}

/// Keeps the serialized blob in memory, like a browser's local storage slot
#[derive(Default)]
pub struct MemorySettingsStorage {
    blob: Mutex<Option<String>>,
}

impl MemorySettingsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self { blob: Mutex::new(Some(blob.into())) }
    }

    pub fn blob(&self) -> Option<String> {
        self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SettingsStorage for MemorySettingsStorage {
    fn load(&self) -> Result<Option<AppSettings>, SettingsError> {
        match self.blob() {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let blob = serde_json::to_string(settings)?;
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob);
        Ok(())
    }
}

impl AppStore {
    pub fn settings(&self) -> AppSettings {
        self.read(|state| state.settings.clone())
    }

    /// Shallow-merge the patch and persist the whole result.
    ///
    /// Merge and save happen under the state write lock, so concurrent
    /// updates are applied and persisted in the order they take the lock.
    /// The in-memory value changes even if persisting fails.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<AppSettings, SettingsError> {
        let mut merged = AppSettings::default();
        let mut saved = Ok(());
        self.update_state(StoreEvent::SettingsChanged, |state| {
            state.settings = state.settings.clone().merge(patch);
            merged = state.settings.clone();
            saved = self.storage.save(&merged);
        });

        if let Err(e) = saved {
            warn!("Failed to persist settings: {}", e);
            return Err(e);
        }
        debug!("Settings saved");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Theme;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSettingsStorage::in_dir(dir.path());
        assert!(storage.path().ends_with("app-settings.json"));
        assert!(storage.load().unwrap().is_none());

        let settings = AppSettings::default().merge(SettingsPatch { theme: Some(Theme::Dark), ..Default::default() });
        storage.save(&settings).unwrap();
        assert_eq!(storage.load().unwrap(), Some(settings));
    }

    #[test]
    fn test_memory_storage_reports_corrupt_blob() {
        let storage = MemorySettingsStorage::with_blob("{oops");
        assert!(matches!(storage.load(), Err(SettingsError::Json(_))));
    }
}
