use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::api::DEFAULT_BASE_URL;

pub const API_URL_ENV: &str = "AGGREGATOR_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub api_base_url: String,
    /// Days fetched by a refresh when no `--days` is given.
    pub history_days: u32,
    /// Exported health-store file read by `authorize` and `refresh`.
    pub source_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.into(),
            history_days: 30,
            source_path: None,
        }
    }
}

impl AppSettings {
    /// Apply environment overrides. `lookup` is normally `std::env::var`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url;
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings file {}: {err}", path.display());
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored settings, before environment overrides.
    pub fn get(&self) -> AppSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stored settings with `AGGREGATOR_API_URL` applied.
    pub fn effective(&self) -> AppSettings {
        self.get().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn update<F>(&self, change: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut updated = guard.clone();
        change(&mut updated);
        self.persist(&updated)?;
        *guard = updated.clone();
        Ok(updated)
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.get(), AppSettings::default());

        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get().history_days, 30);
    }

    #[test]
    fn updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(|settings| {
                settings.history_days = 7;
                settings.source_path = Some(PathBuf::from("/tmp/export.json"));
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap().get();
        assert_eq!(reopened.history_days, 7);
        assert_eq!(reopened.source_path, Some(PathBuf::from("/tmp/export.json")));
        assert_eq!(reopened.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"history_days": 14}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.history_days, 14);
        assert_eq!(settings.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn environment_overrides_base_url() {
        let settings = AppSettings::default().with_overrides(|key| {
            (key == API_URL_ENV).then(|| "http://localhost:8000".to_string())
        });
        assert_eq!(settings.api_base_url, "http://localhost:8000");

        let blank = AppSettings::default().with_overrides(|_| Some("  ".to_string()));
        assert_eq!(blank.api_base_url, DEFAULT_BASE_URL);
    }
}
