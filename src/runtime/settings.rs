//! In-memory settings store seeded from the plugin configuration.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::api::types::DeployConfig;
use crate::protocols::host::{SettingsStore, APP_ID_KEY};

/// Thread-safe key/value settings.
///
/// The host may set the app id after the deploy client was created; every
/// lifecycle operation reads it again.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_id(app_id: impl Into<String>) -> Self {
        let settings = Self::new();
        settings.set(APP_ID_KEY, app_id);
        settings
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        match &config.app_id {
            Some(app_id) => Self::with_app_id(app_id.clone()),
            None => Self::new(),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        log::debug!("Setting deploy setting: key={key}");
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
