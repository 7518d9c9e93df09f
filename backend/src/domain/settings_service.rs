//! User preferences over the compiled-in defaults.
//!
//! Values are stored as JSON text. A stored value that is not valid JSON is
//! surfaced as a plain string rather than rejected.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::storage::seed::DEFAULT_SETTINGS;
use crate::storage::SettingsStorage;

#[derive(Clone)]
pub struct SettingsService {
    settings: Arc<dyn SettingsStorage>,
}

impl SettingsService {
    pub fn new(settings: Arc<dyn SettingsStorage>) -> Self {
        Self { settings }
    }

    /// Every default key, overridden by whatever is stored
    pub async fn get_settings(&self) -> Result<BTreeMap<String, Value>> {
        let mut merged: BTreeMap<String, Value> = DEFAULT_SETTINGS
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        for setting in self.settings.get_all().await? {
            merged.insert(setting.key, decode(&setting.value));
        }
        Ok(merged)
    }

    /// The stored value, else the default, else `null`
    pub async fn get_setting(&self, key: &str) -> Result<Value> {
        match self.settings.get(key).await? {
            Some(setting) => Ok(decode(&setting.value)),
            None => Ok(DEFAULT_SETTINGS.get(key).cloned().unwrap_or(Value::Null)),
        }
    }

    pub async fn update_setting(&self, key: &str, value: &Value) -> Result<()> {
        info!("Updating setting: {}", key);
        self.settings.set(key, &serde_json::to_string(value)?).await?;
        Ok(())
    }

    pub async fn update_settings(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        for (key, value) in values {
            self.update_setting(key, value).await?;
        }
        Ok(())
    }

    /// Overwrite every default key with its default. Extra keys are kept.
    pub async fn reset_to_defaults(&self) -> Result<()> {
        info!("Resetting settings to defaults");
        for (key, value) in DEFAULT_SETTINGS.iter() {
            self.settings.set(key, &serde_json::to_string(value)?).await?;
        }
        Ok(())
    }
}

fn decode(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
