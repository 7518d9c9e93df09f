use async_trait::async_trait;
use shared::Setting;

use super::connection::{ObjectStoreConnection, StoreName};
use crate::error::Result;
use crate::storage::records::now_timestamp;
use crate::storage::traits::SettingsStorage;

#[derive(Clone)]
pub struct ObjectSettingsRepository {
    connection: ObjectStoreConnection,
}

impl ObjectSettingsRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SettingsStorage for ObjectSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        Ok(self
            .connection
            .read(|stores| stores.settings.get(key).cloned())
            .await)
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        // Keyed by `key` in a BTreeMap, so already ordered
        Ok(self
            .connection
            .read(|stores| stores.settings.values().cloned().collect())
            .await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<Setting> {
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: now_timestamp(),
        };
        let stored = setting.clone();
        self.connection
            .write(&[StoreName::Settings], move |stores| {
                stores.settings.put(stored);
                Ok(())
            })
            .await?;
        Ok(setting)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.connection
            .write(&[StoreName::Settings], move |stores| {
                stores.settings.remove(&key);
                Ok(())
            })
            .await
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .connection
            .read(|stores| stores.settings.len() as u64)
            .await)
    }
}
