use async_trait::async_trait;
use shared::Setting;
use sqlx::Row;

use super::connection::DbConnection;
use super::rows::{map_rows, setting_from_row};
use crate::error::Result;
use crate::storage::records::now_timestamp;
use crate::storage::traits::SettingsStorage;

#[derive(Clone)]
pub struct SqlSettingsRepository {
    db: DbConnection,
}

impl SqlSettingsRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStorage for SqlSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(setting_from_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        let rows = sqlx::query("SELECT key, value, updated_at FROM settings ORDER BY key")
            .fetch_all(self.db.pool())
            .await?;
        map_rows(&rows, setting_from_row)
    }

    async fn set(&self, key: &str, value: &str) -> Result<Setting> {
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: now_timestamp(),
        };
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&setting.key)
        .bind(&setting.value)
        .bind(&setting.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(setting)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM settings")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }
}
