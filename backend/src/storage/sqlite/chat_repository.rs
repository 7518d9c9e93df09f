use async_trait::async_trait;
use shared::{ChatMessage, CreateChatMessageDto};
use tracing::debug;

use super::connection::DbConnection;
use super::rows::{chat_message_from_row, map_rows, CHAT_COLUMNS};
use crate::error::Result;
use crate::storage::records::new_chat_message;
use crate::storage::traits::ChatMessageStorage;

#[derive(Clone)]
pub struct SqlChatMessageRepository {
    db: DbConnection,
}

impl SqlChatMessageRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatMessageStorage for SqlChatMessageRepository {
    async fn find_all(&self, limit: Option<u32>) -> Result<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages ORDER BY created_at, id LIMIT ?",
            CHAT_COLUMNS
        );
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map_or(-1, i64::from);
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        map_rows(&rows, chat_message_from_row)
    }

    async fn find_recent(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {cols} FROM (
                SELECT {cols} FROM chat_messages ORDER BY created_at DESC, id DESC LIMIT ?
            ) ORDER BY created_at, id
            "#,
            cols = CHAT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, chat_message_from_row)
    }

    async fn create(&self, dto: CreateChatMessageDto) -> Result<ChatMessage> {
        let message = new_chat_message(dto);
        sqlx::query(
            "INSERT INTO chat_messages (id, role, content, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.metadata)
        .bind(&message.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(message)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM chat_messages")
            .execute(self.db.pool())
            .await?;
        debug!("Cleared chat history");
        Ok(())
    }

    async fn delete_older_than(&self, timestamp: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE created_at < ?")
            .bind(timestamp)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
