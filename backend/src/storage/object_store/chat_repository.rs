use async_trait::async_trait;
use shared::{ChatMessage, CreateChatMessageDto};
use tracing::debug;

use super::connection::{ObjectStoreConnection, ObjectStores, StoreName};
use crate::error::Result;
use crate::storage::records::{cmp_chat_messages, new_chat_message};
use crate::storage::traits::ChatMessageStorage;

#[derive(Clone)]
pub struct ObjectChatMessageRepository {
    connection: ObjectStoreConnection,
}

impl ObjectChatMessageRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }
}

fn chronological(stores: &ObjectStores) -> Vec<ChatMessage> {
    let mut list: Vec<ChatMessage> = stores.chat_messages.values().cloned().collect();
    list.sort_by(cmp_chat_messages);
    list
}

#[async_trait]
impl ChatMessageStorage for ObjectChatMessageRepository {
    async fn find_all(&self, limit: Option<u32>) -> Result<Vec<ChatMessage>> {
        Ok(self
            .connection
            .read(|stores| {
                let mut list = chronological(stores);
                if let Some(limit) = limit {
                    list.truncate(limit as usize);
                }
                list
            })
            .await)
    }

    async fn find_recent(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        Ok(self
            .connection
            .read(|stores| {
                let list = chronological(stores);
                let skip = list.len().saturating_sub(limit as usize);
                list.into_iter().skip(skip).collect()
            })
            .await)
    }

    async fn create(&self, dto: CreateChatMessageDto) -> Result<ChatMessage> {
        let message = new_chat_message(dto);
        let stored = message.clone();
        self.connection
            .write(&[StoreName::ChatMessages], move |stores| {
                stores.chat_messages.put(stored);
                Ok(())
            })
            .await?;
        Ok(message)
    }

    async fn delete_all(&self) -> Result<()> {
        self.connection
            .write(&[StoreName::ChatMessages], |stores| {
                stores.chat_messages.clear();
                Ok(())
            })
            .await?;
        debug!("Cleared chat history");
        Ok(())
    }

    async fn delete_older_than(&self, timestamp: &str) -> Result<u64> {
        let cutoff = timestamp.to_string();
        self.connection
            .write(&[StoreName::ChatMessages], move |stores| {
                let expired: Vec<String> = stores
                    .chat_messages
                    .values()
                    .filter(|m| m.created_at < cutoff)
                    .map(|m| m.id.clone())
                    .collect();
                for id in &expired {
                    stores.chat_messages.remove(id);
                }
                Ok(expired.len() as u64)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MessageRole;

    #[tokio::test]
    async fn test_recent_keeps_chronological_order() {
        let repo = ObjectChatMessageRepository::new(ObjectStoreConnection::in_memory());
        for i in 0..5 {
            repo.create(CreateChatMessageDto::new(MessageRole::User, format!("m{}", i)))
                .await
                .unwrap();
        }

        let recent: Vec<String> = repo
            .find_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(recent, vec!["m3", "m4"]);

        let first = repo.find_all(Some(2)).await.unwrap();
        assert_eq!(first[0].content, "m0");
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let repo = ObjectChatMessageRepository::new(ObjectStoreConnection::in_memory());
        repo.create(CreateChatMessageDto::new(MessageRole::User, "old"))
            .await
            .unwrap();
        let keep = repo
            .create(CreateChatMessageDto::new(MessageRole::Model, "new"))
            .await
            .unwrap();

        let removed = repo.delete_older_than(&keep.created_at).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(repo.find_all(None).await.unwrap(), vec![keep]);
    }
}
