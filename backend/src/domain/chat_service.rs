use std::sync::Arc;

use async_trait::async_trait;
use shared::{ChatMessage, CreateChatMessageDto, MessageRole};
use tracing::{info, warn};

use crate::error::{Result, ValidationError};
use crate::storage::ChatMessageStorage;

/// Messages handed to the completion model as context
const HISTORY_WINDOW: u32 = 50;

/// The text-completion collaborator behind the assistant chat
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Reply to `prompt`, given the earlier conversation oldest first
    async fn complete(&self, prompt: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Service for the assistant chat history
#[derive(Clone)]
pub struct ChatService {
    messages: Arc<dyn ChatMessageStorage>,
}

impl ChatService {
    pub fn new(messages: Arc<dyn ChatMessageStorage>) -> Self {
        Self { messages }
    }

    /// The most recent `limit` messages in chronological order, or all of them
    pub async fn get_messages(&self, limit: Option<u32>) -> Result<Vec<ChatMessage>> {
        match limit {
            Some(limit) => self.messages.find_recent(limit).await,
            None => self.messages.find_all(None).await,
        }
    }

    pub async fn add_message(&self, dto: CreateChatMessageDto) -> Result<ChatMessage> {
        if dto.content.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.messages.create(dto).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        info!("Clearing chat history");
        self.messages.delete_all().await
    }

    /// Store `prompt`, ask the model, and store its reply.
    ///
    /// The user message stays recorded when the model call fails.
    pub async fn send(&self, prompt: &str, client: &dyn CompletionClient) -> Result<ChatMessage> {
        let history: Vec<ChatMessage> = self
            .messages
            .find_recent(HISTORY_WINDOW)
            .await?
            .into_iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();

        self.add_message(CreateChatMessageDto::new(MessageRole::User, prompt))
            .await?;

        let reply = match client.complete(prompt, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Completion failed: {}", e);
                return Err(e);
            }
        };

        self.messages
            .create(CreateChatMessageDto::new(MessageRole::Model, reply))
            .await
    }
}
