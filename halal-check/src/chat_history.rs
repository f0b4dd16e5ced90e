use tracing::{error, info};

use crate::error::Result;
use crate::models::ChatMessage;
use crate::storage::{KeyValueStore, storage_keys};

/// Most recent messages kept in the persisted transcript.
pub const MAX_CHAT_HISTORY: usize = 50;

/// Append-only chat transcript, capped to the most recent [`MAX_CHAT_HISTORY`] messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.trim();
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn trim(&mut self) {
        if self.messages.len() > MAX_CHAT_HISTORY {
            let excess = self.messages.len() - MAX_CHAT_HISTORY;
            self.messages.drain(..excess);
        }
    }

    /// Restore the transcript; unreadable data starts a fresh one.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = store.get(storage_keys::CHAT_HISTORY).await? else {
            return Ok(Self::new());
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
            Ok(messages) => {
                let mut history = Self { messages };
                history.trim();
                Ok(history)
            }
            Err(e) => {
                error!("Failed to load chat history: {}", e);
                Ok(Self::new())
            }
        }
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let body = serde_json::to_string(&self.messages)?;
        store.set(storage_keys::CHAT_HISTORY, body).await
    }

    pub async fn clear(&mut self, store: &dyn KeyValueStore) -> Result<()> {
        self.messages.clear();
        store.remove(storage_keys::CHAT_HISTORY).await?;
        info!("Chat history cleared");
        Ok(())
    }
}
