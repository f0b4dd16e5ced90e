//! Persistent user-facing state: the chat transcript and the last submitted input.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::chat_history::ChatHistory;
use crate::config::CheckerConfig;
use crate::error::{CheckerError, Result};
use crate::orchestrator::{ChatReply, Orchestrator};
use crate::storage::{KeyValueStore, storage_keys};

/// Chat exchange whose transcript is persisted after every message
pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn KeyValueStore>,
    history: ChatHistory,
}

impl ChatSession {
    pub async fn open(orchestrator: Arc<Orchestrator>, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let history = ChatHistory::load(store.as_ref()).await?;
        debug!("Loaded chat history with {} messages", history.len());
        Ok(Self {
            orchestrator,
            store,
            history,
        })
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Record the question, ask, and record the answer. Apologies for a failed exchange are
    /// returned but kept out of the transcript.
    pub async fn send(&mut self, config: &CheckerConfig, text: &str) -> Result<ChatReply> {
        let message = text.trim();
        if message.is_empty() {
            return Err(CheckerError::EmptyInput);
        }
        if !config.use_mock_data {
            config.poll.validate()?;
        }

        self.history.add_user_message(message);
        self.history.save(self.store.as_ref()).await?;

        let reply = self.orchestrator.send_chat_message(config, message).await?;
        if !reply.source.is_degraded() {
            self.history.add_assistant_message(reply.text.clone());
            self.history.save(self.store.as_ref()).await?;
        }
        Ok(reply)
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.history.clear(self.store.as_ref()).await
    }
}

/// Remember the raw ingredient text between runs.
pub async fn save_input_text(store: &dyn KeyValueStore, raw_text: &str) -> Result<()> {
    store
        .set(storage_keys::INPUT_TEXT, raw_text.to_string())
        .await
}

pub async fn load_input_text(store: &dyn KeyValueStore) -> Result<Option<String>> {
    store.get(storage_keys::INPUT_TEXT).await
}

pub async fn clear_input_text(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(storage_keys::INPUT_TEXT).await
}

/// Snapshot of the application state for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub version: String,
    pub mock_mode: bool,
    pub api_endpoint: String,
    pub chat_history_size: usize,
}

impl AppStatus {
    pub fn collect(config: &CheckerConfig, history: &ChatHistory) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mock_mode: config.use_mock_data,
            api_endpoint: config.endpoints.submit.clone(),
            chat_history_size: history.len(),
        }
    }
}
