use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::CheckerConfig;
use crate::error::{CheckerError, Result};
use crate::mock::MockProvider;
use crate::models::{IngredientQuery, IngredientResult};
use crate::remote::{ChatClient, ClassificationClient};
use crate::transport::Transport;

/// Reply shown when a live chat exchange fails.
pub const CHAT_APOLOGY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again later.";

/// Where a result set came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultSource {
    /// Answered by the remote service
    Live,
    /// Mock mode was requested
    Mock,
    /// The remote path failed and demo data stands in
    Degraded { reason: String },
}

impl ResultSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ResultSource::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub results: Vec<IngredientResult>,
    pub source: ResultSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub source: ResultSource,
}

/// Chooses between the mock table and the remote service and absorbs remote failures
#[derive(Clone)]
pub struct Orchestrator {
    classifier: ClassificationClient,
    chat: ChatClient,
    mock: MockProvider,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            classifier: ClassificationClient::new(transport.clone()),
            chat: ChatClient::new(transport),
            mock: MockProvider::new(),
        }
    }

    pub fn mock(&self) -> &MockProvider {
        &self.mock
    }

    /// One record per input line, in input order.
    ///
    /// Only [`CheckerError::EmptyInput`] (and an invalid poll policy) reach the caller; remote
    /// failures come back as mock records tagged [`ResultSource::Degraded`].
    pub async fn check_ingredients(&self, config: &CheckerConfig, raw_text: &str) -> Result<CheckOutcome> {
        let query = IngredientQuery::parse(raw_text)?;
        info!("Checking {} ingredients...", query.len());

        if config.use_mock_data {
            info!("Using mock data for ingredient check");
            return Ok(CheckOutcome {
                results: self.mock.check(&query),
                source: ResultSource::Mock,
            });
        }

        config.poll.validate()?;

        match self.classifier.run(config, &query).await {
            Ok(remote) => {
                let results = align_results(&query, remote);
                info!("Successfully checked {} ingredients", results.len());
                Ok(CheckOutcome {
                    results,
                    source: ResultSource::Live,
                })
            }
            Err(e) if e.is_remote() => {
                error!("Error checking ingredients: {}", e);
                warn!("Falling back to mock data due to API error");
                Ok(CheckOutcome {
                    results: self.mock.check(&query),
                    source: ResultSource::Degraded {
                        reason: e.to_string(),
                    },
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn send_chat_message(&self, config: &CheckerConfig, text: &str) -> Result<ChatReply> {
        let message = text.trim();
        if message.is_empty() {
            return Err(CheckerError::EmptyInput);
        }
        info!("Sending chat message: {}", message);

        if config.use_mock_data {
            return Ok(ChatReply {
                text: self.mock.chat_reply(message),
                source: ResultSource::Mock,
            });
        }

        config.poll.validate()?;

        match self.chat.run(config, message).await {
            Ok(text) => Ok(ChatReply {
                text,
                source: ResultSource::Live,
            }),
            Err(e) if e.is_remote() => {
                error!("Chat error: {}", e);
                Ok(ChatReply {
                    text: CHAT_APOLOGY.to_string(),
                    source: ResultSource::Degraded {
                        reason: e.to_string(),
                    },
                })
            }
            Err(e) => Err(e),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Order remote records by the query; names the service skipped become NotFound.
fn align_results(query: &IngredientQuery, remote: Vec<IngredientResult>) -> Vec<IngredientResult> {
    let mut by_name: HashMap<String, IngredientResult> = HashMap::new();
    for record in remote {
        by_name
            .entry(normalize_name(&record.ingredient))
            .or_insert(record);
    }

    let mut missing = 0;
    let aligned: Vec<IngredientResult> = query
        .iter()
        .map(|name| match by_name.get(name) {
            Some(record) => IngredientResult {
                ingredient: name.to_string(),
                ..record.clone()
            }
            .normalized(),
            None => {
                missing += 1;
                IngredientResult::not_found(name)
            }
        })
        .collect();

    if missing > 0 {
        warn!("Service returned no record for {} ingredient(s)", missing);
    }
    aligned
}
