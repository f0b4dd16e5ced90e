use thiserror::Error;

/// Errors produced while checking ingredients or exchanging chat messages
#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Please enter at least one ingredient")]
    EmptyInput,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to get results after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    #[error("No results to export")]
    NothingToExport,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckerError {
    /// Remote-path failures are absorbed by the orchestrator; everything else reaches the caller.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            CheckerError::Transport(_)
                | CheckerError::Api(_)
                | CheckerError::Parse(_)
                | CheckerError::PollTimeout { .. }
        )
    }
}

impl From<reqwest::Error> for CheckerError {
    fn from(err: reqwest::Error) -> Self {
        CheckerError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CheckerError {
    fn from(err: serde_json::Error) -> Self {
        CheckerError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CheckerError>;
