pub mod chat_history;
pub mod config;
pub mod error;
pub mod mock;
pub mod models;
pub mod orchestrator;
pub mod remote;
pub mod report;
pub mod session;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use chat_history::{ChatHistory, MAX_CHAT_HISTORY};
pub use config::{CheckerConfig, Endpoints, PollPolicy};
pub use error::{CheckerError, Result};
pub use mock::MockProvider;
pub use models::{ChatMessage, IngredientQuery, IngredientResult, IngredientStatus};
pub use orchestrator::{CHAT_APOLOGY, ChatReply, CheckOutcome, Orchestrator, ResultSource};
pub use remote::{
    ChatClient, ChatExchange, ClassificationClient, Exchange, IngredientCheck, PollRequest,
    PollStatus, RemoteClient,
};
pub use report::{CertificationState, ExpiryAlert, ResultStats, export_csv, export_file_name};
pub use session::{AppStatus, ChatSession};
pub use storage::{FileStore, InMemoryStore, KeyValueStore, storage_keys};
pub use transport::{HttpTransport, Transport};
