//! Generic submit-then-poll client.
//!
//! The classification service accepts a job on a submission webhook and publishes the answer
//! later on a result endpoint keyed by request id. Ingredient checks and chat messages follow
//! the same protocol and differ only in the [`Exchange`] they plug in: endpoints, request
//! payload, and how the published value is unpacked.
//!
//! Poll loop states: `Idle → Submitted → Polling → {Resolved | Exhausted}`. Every tick waits the
//! current delay, polls once, and on `Pending` or a failed tick grows the delay by the policy's
//! multiplier up to its cap. Running out of attempts is [`CheckerError::PollTimeout`].

use serde::Deserialize;
use serde_json::{Value, json};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{CheckerConfig, Endpoints, PollPolicy};
use crate::error::{CheckerError, Result};
use crate::models::{
    IngredientQuery, IngredientResult, IngredientStatus, NOT_AVAILABLE, UNKNOWN_SUPPLIER,
};
use crate::transport::Transport;

/// Protocol-specific half of a submit-then-poll exchange
pub trait Exchange: Send + Sync + 'static {
    type Request: Sync + ?Sized;
    type Output: Send;

    /// Name used in log lines
    const LABEL: &'static str;
    /// Message reported when the service rejects a submission without saying why
    const API_ERROR: &'static str;

    fn submit_url(endpoints: &Endpoints) -> String;
    fn result_url(endpoints: &Endpoints) -> String;
    fn request_body(request: &Self::Request, chat_id: &str, response_url: &str) -> Value;

    /// `Ok(None)` means the service has not produced an answer yet.
    fn unpack(payload: Value) -> Result<Option<Self::Output>>;
}

/// Outcome of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Bookkeeping for one poll loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollRequest {
    pub request_id: String,
    pub attempt: u32,
    pub delay: Duration,
}

impl PollRequest {
    pub fn new(request_id: impl Into<String>, policy: &PollPolicy) -> Self {
        Self {
            request_id: request_id.into(),
            attempt: 0,
            delay: policy.initial_delay.min(policy.max_delay),
        }
    }

    fn advance(&mut self, policy: &PollPolicy) {
        self.delay = policy.next_delay(self.delay);
    }
}

#[derive(Debug, Deserialize)]
struct SubmitAck {
    #[serde(default)]
    success: bool,
    #[serde(rename = "chatId")]
    chat_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollEnvelope {
    value: Option<Value>,
}

/// Submit-then-poll client for one [`Exchange`]
pub struct RemoteClient<E: Exchange> {
    transport: Arc<dyn Transport>,
    _exchange: PhantomData<fn() -> E>,
}

impl<E: Exchange> Clone for RemoteClient<E> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _exchange: PhantomData,
        }
    }
}

impl<E: Exchange> RemoteClient<E> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            _exchange: PhantomData,
        }
    }

    /// Send the job and return the request id to poll for.
    pub async fn submit(&self, config: &CheckerConfig, request: &E::Request) -> Result<String> {
        let url = E::submit_url(&config.endpoints);
        let response_url = E::result_url(&config.endpoints);
        let body = E::request_body(request, &config.chat_id, &response_url);

        info!("Submitting {} request to {}", E::LABEL, url);
        let raw = self.transport.post_json(&url, &body).await?;
        let ack: SubmitAck = serde_json::from_value(raw)?;

        if !ack.success {
            return Err(CheckerError::Api(
                ack.error.unwrap_or_else(|| E::API_ERROR.to_string()),
            ));
        }

        let request_id = ack
            .chat_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| config.chat_id.clone());
        info!("{} request accepted (ID: {})", E::LABEL, request_id);
        Ok(request_id)
    }

    /// Query the result endpoint once.
    pub async fn poll(&self, config: &CheckerConfig, request_id: &str) -> Result<PollStatus<E::Output>> {
        let url = format!(
            "{}/{}",
            E::result_url(&config.endpoints).trim_end_matches('/'),
            request_id
        );
        let raw = self.transport.get_json(&url).await?;

        let payload = match raw {
            Value::Null => None,
            other => serde_json::from_value::<PollEnvelope>(other)?.value,
        };

        let payload = match payload {
            None | Some(Value::Null) => return Ok(PollStatus::Pending),
            Some(Value::String(encoded)) if encoded.trim().is_empty() => {
                return Ok(PollStatus::Pending);
            }
            Some(Value::String(encoded)) => serde_json::from_str::<Value>(&encoded)?,
            Some(inline) => inline,
        };

        Ok(match E::unpack(payload)? {
            Some(output) => PollStatus::Ready(output),
            None => PollStatus::Pending,
        })
    }

    /// Poll with backoff until the answer is published or the attempt cap is reached.
    pub async fn wait_for_result(&self, config: &CheckerConfig, request_id: &str) -> Result<E::Output> {
        let policy = &config.poll;
        let mut tick = PollRequest::new(request_id, policy);
        info!("Starting to poll for {} result (ID: {})", E::LABEL, request_id);

        while tick.attempt < policy.max_attempts {
            tick.attempt += 1;
            debug!(
                "Polling attempt {}/{} (delay: {}ms)",
                tick.attempt,
                policy.max_attempts,
                tick.delay.as_millis()
            );
            tokio::time::sleep(tick.delay).await;

            match self.poll(config, &tick.request_id).await {
                Ok(PollStatus::Ready(output)) => {
                    info!(
                        "{} result received after {} attempts",
                        E::LABEL,
                        tick.attempt
                    );
                    return Ok(output);
                }
                Ok(PollStatus::Pending) => {
                    debug!("Still processing... (attempt {})", tick.attempt);
                }
                Err(e) => {
                    warn!("Polling attempt {} error: {}", tick.attempt, e);
                }
            }
            tick.advance(policy);
        }

        Err(CheckerError::PollTimeout {
            attempts: policy.max_attempts,
        })
    }

    /// Submit, then wait for the result.
    pub async fn run(&self, config: &CheckerConfig, request: &E::Request) -> Result<E::Output> {
        let request_id = self.submit(config, request).await?;
        self.wait_for_result(config, &request_id).await
    }
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Batch ingredient classification
pub struct IngredientCheck;

#[derive(Debug, Deserialize)]
struct ResultsPayload {
    #[serde(default)]
    results: Vec<Value>,
}

fn text_field(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// One wire record, read field by field so a single odd entry cannot sink the batch.
fn record_from_entry(entry: &Value) -> Option<IngredientResult> {
    let Some(ingredient) = text_field(entry, "ingredient") else {
        warn!("Skipping result entry without an ingredient: {}", entry);
        return None;
    };

    let status = match entry.get("status").and_then(Value::as_str) {
        Some(label) => IngredientStatus::from_label(label).unwrap_or_else(|| {
            warn!("Unknown status '{}' for {}, treating as Not Found", label, ingredient);
            IngredientStatus::NotFound
        }),
        None => {
            warn!("Missing status for {}, treating as Not Found", ingredient);
            IngredientStatus::NotFound
        }
    };

    let record = IngredientResult {
        ingredient,
        status,
        expiry_date: text_field(entry, "expiryDate").unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        supplier: text_field(entry, "supplier").unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string()),
        certificate_id: text_field(entry, "certificateId")
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    };
    Some(record.normalized())
}

impl Exchange for IngredientCheck {
    type Request = IngredientQuery;
    type Output = Vec<IngredientResult>;

    const LABEL: &'static str = "ingredient check";
    const API_ERROR: &'static str = "API error";

    fn submit_url(endpoints: &Endpoints) -> String {
        endpoints.submit.clone()
    }

    fn result_url(endpoints: &Endpoints) -> String {
        endpoints.result_poll.clone()
    }

    fn request_body(request: &IngredientQuery, chat_id: &str, response_url: &str) -> Value {
        json!({
            "ingredients": request.ingredients(),
            "chatId": chat_id,
            "responseUrl": response_url,
            "timestamp": timestamp(),
        })
    }

    /// Any non-empty `results` list resolves the poll, even if every entry is unusable.
    fn unpack(payload: Value) -> Result<Option<Vec<IngredientResult>>> {
        let parsed: ResultsPayload = serde_json::from_value(payload)?;
        if parsed.results.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            parsed.results.iter().filter_map(record_from_entry).collect(),
        ))
    }
}

/// Single chat message with a single text reply
pub struct ChatExchange;

#[derive(Debug, Deserialize)]
struct ChatPayload {
    response: Option<String>,
}

impl Exchange for ChatExchange {
    type Request = str;
    type Output = String;

    const LABEL: &'static str = "chat";
    const API_ERROR: &'static str = "Chat API error";

    fn submit_url(endpoints: &Endpoints) -> String {
        endpoints.chat_submit()
    }

    fn result_url(endpoints: &Endpoints) -> String {
        endpoints.chat_result_poll.clone()
    }

    fn request_body(request: &str, chat_id: &str, response_url: &str) -> Value {
        json!({
            "message": request,
            "chatId": chat_id,
            "responseUrl": response_url,
            "timestamp": timestamp(),
        })
    }

    fn unpack(payload: Value) -> Result<Option<String>> {
        let parsed: ChatPayload = serde_json::from_value(payload)?;
        Ok(parsed.response.filter(|reply| !reply.trim().is_empty()))
    }
}

pub type ClassificationClient = RemoteClient<IngredientCheck>;
pub type ChatClient = RemoteClient<ChatExchange>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scripted transport: answers come off per-method queues, calls are recorded.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        posts: Mutex<VecDeque<Result<Value>>>,
        gets: Mutex<VecDeque<Result<Value>>>,
        pub(crate) post_calls: Mutex<Vec<(String, Value)>>,
        pub(crate) get_calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on_post(self, response: Result<Value>) -> Self {
            self.posts.lock().unwrap().push_back(response);
            self
        }

        pub(crate) fn on_get(self, response: Result<Value>) -> Self {
            self.gets.lock().unwrap().push_back(response);
            self
        }

        pub(crate) fn get_count(&self) -> usize {
            self.get_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
            self.post_calls
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.posts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CheckerError::Transport("no scripted POST".into())))
        }

        async fn get_json(&self, url: &str) -> Result<Value> {
            self.get_calls
                .lock()
                .unwrap()
                .push((url.to_string(), Instant::now()));
            self.gets
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({})))
        }
    }

    pub(crate) fn test_config() -> CheckerConfig {
        CheckerConfig {
            endpoints: Endpoints {
                submit: "http://svc/webhook/ingredient-check".to_string(),
                result_poll: "http://svc/response".to_string(),
                chat_result_poll: "http://svc/response/chat".to_string(),
            },
            chat_id: "session_test".to_string(),
            poll: PollPolicy {
                max_attempts: 5,
                initial_delay: Duration::from_millis(100),
                backoff_multiplier: 2.0,
                max_delay: Duration::from_millis(300),
            },
            ..CheckerConfig::default()
        }
    }

    pub(crate) fn results_value(results: Value) -> Value {
        json!({ "value": json!({ "results": results }).to_string() })
    }

    fn corn_starch() -> Value {
        json!([{
            "ingredient": "corn starch",
            "status": "Certified",
            "expiryDate": "2025-12-15",
            "supplier": "Halal Foods Sdn Bhd",
            "certificateId": "JAKIM-2024-001"
        }])
    }

    #[tokio::test]
    async fn test_submit_sends_payload_and_uses_returned_id() {
        let transport = Arc::new(
            ScriptedTransport::new().on_post(Ok(json!({"success": true, "chatId": "req-7"}))),
        );
        let client = ClassificationClient::new(transport.clone());
        let query = IngredientQuery::parse("Corn Starch\ngelatin").unwrap();

        let id = client.submit(&test_config(), &query).await.unwrap();
        assert_eq!(id, "req-7");

        let calls = transport.post_calls.lock().unwrap();
        let (url, body) = &calls[0];
        assert_eq!(url, "http://svc/webhook/ingredient-check");
        assert_eq!(body["ingredients"], json!(["corn starch", "gelatin"]));
        assert_eq!(body["chatId"], "session_test");
        assert_eq!(body["responseUrl"], "http://svc/response");
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_submit_falls_back_to_session_id() {
        let transport = Arc::new(ScriptedTransport::new().on_post(Ok(json!({"success": true}))));
        let client = ChatClient::new(transport.clone());

        let id = client.submit(&test_config(), "hello").await.unwrap();
        assert_eq!(id, "session_test");

        let calls = transport.post_calls.lock().unwrap();
        assert_eq!(calls[0].0, "http://svc/webhook/ingredient-check/chat");
        assert_eq!(calls[0].1["message"], "hello");
        assert_eq!(calls[0].1["responseUrl"], "http://svc/response/chat");
    }

    #[tokio::test]
    async fn test_rejected_submission_is_api_error() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_post(Ok(json!({"success": false, "error": "quota exceeded"})))
                .on_post(Ok(json!({"success": false}))),
        );
        let client = ChatClient::new(transport);

        match client.submit(&test_config(), "hi").await {
            Err(CheckerError::Api(message)) => assert_eq!(message, "quota exceeded"),
            other => panic!("expected API error, got {:?}", other),
        }
        match client.submit(&test_config(), "hi").await {
            Err(CheckerError::Api(message)) => assert_eq!(message, "Chat API error"),
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_distinguishes_pending_ready_and_malformed() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_get(Ok(json!({})))
                .on_get(Ok(json!({"value": ""})))
                .on_get(Ok(results_value(json!([]))))
                .on_get(Ok(json!({"value": "{not json"})))
                .on_get(Ok(results_value(corn_starch()))),
        );
        let client = ClassificationClient::new(transport.clone());
        let config = test_config();

        for _ in 0..3 {
            assert_eq!(
                client.poll(&config, "req-1").await.unwrap(),
                PollStatus::Pending
            );
        }
        assert!(matches!(
            client.poll(&config, "req-1").await,
            Err(CheckerError::Parse(_))
        ));
        match client.poll(&config, "req-1").await.unwrap() {
            PollStatus::Ready(results) => assert_eq!(results[0].certificate_id, "JAKIM-2024-001"),
            PollStatus::Pending => panic!("expected results"),
        }

        let calls = transport.get_calls.lock().unwrap();
        assert_eq!(calls[0].0, "http://svc/response/req-1");
    }

    #[tokio::test]
    async fn test_chat_poll_unpacks_response() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_get(Ok(json!({"value": "{\"response\": \"\"}"})))
                .on_get(Ok(json!({"value": {"response": "Gelatin depends on its source."}}))),
        );
        let client = ChatClient::new(transport);
        let config = test_config();

        assert_eq!(
            client.poll(&config, "c1").await.unwrap(),
            PollStatus::Pending
        );
        assert_eq!(
            client.poll(&config, "c1").await.unwrap(),
            PollStatus::Ready("Gelatin depends on its source.".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_backs_off_through_errors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_get(Ok(json!({})))
                .on_get(Err(CheckerError::Transport("connection reset".into())))
                .on_get(Ok(json!({"value": "garbage"})))
                .on_get(Ok(results_value(corn_starch()))),
        );
        let client = ClassificationClient::new(transport.clone());
        let started = Instant::now();

        let results = client
            .wait_for_result(&test_config(), "req-1")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(transport.get_count(), 4);

        // 100, 200, 300 (capped), 300
        let calls = transport.get_calls.lock().unwrap();
        let offsets: Vec<u128> = calls
            .iter()
            .map(|(_, at)| at.duration_since(started).as_millis())
            .collect();
        assert_eq!(offsets, vec![100, 300, 600, 900]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_exhausts_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ChatClient::new(transport.clone());

        let result = client.wait_for_result(&test_config(), "c1").await;
        assert!(matches!(
            result,
            Err(CheckerError::PollTimeout { attempts: 5 })
        ));
        assert_eq!(transport.get_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_submits_then_polls() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_post(Ok(json!({"success": true, "chatId": "c9"})))
                .on_get(Ok(json!({"value": "{\"response\": \"Pork is haram.\"}"}))),
        );
        let client = ChatClient::new(transport.clone());

        let reply = client.run(&test_config(), "pork?").await.unwrap();
        assert_eq!(reply, "Pork is haram.");
        assert_eq!(
            transport.get_calls.lock().unwrap()[0].0,
            "http://svc/response/chat/c9"
        );
    }
}
