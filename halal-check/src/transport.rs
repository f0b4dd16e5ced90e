use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_REQUEST_RETRIES;
use crate::error::{CheckerError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// JSON-over-HTTP seam between the remote clients and the network
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// reqwest-backed transport that retries one well-formed request a fixed number of times
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_attempts(DEFAULT_REQUEST_RETRIES)
    }

    pub fn with_attempts(attempts: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("ngrok-skip-browser-warning"),
            HeaderValue::from_static("true"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            attempts: attempts.max(1),
            retry_delay: RETRY_DELAY,
        })
    }

    /// Base of the linear backoff between attempts (`attempt * retry_delay`).
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    async fn send_once(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            return Err(CheckerError::Transport(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Value>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            debug!("Request attempt {}/{} to {}", attempt, self.attempts, url);
            match self.send_once(build()).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("Request to {} succeeded on attempt {}", url, attempt);
                    }
                    return Ok(value);
                }
                // A body we cannot decode will not improve on retry
                Err(e @ CheckerError::Parse(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Request attempt {}/{} to {} failed: {}",
                        attempt, self.attempts, url, e
                    );
                    last_error = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(CheckerError::Transport(format!(
            "All {} attempts to {} failed. Last error: {}",
            self.attempts, url, last
        )))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.send_with_retry(url, || self.client.post(url).json(body))
            .await
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.send_with_retry(url, || self.client.get(url)).await
    }
}
