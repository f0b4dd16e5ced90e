//! Checker configuration.
//!
//! A [`CheckerConfig`] is an ordinary value: the front end builds it once (defaults, then
//! environment, then its own flags) and hands a reference to every orchestrator call. Nothing in
//! the library keeps a global copy.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CheckerError, Result};

pub const DEFAULT_SUBMIT_URL: &str =
    "https://fb62-27-125-241-114.ngrok-free.app/webhook/ingredient-check";
pub const DEFAULT_RESULT_URL: &str = "https://fb62-27-125-241-114.ngrok-free.app/webhook/f3f51804-fafc-4103-bff9-4dc5ab97ff2f/response";
pub const DEFAULT_CHAT_RESULT_URL: &str = "https://fb62-27-125-241-114.ngrok-free.app/webhook/bb06b7cf-8a49-4f1e-ba44-ca85271eeaf6/response/chat";

pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;
pub const DEFAULT_REQUEST_RETRIES: u32 = 3;

/// Remote endpoints of the classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Batch submission webhook; chat submissions go to `{submit}/chat`
    pub submit: String,
    pub result_poll: String,
    pub chat_result_poll: String,
}

impl Endpoints {
    pub fn chat_submit(&self) -> String {
        format!("{}/chat", self.submit.trim_end_matches('/'))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            submit: DEFAULT_SUBMIT_URL.to_string(),
            result_poll: DEFAULT_RESULT_URL.to_string(),
            chat_result_poll: DEFAULT_CHAT_RESULT_URL.to_string(),
        }
    }
}

/// Backoff schedule for the result poll loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.2,
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl PollPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CheckerError::Config(
                "poll max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(CheckerError::Config(format!(
                "poll backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(CheckerError::Config(format!(
                "poll max_delay ({:?}) is shorter than initial_delay ({:?})",
                self.max_delay, self.initial_delay
            )));
        }
        Ok(())
    }

    /// Delay that follows `current` in the schedule.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = (current.as_millis() as f64 * self.backoff_multiplier).round() as u64;
        Duration::from_millis(scaled).min(self.max_delay)
    }

    /// The wait before each of the `max_attempts` ticks, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.max_attempts as usize);
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 0..self.max_attempts {
            delays.push(delay);
            delay = self.next_delay(delay);
        }
        delays
    }
}

/// Everything the orchestrator reads when serving a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub endpoints: Endpoints,
    pub use_mock_data: bool,
    pub notification_threshold_days: i64,
    pub poll: PollPolicy,
    /// Session identifier sent with every submission
    pub chat_id: String,
    /// How many times one HTTP request is attempted before giving up
    pub request_retries: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            use_mock_data: false,
            notification_threshold_days: DEFAULT_THRESHOLD_DAYS,
            poll: PollPolicy::default(),
            chat_id: new_chat_id(),
            request_retries: DEFAULT_REQUEST_RETRIES,
        }
    }
}

pub fn new_chat_id() -> String {
    format!("session_{}", Uuid::new_v4())
}

impl CheckerConfig {
    /// Defaults overridden by `HALAL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HALAL_SUBMIT_URL") {
            config.endpoints.submit = url;
        }
        if let Some(url) = lookup("HALAL_RESULT_URL") {
            config.endpoints.result_poll = url;
        }
        if let Some(url) = lookup("HALAL_CHAT_RESULT_URL") {
            config.endpoints.chat_result_poll = url;
        }
        if let Some(raw) = lookup("HALAL_USE_MOCK") {
            config.use_mock_data = parse_bool("HALAL_USE_MOCK", &raw)?;
        }
        if let Some(raw) = lookup("HALAL_THRESHOLD_DAYS") {
            config.notification_threshold_days = parse_number("HALAL_THRESHOLD_DAYS", &raw)?;
        }
        if let Some(raw) = lookup("HALAL_POLL_MAX_ATTEMPTS") {
            config.poll.max_attempts = parse_number("HALAL_POLL_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("HALAL_POLL_INITIAL_DELAY_MS") {
            config.poll.initial_delay =
                Duration::from_millis(parse_number("HALAL_POLL_INITIAL_DELAY_MS", &raw)?);
        }
        if let Some(raw) = lookup("HALAL_POLL_BACKOFF") {
            config.poll.backoff_multiplier = parse_number("HALAL_POLL_BACKOFF", &raw)?;
        }
        if let Some(raw) = lookup("HALAL_POLL_MAX_DELAY_MS") {
            config.poll.max_delay =
                Duration::from_millis(parse_number("HALAL_POLL_MAX_DELAY_MS", &raw)?);
        }

        if let Some(raw) = lookup("HALAL_REQUEST_RETRIES") {
            config.request_retries = parse_number("HALAL_REQUEST_RETRIES", &raw)?;
        }

        config.poll.validate()?;
        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CheckerError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| CheckerError::Config(format!("{} is not a valid number: '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_schedule_is_capped_and_non_decreasing() {
        let policy = PollPolicy::default();
        let schedule = policy.schedule();

        assert_eq!(schedule.len(), 15);
        assert_eq!(schedule[0], Duration::from_millis(1000));
        assert_eq!(schedule[1], Duration::from_millis(1200));
        for pair in schedule.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(schedule.iter().all(|d| *d <= policy.max_delay));
        assert_eq!(*schedule.last().unwrap(), policy.max_delay);
    }

    #[test]
    fn test_invalid_policies_are_rejected() {
        let zero = PollPolicy {
            max_attempts: 0,
            ..PollPolicy::default()
        };
        assert!(zero.validate().is_err());

        let shrinking = PollPolicy {
            backoff_multiplier: 0.5,
            ..PollPolicy::default()
        };
        assert!(shrinking.validate().is_err());

        let inverted = PollPolicy {
            max_delay: Duration::from_millis(10),
            ..PollPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HALAL_SUBMIT_URL", "http://localhost:9000/submit"),
            ("HALAL_USE_MOCK", "true"),
            ("HALAL_THRESHOLD_DAYS", "14"),
            ("HALAL_POLL_MAX_ATTEMPTS", "4"),
            ("HALAL_POLL_INITIAL_DELAY_MS", "10"),
            ("HALAL_POLL_MAX_DELAY_MS", "50"),
            ("HALAL_REQUEST_RETRIES", "5"),
        ]);
        let config = CheckerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.endpoints.submit, "http://localhost:9000/submit");
        assert_eq!(
            config.endpoints.chat_submit(),
            "http://localhost:9000/submit/chat"
        );
        assert!(config.use_mock_data);
        assert_eq!(config.notification_threshold_days, 14);
        assert_eq!(config.poll.max_attempts, 4);
        assert_eq!(config.poll.initial_delay, Duration::from_millis(10));
        assert_eq!(config.poll.max_delay, Duration::from_millis(50));
        assert_eq!(config.request_retries, 5);
        assert_eq!(config.endpoints.result_poll, DEFAULT_RESULT_URL);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let result = CheckerConfig::from_lookup(|k| {
            (k == "HALAL_USE_MOCK").then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(CheckerError::Config(_))));
    }

    #[test]
    fn test_chat_ids_are_unique_sessions() {
        let a = new_chat_id();
        let b = new_chat_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
    }
}
