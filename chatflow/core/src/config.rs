//! Session Configuration
//!
//! Configuration for the chat pipeline. Values come from the caller or
//! from environment variables; nothing is read from disk.

use std::time::Duration;

use crate::frame::WireFraming;

/// Default backend origin (the dev proxy's listen address)
pub const DEFAULT_BACKEND_ORIGIN: &str = "http://localhost:3000";

/// Path of the chat completion route under the API prefix
pub const CHAT_PATH: &str = "/api/chat";

/// Configuration for one chat session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Optional deadline for a whole turn; expiry behaves like
    /// cancellation but reports a timeout error
    pub timeout: Option<Duration>,
    /// Wire framing of the backend's response stream
    pub framing: WireFraming,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            timeout: None,
            framing: WireFraming::default(),
        }
    }
}

impl SessionConfig {
    /// Create configuration from environment variables
    ///
    /// Reads `CHATFLOW_MODEL`, `CHATFLOW_TIMEOUT_SECS`, and
    /// `CHATFLOW_FRAMING` (`ndjson` or `sse`), falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("CHATFLOW_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("CHATFLOW_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            framing: std::env::var("CHATFLOW_FRAMING")
                .ok()
                .and_then(|v| WireFraming::parse(&v))
                .unwrap_or(defaults.framing),
        }
    }

    /// Set the turn timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Backend origin from the environment (`CHATFLOW_BACKEND_URL`)
#[must_use]
pub fn backend_origin_from_env() -> String {
    std::env::var("CHATFLOW_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_ORIGIN.to_string())
}

/// Full chat endpoint URL for a backend origin
#[must_use]
pub fn chat_endpoint(origin: &str) -> String {
    format!("{}{CHAT_PATH}", origin.trim_end_matches('/'))
}
