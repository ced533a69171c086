//! HTTP Chat Client
//!
//! [`ChatTransport`] implementation over reqwest. Posts the request
//! payload as JSON to the configured chat endpoint and exposes the
//! response body as an incremental byte stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::ChatError;
use crate::messages::RequestPayload;
use crate::transport::{ByteStream, ChatTransport};

/// Connect timeout for the chat endpoint
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the backend chat endpoint
#[derive(Clone)]
pub struct HttpChatClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpChatClient {
    /// Create a client for the given chat endpoint URL
    ///
    /// `endpoint` is the full URL of the chat completion route, e.g.
    /// `http://localhost:3000/api/chat`. No overall request timeout is set
    /// here: streamed responses are open-ended, and the turn deadline is
    /// the controller's job.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    /// The configured endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the backend answers at all
    ///
    /// Issues a GET against the sibling `health` route of the endpoint.
    pub async fn health_check(&self) -> bool {
        let url = match self.endpoint.rsplit_once('/') {
            Some((base, _)) => format!("{base}/health"),
            None => return false,
        };
        self.http_client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}

#[async_trait]
impl ChatTransport for HttpChatClient {
    async fn send(&self, payload: &RequestPayload) -> Result<ByteStream, ChatError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|item| item.map_err(|e| ChatError::Transport(e.to_string())))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_keeps_endpoint() {
        let client = HttpChatClient::new("http://localhost:3000/api/chat").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/api/chat");
    }
}
