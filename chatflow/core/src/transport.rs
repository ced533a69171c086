//! Chat Transport Trait
//!
//! Trait seam between the session controller and the HTTP layer. The
//! controller only needs a way to turn a request payload into a byte
//! stream; everything provider-specific (URLs, headers, status handling)
//! lives behind this trait.
//!
//! Tests drive the controller with scripted in-memory transports instead
//! of a live backend.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::ChatError;
use crate::messages::RequestPayload;

/// Raw response byte stream
///
/// Chunks arrive at arbitrary boundaries. An `Err` item is a transport
/// failure mid-stream; the stream must not be polled after it.
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Dispatches one chat request and exposes the response as a byte stream
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the payload and return the response stream
    ///
    /// Fails with [`ChatError::Transport`] when the connection cannot be
    /// established and [`ChatError::Upstream`] when the backend answers
    /// with a non-success status.
    async fn send(&self, payload: &RequestPayload) -> Result<ByteStream, ChatError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use futures::StreamExt;

    /// Transport that replays a scripted chunk sequence
    pub struct ScriptedTransport {
        chunks: Vec<Result<Bytes, ChatError>>,
    }

    impl ScriptedTransport {
        pub fn new(chunks: Vec<Result<Bytes, ChatError>>) -> Self {
            Self { chunks }
        }

        pub fn from_chunks(chunks: &[&str]) -> Self {
            Self::new(
                chunks
                    .iter()
                    .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _payload: &RequestPayload) -> Result<ByteStream, ChatError> {
            let chunks = self.chunks.clone();
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    /// Transport that always fails to connect
    pub struct RefusedTransport;

    #[async_trait]
    impl ChatTransport for RefusedTransport {
        async fn send(&self, _payload: &RequestPayload) -> Result<ByteStream, ChatError> {
            Err(ChatError::Transport("connection refused".to_string()))
        }
    }
}
