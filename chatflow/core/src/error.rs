//! Error Taxonomy
//!
//! Typed errors for the chat pipeline. The library surfaces [`ChatError`]
//! everywhere; binaries wrap it in `anyhow` at the edges.

use thiserror::Error;

use crate::buffer::BufferError;
use crate::frame::DecodeError;

/// Errors produced by one chat turn
///
/// None of these are retried automatically; retry is a user-initiated new
/// submit. `Cancelled` is a distinct, non-failure terminal condition and
/// is never delivered through the render sink's error path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Connection refused, reset, or dropped before or during streaming
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend returned a non-success status or an in-band error frame
    ///
    /// In-band error frames carry `status: 0` since no HTTP status is
    /// associated with them.
    #[error("upstream error (status {status}): {body}")]
    Upstream {
        /// HTTP status code, or 0 for an in-band error frame
        status: u16,
        /// Response body or error frame message
        body: String,
    },

    /// The response stream could not be parsed as frames
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The caller-supplied turn deadline expired
    #[error("chat turn timed out")]
    TimedOut,

    /// The turn was cancelled by the user; not a failure
    #[error("chat turn cancelled")]
    Cancelled,

    /// A turn is already in flight for this conversation
    #[error("a chat turn is already in progress")]
    SessionBusy,

    /// Conversation buffer misuse
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl ChatError {
    /// Build an upstream error from an in-band error frame
    #[must_use]
    pub fn from_error_frame(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: 0,
            body: message.into(),
        }
    }
}
