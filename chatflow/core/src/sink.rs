//! Render Sink
//!
//! The seam between the session controller and whatever is displaying the
//! conversation. The controller calls the sink synchronously from its
//! event loop; sinks are pure renderers with no business logic.
//!
//! # Contract
//!
//! - `on_delta` fires after every successful append to the in-progress
//!   message and receives the full accumulated text, so a sink can always
//!   do a full idempotent re-render.
//! - `on_complete` fires exactly once when the stream ends normally.
//! - `on_error` fires exactly once on a fatal error.
//! - Nothing fires after cancellation is acknowledged.

use tokio::sync::mpsc;

use crate::error::ChatError;

/// Receives incremental render updates for one conversation
pub trait RenderSink: Send {
    /// The in-progress message grew; `partial` is its full content so far
    fn on_delta(&mut self, partial: &str);

    /// The stream ended normally with this final content
    fn on_complete(&mut self, final_content: &str);

    /// The turn failed; partial content already rendered stays visible
    fn on_error(&mut self, error: &ChatError);
}

/// Update messages sent to a surface task by [`ChannelSink`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceUpdate {
    /// In-progress content grew; full accumulated text
    Delta {
        /// Full content of the in-progress message
        content: String,
    },
    /// Stream completed normally
    Completed {
        /// Final message content
        content: String,
    },
    /// Turn failed
    Failed {
        /// Error description for display
        error: String,
    },
}

/// Sink that forwards updates over a channel to a surface task
///
/// Uses an unbounded channel so the synchronous sink calls in the
/// controller's event loop never block on a slow surface.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SurfaceUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the surface task
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RenderSink for ChannelSink {
    fn on_delta(&mut self, partial: &str) {
        let _ = self.tx.send(SurfaceUpdate::Delta {
            content: partial.to_string(),
        });
    }

    fn on_complete(&mut self, final_content: &str) {
        let _ = self.tx.send(SurfaceUpdate::Completed {
            content: final_content.to_string(),
        });
    }

    fn on_error(&mut self, error: &ChatError) {
        let _ = self.tx.send(SurfaceUpdate::Failed {
            error: error.to_string(),
        });
    }
}
