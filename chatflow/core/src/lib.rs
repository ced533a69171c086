//! Chatflow Core - Streaming Chat Session Pipeline
//!
//! This crate provides the client side of a streaming chat exchange,
//! completely independent of any UI framework. It can drive a terminal
//! surface, a browser front end over a channel, or run headless for
//! testing.
//!
//! # Architecture
//!
//! ```text
//! user input
//!     │
//!     ▼
//! ┌─────────────────────┐   RequestPayload    ┌───────────────┐
//! │ SessionController   │────────────────────▶│ ChatTransport │──▶ backend
//! │  (state machine)    │◀────────────────────│ (HTTP client) │◀── (via dev
//! └──────┬──────────────┘     byte stream     └───────────────┘     proxy)
//!        │ drives
//!        ▼
//! ┌───────────────┐  StreamFrames  ┌────────────────────┐
//! │ FrameDecoder  │───────────────▶│ ConversationBuffer │
//! └───────────────┘                └─────────┬──────────┘
//!                                            │ full partial content
//!                                            ▼
//!                                     ┌────────────┐
//!                                     │ RenderSink │──▶ surface
//!                                     └────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionController`]: drives one request/response cycle to a
//!   terminal state
//! - [`ConversationBuffer`]: ordered history plus the one in-progress
//!   assistant message
//! - [`FrameDecoder`] / [`StreamFrame`]: incremental decoding of the
//!   response stream, framing pluggable via [`WireFraming`]
//! - [`RenderSink`]: the rendering seam; [`ChannelSink`] forwards updates
//!   to a surface task
//! - [`ChatTransport`] / [`HttpChatClient`]: the HTTP seam
//! - [`CancelHandle`]: cooperative mid-stream cancellation
//!
//! # Quick Start
//!
//! ```ignore
//! use chatflow_core::{
//!     ChannelSink, HttpChatClient, SessionConfig, SessionController,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = HttpChatClient::new("http://localhost:3000/api/chat")?;
//!     let (sink, mut updates) = ChannelSink::new();
//!     let mut controller =
//!         SessionController::new(client, SessionConfig::from_env(), sink);
//!
//!     tokio::spawn(async move {
//!         while let Some(update) = updates.recv().await {
//!             // Render the update
//!         }
//!     });
//!
//!     controller.submit("hi").await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod messages;
pub mod sink;
pub mod transport;

pub use buffer::{BufferError, ConversationBuffer};
pub use client::HttpChatClient;
pub use config::{backend_origin_from_env, chat_endpoint, SessionConfig};
pub use controller::{CancelHandle, SessionController, SessionState, TurnOutcome};
pub use error::ChatError;
pub use frame::{DecodeError, FrameDecoder, NdjsonDecoder, SseDecoder, StreamFrame, WireFraming};
pub use messages::{Message, MessageId, RequestPayload, Role, WireMessage};
pub use sink::{ChannelSink, RenderSink, SurfaceUpdate};
pub use transport::{ByteStream, ChatTransport};
