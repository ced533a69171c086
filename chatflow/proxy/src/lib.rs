//! Chatflow Dev Proxy
//!
//! A small development-time server that sits on the frontend's origin:
//! requests under the API prefix are relayed to the separately running
//! chat backend and streamed back chunk-by-chunk as they arrive, every
//! other path is served from a static document tree.
//!
//! The relay is a pure byte pipe. It never re-frames, re-encodes, or
//! buffers the upstream body, so the frontend's stream decoder sees the
//! backend's chunking as-is and the first byte arrives as soon as the
//! backend produces it.

pub mod check;
pub mod relay;

pub use relay::{create_router, ProxyConfig};
