//! Stream Frame Decoding
//!
//! Turns the raw response byte stream into discrete [`StreamFrame`] values.
//! Chunks arrive at arbitrary byte boundaries, so decoders buffer partial
//! input until a complete frame is recognized, emit it, and retain only the
//! unconsumed remainder.
//!
//! # Design Philosophy
//!
//! The backend's wire framing is an external contract, so it is pluggable:
//! the controller drives any [`FrameDecoder`]. Two framings are provided:
//! newline-delimited JSON ([`NdjsonDecoder`], the default) and server-sent
//! events ([`SseDecoder`]). Both share the same frame grammar: a content
//! delta, a terminal marker, or an in-band error marker.
//!
//! A decoder is finite and non-restartable. After a terminal frame or a
//! decode failure it ignores all further input. A decode failure is fatal
//! for the stream but never corrupts frames already emitted.

use thiserror::Error;

/// A decoded unit of backend output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Text to append to the in-progress assistant message
    Delta(String),
    /// Normal end of stream
    Done,
    /// In-band error reported by the backend
    Error(String),
}

impl StreamFrame {
    /// Whether this frame ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta(_))
    }
}

/// Fatal decode failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input could not be parsed as a frame
    #[error("malformed stream frame: {0}")]
    Malformed(String),
}

/// Incremental decoder from raw bytes to [`StreamFrame`]s
///
/// `feed` appends every frame completed by `chunk` to `frames`, in receipt
/// order. Frames decoded before a malformed region are still appended
/// before the error is returned. After a terminal frame or an error the
/// decoder is finished and further input is ignored.
pub trait FrameDecoder: Send {
    /// Consume one chunk of the response stream
    fn feed(&mut self, chunk: &[u8], frames: &mut Vec<StreamFrame>) -> Result<(), DecodeError>;
}

/// Parse one JSON frame object into zero or more frames
///
/// The grammar is shared by both decoders:
/// `{"delta": "text"}` appends text, `{"done": true}` ends the stream,
/// `{"error": "why"}` reports an in-band backend error. A delta and a
/// terminal flag may share one object. An object carrying none of the
/// known keys is malformed.
fn parse_frame_object(raw: &str, frames: &mut Vec<StreamFrame>) -> Result<bool, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| DecodeError::Malformed(format!("invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(DecodeError::Malformed(format!(
            "expected a frame object, got: {raw}"
        )));
    }

    let mut recognized = false;
    let mut terminal = false;

    if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
        frames.push(StreamFrame::Error(error.to_string()));
        return Ok(true);
    }

    if let Some(text) = value.get("delta").and_then(|v| v.as_str()) {
        recognized = true;
        if !text.is_empty() {
            frames.push(StreamFrame::Delta(text.to_string()));
        }
    }

    if let Some(done) = value.get("done").and_then(serde_json::Value::as_bool) {
        recognized = true;
        if done {
            frames.push(StreamFrame::Done);
            terminal = true;
        }
    }

    if !recognized {
        return Err(DecodeError::Malformed(format!(
            "unrecognized frame object: {raw}"
        )));
    }

    Ok(terminal)
}

/// Known wire framings for the backend's response stream
///
/// The exact framing is the backend's contract, so it is configuration
/// rather than a hardcoded choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFraming {
    /// Newline-delimited JSON frame objects (default)
    #[default]
    Ndjson,
    /// Server-sent events carrying JSON frame objects
    Sse,
}

impl WireFraming {
    /// Parse a framing name (`ndjson` or `sse`)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ndjson" => Some(Self::Ndjson),
            "sse" => Some(Self::Sse),
            _ => None,
        }
    }

    /// Build a fresh decoder for this framing
    #[must_use]
    pub fn decoder(&self) -> Box<dyn FrameDecoder> {
        match self {
            Self::Ndjson => Box::new(NdjsonDecoder::new()),
            Self::Sse => Box::new(SseDecoder::new()),
        }
    }
}

/// Newline-delimited JSON decoder
///
/// One frame object per line. Blank lines are skipped. Input is buffered
/// as raw bytes and only complete lines are decoded as UTF-8, so a
/// multi-byte character split across chunks reassembles before decoding.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl NdjsonDecoder {
    /// Create a fresh decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameDecoder for NdjsonDecoder {
    fn feed(&mut self, chunk: &[u8], frames: &mut Vec<StreamFrame>) -> Result<(), DecodeError> {
        if self.finished {
            return Ok(());
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = match std::str::from_utf8(&raw[..pos]) {
                Ok(text) => text.trim(),
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(DecodeError::Malformed(format!("invalid UTF-8: {e}")));
                }
            };

            if line.is_empty() {
                continue;
            }

            match parse_frame_object(line, frames) {
                Ok(terminal) => {
                    if terminal {
                        self.finished = true;
                        self.buffer.clear();
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

/// Server-sent events decoder
///
/// Recognizes `data: <json>` lines with the shared frame grammar, plus the
/// literal `data: [DONE]` terminal marker. Comment lines and other SSE
/// fields (`event:`, `id:`, `retry:`) are ignored. Like the NDJSON
/// decoder, bytes are buffered raw and only complete lines are decoded as
/// UTF-8.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    /// Create a fresh decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameDecoder for SseDecoder {
    fn feed(&mut self, chunk: &[u8], frames: &mut Vec<StreamFrame>) -> Result<(), DecodeError> {
        if self.finished {
            return Ok(());
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = match std::str::from_utf8(&raw[..pos]) {
                Ok(text) => text.trim_end_matches('\r'),
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(DecodeError::Malformed(format!("invalid UTF-8: {e}")));
                }
            };

            let Some(data) = line.strip_prefix("data:") else {
                // Blank separator lines, comments, and non-data fields
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                frames.push(StreamFrame::Done);
                self.finished = true;
                self.buffer.clear();
                return Ok(());
            }

            match parse_frame_object(data, frames) {
                Ok(terminal) => {
                    if terminal {
                        self.finished = true;
                        self.buffer.clear();
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
