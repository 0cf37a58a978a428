//! Incremental JSON frame extraction.
//!
//! The server may split one message across several socket reads or pack
//! several messages into one. [`FrameParser`] buffers text across calls and
//! cuts it at every point where a top-level object closes. Scan state is kept
//! between calls, so each character is examined once.

use crate::error::TransportError;
use serde_json::Value;
use tracing::warn;

/// Splits a character stream into complete JSON objects
#[derive(Debug, Clone)]
pub struct FrameParser {
    buffer: String,
    /// Bytes of `buffer` already scanned
    scanned: usize,
    /// Start of the object being scanned, if one is open
    start: Option<usize>,
    depth: u32,
    in_string: bool,
    escape_next: bool,
    max_len: usize,
}

impl FrameParser {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: String::new(),
            scanned: 0,
            start: None,
            depth: 0,
            in_string: false,
            escape_next: false,
            max_len,
        }
    }

    /// Append a chunk and return every object it completes, in order.
    ///
    /// A complete but malformed object yields one `ProtocolParse` error and
    /// scanning carries on after it.
    pub fn feed(&mut self, chunk: &str) -> Vec<Result<Value, TransportError>> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        let bytes = self.buffer.as_bytes();
        for (i, &b) in bytes.iter().enumerate().skip(self.scanned) {
            if self.in_string {
                if self.escape_next {
                    self.escape_next = false;
                } else if b == b'\\' {
                    self.escape_next = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                // Quotes between objects are noise like anything else there
                b'"' if self.start.is_some() => self.in_string = true,
                b'{' => {
                    if self.depth == 0 {
                        self.start = Some(i);
                    }
                    self.depth += 1;
                }
                // A stray '}' between objects closes nothing
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if let (0, Some(start)) = (self.depth, self.start) {
                        let span = &self.buffer[start..=i];
                        frames.push(serde_json::from_str(span).map_err(|e| {
                            warn!("Skipping malformed frame: {}", e);
                            TransportError::from(e)
                        }));
                        self.start = None;
                    }
                }
                _ => {}
            }
        }

        // Keep only the unfinished object, if any
        let keep_from = self.start.unwrap_or(self.buffer.len());
        self.buffer.drain(..keep_from);
        self.start = self.start.map(|_| 0);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_len {
            warn!(len = self.buffer.len(), "Frame buffer too large, clearing");
            self.reset();
            frames.push(Err(TransportError::BufferOverflow {
                limit: self.max_len,
            }));
        }

        frames
    }

    /// Drop buffered text and scan state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.start = None;
        self.depth = 0;
        self.in_string = false;
        self.escape_next = false;
    }

    /// Characters waiting for the rest of their object
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(10_000)
    }
}
