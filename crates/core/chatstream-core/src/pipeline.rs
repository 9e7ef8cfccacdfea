//! Per-session streaming pipeline
//!
//! Composes decoder, normalizer, and publisher behind three entry
//! points: `handle_chunk`, `handle_end`, and `handle_error`. The
//! transport adapter translates raw transport events into these calls,
//! which keeps the whole pipeline transport-agnostic and testable
//! without a network.

use crate::decoder::LineDecoder;
use crate::events::EventKind;
use crate::normalize::normalize;
use crate::publish::EventPublisher;
use std::sync::Arc;
use tracing::debug;

/// State machine for one exchange, fed by the transport adapter
pub struct StreamPipeline {
    decoder: LineDecoder,
    publisher: Arc<EventPublisher>,

    /// Everything published as chunk content so far; the deadline path
    /// delivers this as a partial answer.
    assembled: String,

    /// Lines that did not normalize to anything (diagnostic only)
    dropped_lines: u64,

    /// Set once an explicit terminal event from upstream was handled
    saw_terminal: bool,
}

impl StreamPipeline {
    /// Create a pipeline publishing through `publisher`, with the given
    /// reassembly bound
    pub fn new(publisher: Arc<EventPublisher>, max_buffer_size: usize) -> Self {
        Self {
            decoder: LineDecoder::new(max_buffer_size),
            publisher,
            assembled: String::new(),
            dropped_lines: 0,
            saw_terminal: false,
        }
    }

    /// Handle one raw transport chunk. Malformed lines are dropped here
    /// and never fail the session.
    pub async fn handle_chunk(&mut self, chunk: &[u8]) {
        for line in self.decoder.feed(chunk) {
            self.process_line(&line).await;
        }
    }

    /// Handle end of the upstream stream. Drains the final partial line,
    /// then synthesizes a `complete` if upstream never sent a terminal
    /// event and nothing else closed the channel first.
    pub async fn handle_end(&mut self) {
        for line in self.decoder.finish() {
            self.process_line(&line).await;
        }
        if !self.saw_terminal {
            debug!("PIPELINE_END synthesizing complete, no terminal event from upstream");
            self.publisher.complete("").await;
            self.saw_terminal = true;
        }
    }

    /// Handle a transport failure with a user-safe message. Raw transport
    /// detail belongs in the log, not in this string.
    pub async fn handle_error(&mut self, message: impl Into<String>) {
        self.saw_terminal = true;
        self.publisher.fail(message).await;
    }

    /// Chunk content accumulated so far
    pub fn assembled(&self) -> &str {
        &self.assembled
    }

    /// Whether an explicit terminal event has been handled
    pub fn saw_terminal(&self) -> bool {
        self.saw_terminal
    }

    /// Diagnostic counters: (overflow recoveries, dropped lines)
    pub fn counters(&self) -> (u64, u64) {
        (self.decoder.overflow_count(), self.dropped_lines)
    }

    async fn process_line(&mut self, line: &str) {
        let Some(event) = normalize(line) else {
            self.dropped_lines += 1;
            return;
        };
        match event.kind {
            EventKind::Chunk => {
                self.assembled.push_str(&event.content);
                self.publisher.publish(event).await;
            }
            EventKind::Complete | EventKind::Error => {
                self.saw_terminal = true;
                self.publisher.publish(event).await;
            }
            EventKind::Connecting => {
                self.publisher.publish(event).await;
            }
        }
    }
}
