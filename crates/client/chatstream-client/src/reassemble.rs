//! Chunk re-assembly with adaptive render batching
//!
//! Flushing every chunk straight to the UI causes a re-render per token.
//! The re-assembler accumulates chunk content and releases it on an
//! interval derived from what is buffered: code-dense content batches on
//! a slower cadence than prose, and a large backlog flushes sooner. The
//! interval always stays inside a bounded range.

use chatstream_core::{EventKind, NormalizedEvent};
use std::time::{Duration, Instant};

/// Bounds for the adaptive flush interval
#[derive(Debug, Clone)]
pub struct FlushTuning {
    /// Shortest allowed interval between UI flushes
    pub min_flush_interval: Duration,

    /// Longest allowed interval between UI flushes
    pub max_flush_interval: Duration,
}

impl Default for FlushTuning {
    fn default() -> Self {
        Self {
            min_flush_interval: Duration::from_millis(30),
            max_flush_interval: Duration::from_millis(250),
        }
    }
}

/// What the consumer should do with the exchange so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdate {
    /// Append this text to the rendered answer
    Delta(String),
    /// The exchange finished; this is the full answer text
    Completed(String),
    /// The exchange failed; pending content is superseded by the error
    Failed(String),
}

impl ClientUpdate {
    /// Whether this update ends the exchange
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClientUpdate::Delta(_))
    }
}

/// Accumulates chunk content between UI flushes
#[derive(Debug)]
pub struct Reassembler {
    tuning: FlushTuning,
    pending: String,
    assembled: String,
    last_flush: Instant,
}

impl Reassembler {
    /// Create a re-assembler with the given flush bounds
    pub fn new(tuning: FlushTuning) -> Self {
        Self {
            tuning,
            pending: String::new(),
            assembled: String::new(),
            last_flush: Instant::now(),
        }
    }

    /// Absorb one event. Terminal events produce an update immediately;
    /// chunk content waits for the flush cadence.
    pub fn push(&mut self, event: NormalizedEvent) -> Option<ClientUpdate> {
        match event.kind {
            EventKind::Connecting => None,
            EventKind::Chunk => {
                self.pending.push_str(&event.content);
                None
            }
            EventKind::Complete => {
                self.assembled.push_str(&self.pending);
                self.pending.clear();
                // A non-empty complete (the deadline path) carries the
                // authoritative full text; an empty one just seals what
                // was streamed.
                let full = if event.content.is_empty() {
                    std::mem::take(&mut self.assembled)
                } else {
                    self.assembled.clear();
                    event.content
                };
                Some(ClientUpdate::Completed(full))
            }
            EventKind::Error => {
                self.pending.clear();
                Some(ClientUpdate::Failed(event.content))
            }
        }
    }

    /// Pending delta if the adaptive interval has elapsed
    pub fn take_due_delta(&mut self) -> Option<ClientUpdate> {
        if self.pending.is_empty() || self.last_flush.elapsed() < self.flush_interval() {
            return None;
        }
        Some(self.flush_pending())
    }

    /// Flush whatever is pending right now, cadence aside
    pub fn flush_pending(&mut self) -> ClientUpdate {
        let delta = std::mem::take(&mut self.pending);
        self.assembled.push_str(&delta);
        self.last_flush = Instant::now();
        ClientUpdate::Delta(delta)
    }

    /// Whether content is waiting for the next flush
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Everything flushed so far plus nothing pending equals the answer
    pub fn assembled(&self) -> &str {
        &self.assembled
    }

    /// Current adaptive interval for the buffered content
    pub fn flush_interval(&self) -> Duration {
        adaptive_flush_interval(&self.pending, &self.tuning)
    }
}

/// Pick a flush interval from the buffered content.
///
/// Code-like content (fenced blocks, bracket-heavy text) renders more
/// expensively per flush, so it batches on a slower cadence; a large
/// backlog halves the interval to keep perceived latency down.
pub fn adaptive_flush_interval(pending: &str, tuning: &FlushTuning) -> Duration {
    let chars = pending.chars().count().max(1);
    let symbolic = pending
        .chars()
        .filter(|c| "{}[]();<>=`#|".contains(*c))
        .count();
    let code_like = pending.contains("```") || symbolic as f64 / chars as f64 > 0.08;

    let mut millis: u64 = if code_like { 160 } else { 60 };
    if chars > 2048 {
        millis /= 2;
    }
    Duration::from_millis(millis).clamp(tuning.min_flush_interval, tuning.max_flush_interval)
}
