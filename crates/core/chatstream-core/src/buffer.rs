//! Bounded reassembly buffer
//!
//! Accumulates decoded text between chunk arrivals and enforces a hard
//! size bound. When an append would exceed the bound, recovery prefers
//! flushing whole lines, then a JSON-structural prefix, and only as a
//! last resort drops the older half of the buffer.

use tracing::warn;

/// Mutable text accumulator bounded by a maximum size
#[derive(Debug)]
pub struct ReassemblyBuffer {
    buf: String,
    max_size: usize,
    overflow_count: u64,
}

impl ReassemblyBuffer {
    /// Create a buffer bounded by `max_size` bytes
    pub fn new(max_size: usize) -> Self {
        Self {
            buf: String::new(),
            max_size,
            overflow_count: 0,
        }
    }

    /// Append text, returning any lines force-flushed by overflow recovery.
    ///
    /// The buffer never exceeds `max_size` once this returns.
    pub fn append(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);
        if self.buf.len() <= self.max_size {
            return Vec::new();
        }
        self.recover_from_overflow()
    }

    /// Extract every complete (`\n`-terminated) line, leaving the trailing
    /// partial line in place. Blank lines are skipped.
    pub fn extract_complete_lines(&mut self) -> Vec<String> {
        match self.buf.rfind('\n') {
            Some(nl) => {
                let rest = self.buf.split_off(nl + 1);
                let prefix = std::mem::replace(&mut self.buf, rest);
                prefix
                    .split('\n')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Current buffered content
    pub fn content(&self) -> &str {
        &self.buf
    }

    /// Discard all buffered content
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Buffered length in bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// How many overflow recoveries have run (diagnostic only)
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Shrink the buffer back under the bound, salvaging well-formed
    /// records where possible. Returns the salvaged candidate lines.
    fn recover_from_overflow(&mut self) -> Vec<String> {
        let mut flushed = Vec::new();

        while self.buf.len() > self.max_size {
            self.overflow_count += 1;
            let bound = floor_char_boundary(&self.buf, self.max_size);

            // Prefer cutting at the last line break before the bound so
            // complete records are processed rather than lost.
            if let Some(nl) = self.buf[..bound].rfind('\n') {
                let rest = self.buf.split_off(nl + 1);
                let prefix = std::mem::replace(&mut self.buf, rest);
                flushed.extend(
                    prefix
                        .split('\n')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
                continue;
            }

            // No line break at all: look for a JSON-structural boundary in
            // the trailing half of the bound and flush the prefix as one
            // candidate record.
            let lo = floor_char_boundary(&self.buf, self.max_size / 2);
            if let Some(pos) = self.buf[lo..bound].rfind(['}', ']']) {
                let rest = self.buf.split_off(lo + pos + 1);
                let prefix = std::mem::replace(&mut self.buf, rest);
                let candidate = prefix.trim();
                if !candidate.is_empty() {
                    flushed.push(candidate.to_string());
                }
                continue;
            }

            // Emergency: keep only the trailing half. Bounded memory wins
            // over completeness here.
            let mut cut = floor_char_boundary(&self.buf, self.buf.len() / 2);
            if cut == 0 {
                cut = self
                    .buf
                    .chars()
                    .next()
                    .map(|c| c.len_utf8())
                    .unwrap_or(self.buf.len());
            }
            warn!(
                "BUFFER_OVERFLOW emergency truncation dropped={} retained={}",
                cut,
                self.buf.len() - cut
            );
            self.buf.drain(..cut);
        }

        flushed
    }
}

/// Largest index `<= idx` that lies on a char boundary of `s`
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
