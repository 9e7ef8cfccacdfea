//! SSE frame decoding on the receiving side
//!
//! The relay emits one JSON event per `data:` line, so frame handling
//! reduces to line reassembly (shared with the server side) plus the
//! `data:` prefix. Comment lines and unknown fields are ignored, and a
//! frame that does not parse is dropped rather than surfaced.

use chatstream_core::{LineDecoder, NormalizedEvent};
use tracing::debug;

/// Decoder from raw SSE response bytes to normalized events
#[derive(Debug)]
pub struct SseFrameDecoder {
    lines: LineDecoder,
}

impl SseFrameDecoder {
    /// Create a decoder with the given reassembly bound
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            lines: LineDecoder::new(max_buffer_size),
        }
    }

    /// Feed one chunk of the response body, returning every complete
    /// event now available
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<NormalizedEvent> {
        self.lines
            .feed(chunk)
            .iter()
            .filter_map(|line| parse_frame_line(line))
            .collect()
    }

    /// Signal end of the response body, draining any trailing frame
    pub fn finish(&mut self) -> Vec<NormalizedEvent> {
        self.lines
            .finish()
            .iter()
            .filter_map(|line| parse_frame_line(line))
            .collect()
    }
}

fn parse_frame_line(line: &str) -> Option<NormalizedEvent> {
    let payload = line.strip_prefix("data:")?.trim();
    match serde_json::from_str::<NormalizedEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("SSE_FRAME_DROP err={}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstream_core::EventKind;

    fn frame(json: &str) -> String {
        format!("data: {}\n\n", json)
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = SseFrameDecoder::new(1024 * 1024);
        let events = decoder.feed(
            frame(r#"{"content":"Hello","type":"chunk","timestamp":"2026-01-01T00:00:00Z"}"#)
                .as_bytes(),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Chunk);
        assert_eq!(events[0].content, "Hello");
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let raw = frame(r#"{"content":"Hi","type":"chunk","timestamp":"2026-01-01T00:00:00Z"}"#);
        let bytes = raw.as_bytes();
        for split in 1..bytes.len() {
            let mut decoder = SseFrameDecoder::new(1024 * 1024);
            let mut events = decoder.feed(&bytes[..split]);
            events.extend(decoder.feed(&bytes[split..]));
            assert_eq!(events.len(), 1, "split at {}", split);
            assert_eq!(events[0].content, "Hi");
        }
    }

    #[test]
    fn test_comment_and_unknown_lines_ignored() {
        let mut decoder = SseFrameDecoder::new(1024 * 1024);
        let events = decoder.feed(b": keep-alive\nevent: chunk\nretry: 500\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_unparseable_frame_dropped() {
        let mut decoder = SseFrameDecoder::new(1024 * 1024);
        let events = decoder.feed(b"data: {broken\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseFrameDecoder::new(1024 * 1024);
        let raw = format!(
            "{}{}",
            frame(r#"{"content":"a","type":"chunk","timestamp":"t"}"#),
            frame(r#"{"content":"","type":"complete","timestamp":"t"}"#)
        );
        let events = decoder.feed(raw.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Complete);
    }
}
