//! Normalized client-facing events
//!
//! The upstream engine's event shape is not contractually stable, so the
//! client only ever sees this small closed set of event kinds.

use serde::{Deserialize, Serialize};

/// Kind of a normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Upstream acknowledged the request and is working
    Connecting,
    /// A fragment of answer content
    Chunk,
    /// Terminal: the exchange finished
    Complete,
    /// Terminal: the exchange failed
    Error,
}

impl EventKind {
    /// Whether this kind terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }
}

/// The unit published downstream, one per SSE frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// String payload (empty for connecting/complete)
    pub content: String,

    /// Event kind; serialized as `type` on the wire
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// RFC 3339 timestamp, assigned at emission time
    pub timestamp: String,
}

impl NormalizedEvent {
    /// Create an event, stamping it with the current time
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// A `connecting` event
    pub fn connecting() -> Self {
        Self::new(EventKind::Connecting, "")
    }

    /// A `chunk` event carrying answer content
    pub fn chunk(content: impl Into<String>) -> Self {
        Self::new(EventKind::Chunk, content)
    }

    /// A terminal `complete` event
    pub fn complete(content: impl Into<String>) -> Self {
        Self::new(EventKind::Complete, content)
    }

    /// A terminal `error` event with a user-safe message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    /// Whether this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = NormalizedEvent::chunk("Hello");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["content"], "Hello");
        assert_eq!(json["type"], "chunk");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(NormalizedEvent::complete("").is_terminal());
        assert!(NormalizedEvent::error("boom").is_terminal());
        assert!(!NormalizedEvent::connecting().is_terminal());
        assert!(!NormalizedEvent::chunk("x").is_terminal());
    }

    #[test]
    fn test_roundtrip_kind_names() {
        for (kind, name) in [
            (EventKind::Connecting, "\"connecting\""),
            (EventKind::Chunk, "\"chunk\""),
            (EventKind::Complete, "\"complete\""),
            (EventKind::Error, "\"error\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), name);
        }
    }
}
