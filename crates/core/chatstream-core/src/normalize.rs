//! Event normalizer
//!
//! The automation engine's event shape is not a stable contract, so this
//! module is liberal in what it accepts and strict in what it emits: any
//! line that cannot be interpreted is dropped rather than forwarded, and
//! nothing structural from upstream ever leaks to the client.

use crate::events::NormalizedEvent;
use serde_json::Value;

/// Map one decoded line onto a normalized event.
///
/// Returns `None` for lines that do not parse as JSON or do not carry
/// anything the client should see. Classification priority:
/// `begin` / `end` markers first, then a `content` field of any type,
/// then `output` / `message` fallbacks on `item` / `progress` events.
pub fn normalize(line: &str) -> Option<NormalizedEvent> {
    let value: Value = serde_json::from_str(line).ok()?;

    let event_type = value.get("type").and_then(Value::as_str);

    match event_type {
        Some("begin") => return Some(NormalizedEvent::connecting()),
        Some("end") => return Some(NormalizedEvent::complete("")),
        _ => {}
    }

    if let Some(content) = value.get("content") {
        return coerce_content(content)
            .filter(|s| !s.trim().is_empty())
            .map(NormalizedEvent::chunk);
    }

    if matches!(event_type, Some("item") | Some("progress")) {
        let fallback = value.get("output").or_else(|| value.get("message"))?;
        return coerce_content(fallback)
            .filter(|s| !s.trim().is_empty())
            .map(NormalizedEvent::chunk);
    }

    None
}

/// Coerce an arbitrary JSON value to chunk text. `null` yields nothing;
/// objects and arrays are re-serialized, primitives are stringified.
fn coerce_content(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_begin_maps_to_connecting() {
        let event = normalize(r#"{"type":"begin"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Connecting);
        assert!(event.content.is_empty());
    }

    #[test]
    fn test_end_maps_to_complete() {
        let event = normalize(r#"{"type":"end"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Complete);
        assert!(event.content.is_empty());
    }

    #[test]
    fn test_end_wins_over_content() {
        let event = normalize(r#"{"type":"end","content":"leftover"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Complete);
    }

    #[test]
    fn test_string_content() {
        let event = normalize(r#"{"content":"Hello "}"#).unwrap();
        assert_eq!(event.kind, EventKind::Chunk);
        assert_eq!(event.content, "Hello ");
    }

    #[test]
    fn test_null_content_dropped() {
        assert!(normalize(r#"{"content":null}"#).is_none());
    }

    #[test]
    fn test_blank_content_dropped() {
        assert!(normalize(r#"{"content":"   "}"#).is_none());
    }

    #[test]
    fn test_object_content_serialized() {
        let event = normalize(r#"{"content":{"answer":42}}"#).unwrap();
        assert_eq!(event.content, r#"{"answer":42}"#);
    }

    #[test]
    fn test_numeric_and_bool_content_stringified() {
        assert_eq!(normalize(r#"{"content":7}"#).unwrap().content, "7");
        assert_eq!(normalize(r#"{"content":true}"#).unwrap().content, "true");
    }

    #[test]
    fn test_item_output_fallback() {
        let event = normalize(r#"{"type":"item","output":"Hello world"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Chunk);
        assert_eq!(event.content, "Hello world");
    }

    #[test]
    fn test_progress_message_fallback() {
        let event = normalize(r#"{"type":"progress","message":"step 2 of 5"}"#).unwrap();
        assert_eq!(event.content, "step 2 of 5");
    }

    #[test]
    fn test_content_preferred_over_fallbacks() {
        let event = normalize(r#"{"type":"item","content":"main","output":"alt"}"#).unwrap();
        assert_eq!(event.content, "main");
    }

    #[test]
    fn test_output_on_unknown_type_dropped() {
        // The fallback fields only apply to item/progress events.
        assert!(normalize(r#"{"type":"debug","output":"internal"}"#).is_none());
    }

    #[test]
    fn test_invalid_json_dropped() {
        assert!(normalize("not valid json").is_none());
    }

    #[test]
    fn test_uninterpretable_shapes_dropped() {
        assert!(normalize(r#"{"type":"metrics","tokens":12}"#).is_none());
        assert!(normalize(r#"[1,2,3]"#).is_none());
        assert!(normalize(r#""just a string""#).is_none());
    }
}
