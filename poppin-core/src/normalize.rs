//! Response normalization.
//!
//! Text-generation providers wrap their JSON in conversational filler and
//! markdown fences. This module strips that wrapper and parses what is left
//! into event records. It never panics on adversarial input; malformed text
//! becomes a [`ParseError`] the caller can degrade past.

use serde_json::Value;

use crate::error::ParseError;
use crate::event::EventRecord;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Characters of raw text kept in parse error previews.
pub const PREVIEW_CHARS: usize = 200;

/// Records extracted from one provider answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Object entries of the array, in provider order.
    pub records: Vec<EventRecord>,
    /// Array entries that were not JSON objects and were dropped.
    pub skipped: usize,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pick the part of `raw` that should hold the JSON array.
///
/// A block fenced as ```` ```json ```` wins; otherwise the first fenced block;
/// otherwise the text unchanged.
pub fn extract_json_block(raw: &str) -> &str {
    if let Some((_, rest)) = raw.split_once(JSON_FENCE) {
        return fence_interior(rest).trim();
    }
    if let Some((_, rest)) = raw.split_once(FENCE) {
        return strip_info_string(fence_interior(rest)).trim();
    }
    raw
}

/// Extract and parse provider text into event records.
pub fn normalize(raw: &str) -> Result<NormalizedBatch, ParseError> {
    let candidate = extract_json_block(raw);

    let value: Value = serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson {
        reason: e.to_string(),
        preview: preview(raw),
    })?;

    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray {
            found: json_type_name(&value).to_string(),
        });
    };

    let mut batch = NormalizedBatch::default();
    for item in items {
        match item {
            Value::Object(fields) => batch.records.push(EventRecord::from_document(fields)),
            _ => batch.skipped += 1,
        }
    }
    Ok(batch)
}

/// First `PREVIEW_CHARS` characters of `raw`, char-boundary safe.
pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

fn fence_interior(after_open: &str) -> &str {
    after_open
        .split_once(FENCE)
        .map_or(after_open, |(interior, _)| interior)
}

// A generic fence may still carry a language tag such as "javascript" on
// its opening line.
fn strip_info_string(interior: &str) -> &str {
    match interior.split_once('\n') {
        Some((first, rest))
            if !first.trim().is_empty()
                && first.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            rest
        }
        _ => interior,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_json_fence() {
        let raw = "Sure!\n```text\nignore me\n```\n```json\n[{\"title\":\"A\"}]\n```\nEnjoy.";
        assert_eq!(extract_json_block(raw), "[{\"title\":\"A\"}]");
    }

    #[test]
    fn test_extract_generic_fence() {
        let raw = "Here you go:\n```\n[1, 2]\n```";
        assert_eq!(extract_json_block(raw), "[1, 2]");
    }

    #[test]
    fn test_extract_generic_fence_with_language_tag() {
        let raw = "```javascript\n[{\"title\":\"A\"}]\n```";
        assert_eq!(extract_json_block(raw), "[{\"title\":\"A\"}]");
    }

    #[test]
    fn test_extract_generic_fence_keeps_inline_array() {
        let raw = "```[{\"title\":\"A\"}]```";
        assert_eq!(extract_json_block(raw), "[{\"title\":\"A\"}]");
    }

    #[test]
    fn test_extract_no_fence_returns_raw() {
        let raw = "  [{\"title\":\"A\"}]  ";
        assert_eq!(extract_json_block(raw), raw);
    }

    #[test]
    fn test_extract_unterminated_fence_takes_rest() {
        let raw = "```json\n[{\"title\":\"A\"}]";
        assert_eq!(extract_json_block(raw), "[{\"title\":\"A\"}]");
    }

    #[test]
    fn test_normalize_wrapped_response() {
        let raw = r#"
    Here are the events:
    ```json
    [
        {"title": "New Year's Eve Party", "address": "Main Square", "startTime": "2025-12-31T20:00"},
        {"title": "Jazz Night", "address": "Club 1", "startTime": "2025-12-30T21:00"}
    ]
    ```
    "#;

        let batch = normalize(raw).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].title(), Some("New Year's Eve Party"));
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_normalize_plain_text_is_parse_error() {
        let err = normalize("no events found").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
    }

    #[test]
    fn test_normalize_object_is_not_an_array() {
        let err = normalize(r#"{"title": "Gig"}"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::NotAnArray {
                found: "object".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_skips_non_objects() {
        let batch = normalize(r#"[{"title": "Gig"}, "stray", 42, null]"#).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 3);
    }

    #[test]
    fn test_normalize_empty_array() {
        let batch = normalize("[]").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let raw = "ü".repeat(PREVIEW_CHARS + 50);
        assert_eq!(preview(&raw).chars().count(), PREVIEW_CHARS);
    }
}
