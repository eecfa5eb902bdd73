//! Recovers the JSON payload from model replies that wrap it in reasoning
//! text or code fences.

use serde_json::{Map, Value};

use crate::error::{CoreError, payload_preview};

#[derive(Debug, Clone, Copy)]
enum Delimiters {
    Array,
    Object,
}

impl Delimiters {
    fn pair(self) -> (u8, u8) {
        match self {
            Self::Array => (b'[', b']'),
            Self::Object => (b'{', b'}'),
        }
    }
}

/// Parses the single JSON array or object carried by `text`.
///
/// The whole (unfenced) text is tried first. Failing that, every `[` is tried
/// as a candidate start from the rightmost one leftwards and the first
/// balanced span that parses wins; objects are only considered when no array
/// candidate parses.
pub fn recover_json(text: &str) -> Result<Value, CoreError> {
    let content = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(value);
    }

    scan_balanced(content, Delimiters::Array)
        .or_else(|| scan_balanced(content, Delimiters::Object))
        .ok_or_else(|| CoreError::MalformedPayload {
            preview: payload_preview(content),
        })
}

/// Like [`recover_json`] but only accepts a JSON object.
pub fn recover_json_object(text: &str) -> Result<Map<String, Value>, CoreError> {
    let content = strip_code_fence(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) {
        return Ok(map);
    }

    match scan_balanced(content, Delimiters::Object) {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(CoreError::MalformedPayload {
            preview: payload_preview(content),
        }),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let mut content = text.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

fn scan_balanced(content: &str, delimiters: Delimiters) -> Option<Value> {
    let (open, close) = delimiters.pair();
    let bytes = content.as_bytes();

    let starts = bytes
        .iter()
        .enumerate()
        .filter(|(_, byte)| **byte == open)
        .map(|(index, _)| index)
        .collect::<Vec<usize>>();

    for start in starts.into_iter().rev() {
        let Some(end) = matching_close(bytes, start, open, close) else {
            continue;
        };

        // Both delimiters are ASCII, so the byte offsets are char boundaries.
        let candidate = &content[start..=end];
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
    }

    None
}

/// Delimiters inside string literals do not count towards the depth.
fn matching_close(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0_i64;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
        } else if *byte == b'"' {
            in_string = true;
        } else if *byte == open {
            depth += 1;
        } else if *byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_plain_payload_directly() {
        let value = recover_json(r#"[{"hole_id": "ZK1"}]"#).expect("plain array should parse");
        assert_eq!(value, json!([{"hole_id": "ZK1"}]));
    }

    #[test]
    fn strips_json_code_fence() {
        let text = "```json\n{\"reference_point\": \"XQ15\"}\n```";
        let value = recover_json(text).expect("fenced object should parse");
        assert_eq!(value, json!({"reference_point": "XQ15"}));
    }

    #[test]
    fn recovers_array_after_reasoning_text() {
        let text = "Let me think. The report lists [two] holes.\nAnswer:\n[{\"hole_id\": \"ZK1\"}, {\"hole_id\": \"ZK2\"}]\nDone.";
        let value = recover_json(text).expect("array after reasoning should be recovered");
        assert_eq!(value, json!([{"hole_id": "ZK1"}, {"hole_id": "ZK2"}]));
    }

    #[test]
    fn rightmost_parseable_array_wins() {
        let text = "draft: [{\"hole_id\": \"A\"}] final: [{\"hole_id\": \"B\"}]";
        let value = recover_json(text).expect("two arrays should still yield one");
        assert_eq!(value, json!([{"hole_id": "B"}]));
    }

    #[test]
    fn brackets_inside_string_values_do_not_end_the_array() {
        let text = "Reasoning first.\n[{\"hole_id\":\"ZK1\",\"location_desc\":\"XQ15 forward 50m]\"},{\"hole_id\":\"ZK2\"}]\nDone.";
        let value = recover_json(text).expect("array with bracket in a string should be recovered");
        assert_eq!(
            value,
            json!([{"hole_id": "ZK1", "location_desc": "XQ15 forward 50m]"}, {"hole_id": "ZK2"}])
        );
    }

    #[test]
    fn escaped_quotes_keep_string_tracking_in_step() {
        let text = r#"note: [{"hole_id":"ZK1","location_desc":"\"[A1\" east"}] end"#;
        let value = recover_json(text).expect("escaped quotes should not confuse the scan");
        assert_eq!(value, json!([{"hole_id": "ZK1", "location_desc": "\"[A1\" east"}]));
    }

    #[test]
    fn falls_back_to_object_when_no_array_parses() {
        let text = "reasoning [not json] ... {\"reference_point\": \"15\", \"distance\": 50}";
        let value = recover_json(text).expect("object should be recovered");
        assert_eq!(value, json!({"reference_point": "15", "distance": 50}));
    }

    #[test]
    fn empty_input_is_malformed() {
        let error = recover_json("").expect_err("empty input has no payload");
        assert!(matches!(error, CoreError::MalformedPayload { .. }));
    }

    #[test]
    fn malformed_error_preview_is_bounded() {
        let text = "x".repeat(500);
        let Err(CoreError::MalformedPayload { preview }) = recover_json(&text) else {
            panic!("expected malformed payload error");
        };
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn embedded_array_matches_direct_parse_for_any_offset() {
        let payload = r#"[{"hole_id":"ZK3","location_desc":"XQ15 forward 50m","design_params":{"design_depth":120.5}},{"hole_id":"ZK4"}]"#;
        let expected = serde_json::from_str::<Value>(payload).expect("fixture parses");

        let filler = "The model reasoned about drill holes; see table 3 (rows a-c) and notes. ";
        for prefix_len in [0_usize, 1, 37, 120, 250, 500] {
            for suffix_len in [0_usize, 13, 200, 500] {
                let prefix = filler.chars().cycle().take(prefix_len).collect::<String>();
                let suffix = filler.chars().cycle().take(suffix_len).collect::<String>();
                let text = format!("{prefix}{payload}{suffix}");
                let value = recover_json(&text).expect("embedded payload should be recovered");
                assert_eq!(value, expected, "prefix={prefix_len} suffix={suffix_len}");
            }
        }
    }

    #[test]
    fn object_recovery_ignores_nested_arrays() {
        let text = "Here you go: {\"reference_point\": \"A\", \"notes\": [1, 2]}";
        let map = recover_json_object(text).expect("object should be recovered");
        assert_eq!(map.get("reference_point"), Some(&json!("A")));
    }

    #[test]
    fn object_recovery_rejects_bare_array() {
        let error = recover_json_object("[1, 2, 3]").expect_err("array is not an object");
        assert!(matches!(error, CoreError::MalformedPayload { .. }));
    }
}
