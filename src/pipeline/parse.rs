//! Model-output parsing: find one well-formed JSON object in free text.
//!
//! ## Why is this necessary?
//!
//! Even when the prompt says "JSON ONLY, NO MARKDOWN", vision models
//! routinely wrap their answer in ```json fences, prepend "Here is the
//! result:", or append a closing pleasantry. Rather than fighting that in
//! the prompt, this module applies four cheap extraction strategies in a
//! fixed order, first success wins:
//!
//! 1. strict parse of the entire text
//! 2. fenced code block tagged `json`
//! 3. any fenced code block
//! 4. greedy brace slice — first `{` to last `}`
//!
//! Every strategy swallows its own parse errors and falls through; the
//! function returns `None` rather than erroring, and the orchestrator turns
//! `None` into the canned failure payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("static regex"));

static RE_ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*(\{.*?\})\s*```").expect("static regex"));

/// Extract the first well-formed JSON object from the model's text output.
///
/// Returns `None` when no strategy yields a parsable object. Never panics,
/// never errors: malformed model output is an expected condition here.
pub fn extract_json(text: &str) -> Option<Value> {
    // Strategy 1: the whole response is already valid JSON.
    if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
        if v.is_object() {
            return Some(v);
        }
    }

    // Strategies 2 and 3: fenced code blocks, json-tagged first.
    for re in [&*RE_JSON_FENCE, &*RE_ANY_FENCE] {
        if let Some(caps) = re.captures(text) {
            if let Ok(v) = serde_json::from_str::<Value>(&caps[1]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    // Strategy 4: greedy brace slice from the first `{` to the last `}`.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        if let Ok(v) = serde_json::from_str::<Value>(&text[start..=end]) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    None
}

/// First `max_chars` characters of `text`, cut on a character boundary.
///
/// Used to attach raw model output to failure payloads without risking a
/// panic on a multi-byte boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_parse_wins_first() {
        let v = extract_json(r#"{"success": true}"#).unwrap();
        assert_eq!(v, json!({"success": true}));
    }

    #[test]
    fn json_fenced_block_with_surrounding_prose() {
        let text = "Here is the result:\n```json\n{\"is_success\": true}\n```\nThanks!";
        let v = extract_json(text).unwrap();
        assert_eq!(v, json!({"is_success": true}));
    }

    #[test]
    fn untagged_fence_is_third_choice() {
        let text = "```\n{\"pages\": []}\n```";
        let v = extract_json(text).unwrap();
        assert_eq!(v, json!({"pages": []}));
    }

    #[test]
    fn brace_slice_catches_bare_object_in_prose() {
        let text = "The extraction yielded {\"claimed_total\": 450.0} overall.";
        let v = extract_json(text).unwrap();
        assert_eq!(v["claimed_total"], json!(450.0));
    }

    #[test]
    fn nested_braces_survive_the_greedy_slice() {
        let text = "output: {\"data\": {\"pages\": [{\"page_no\": \"1\"}]}} done";
        let v = extract_json(text).unwrap();
        assert_eq!(v["data"]["pages"][0]["page_no"], json!("1"));
    }

    #[test]
    fn no_json_returns_none() {
        assert!(extract_json("I could not read the bill, sorry.").is_none());
        assert!(extract_json("").is_none());
    }

    #[test]
    fn broken_json_in_every_position_returns_none() {
        assert!(extract_json("```json\n{\"a\": \n```").is_none());
        assert!(extract_json("{not json}").is_none());
    }

    #[test]
    fn top_level_array_is_not_an_object() {
        assert!(extract_json("[1, 2, 3]").is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 500), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte: must not split the rupee sign.
        let s = "₹₹₹₹";
        assert_eq!(truncate_chars(s, 2), "₹₹");
    }
}
