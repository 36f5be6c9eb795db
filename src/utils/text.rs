//! Text processing utilities.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

/// Replace consecutive whitespace (spaces, tabs, newlines) with a single space
/// and trim leading/trailing whitespace.
///
/// Returns an empty string for inputs that are entirely whitespace.
pub fn normalize_whitespace(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Extract the first JSON object or array from a potentially markdown-wrapped
/// LLM response.
///
/// Tries, in order:
/// 1. ` ```json ... ``` ` fenced code block
/// 2. ` ``` ... ``` ` fenced code block
/// 3. Bare `{...}` or `[...]` delimited by the first `{`/`[` and last `}`/`]`
///
/// Returns `None` if no JSON-like content is found.
pub fn extract_json_from_response(s: &str) -> Option<&str> {
    // 1. Try ```json fenced block.
    if let Some(inner) = extract_fenced_block(s, "```json") {
        return Some(inner);
    }

    // 2. Try plain ``` fenced block.
    if let Some(inner) = extract_fenced_block(s, "```") {
        return Some(inner);
    }

    // 3. Bare JSON object.
    if let Some(start) = s.find('{') {
        if let Some(end) = s.rfind('}') {
            if end > start {
                return Some(&s[start..=end]);
            }
        }
    }

    // 4. Bare JSON array.
    if let Some(start) = s.find('[') {
        if let Some(end) = s.rfind(']') {
            if end > start {
                return Some(&s[start..=end]);
            }
        }
    }

    None
}

/// Extract content inside a fenced code block starting with `fence`.
fn extract_fenced_block<'a>(s: &'a str, fence: &str) -> Option<&'a str> {
    let start = s.find(fence)?;
    let after_fence = start + fence.len();

    // Skip to end of the opening fence line.
    let newline = s[after_fence..].find('\n')?;
    let content_start = after_fence + newline + 1;

    // Find closing ```.
    let close = s[content_start..].find("```")?;
    let content = s[content_start..content_start + close].trim();

    if content.is_empty() {
        return None;
    }

    Some(content)
}

/// Replace apostrophe-style quotes inside a string value with standard double
/// quotes, recursively over an entire JSON structure.
///
/// Extraction replies routinely quote names with `'` (Python-literal style);
/// the output graph must not carry non-standard quoting inside string values.
pub fn sanitize_quotes(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            if s.contains('\'') {
                *s = s.replace('\'', "\"");
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_quotes(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                sanitize_quotes(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- normalize_whitespace ---

    #[test]
    fn test_normalize_whitespace_basic() {
        assert_eq!(normalize_whitespace("hello   world"), "hello world");
        assert_eq!(normalize_whitespace("hello\t\tworld"), "hello world");
        assert_eq!(normalize_whitespace("hello\n\nworld"), "hello world");
        assert_eq!(normalize_whitespace("  hello  world  "), "hello world");
    }

    #[test]
    fn test_normalize_whitespace_empty() {
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace("   \t\n  "), "");
    }

    // --- extract_json_from_response ---

    #[test]
    fn test_extract_json_fenced_json() {
        let s = "Here is the result:\n```json\n{\"key\": \"value\"}\n```\nDone.";
        let result = extract_json_from_response(s);
        assert_eq!(result, Some("{\"key\": \"value\"}"));
    }

    #[test]
    fn test_extract_json_fenced_plain() {
        let s = "Result:\n```\n[1, 2, 3]\n```";
        let result = extract_json_from_response(s);
        assert_eq!(result, Some("[1, 2, 3]"));
    }

    #[test]
    fn test_extract_json_bare_object() {
        let s = "The answer is {\"foo\": 42} as shown.";
        let result = extract_json_from_response(s);
        assert_eq!(result, Some("{\"foo\": 42}"));
    }

    #[test]
    fn test_extract_json_bare_array() {
        let s = "Items: [1, 2, 3]";
        let result = extract_json_from_response(s);
        assert_eq!(result, Some("[1, 2, 3]"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json_from_response("No JSON here."), None);
        assert_eq!(extract_json_from_response(""), None);
    }

    #[test]
    fn test_extract_json_nested_braces() {
        let s = r#"{"outer": {"inner": 1}}"#;
        let result = extract_json_from_response(s);
        assert_eq!(result, Some(r#"{"outer": {"inner": 1}}"#));
    }

    // --- sanitize_quotes ---

    #[test]
    fn test_sanitize_quotes_string() {
        let mut v = json!("Einstein's theory");
        sanitize_quotes(&mut v);
        assert_eq!(v, json!("Einstein\"s theory"));
    }

    #[test]
    fn test_sanitize_quotes_nested() {
        let mut v = json!({
            "entities": [{"name": "O'Brien", "type": "Person"}],
            "relations": [["O'Brien", "Works At", "D'Arcy Ltd", ""]],
        });
        sanitize_quotes(&mut v);
        assert_eq!(v["entities"][0]["name"], "O\"Brien");
        assert_eq!(v["relations"][0][0], "O\"Brien");
        assert_eq!(v["relations"][0][2], "D\"Arcy Ltd");
    }

    #[test]
    fn test_sanitize_quotes_untouched() {
        let mut v = json!({"name": "plain", "n": 3, "flag": true});
        let before = v.clone();
        sanitize_quotes(&mut v);
        assert_eq!(v, before);
    }

    #[test]
    fn test_sanitize_quotes_preserves_non_latin() {
        let mut v = json!("河南商报");
        sanitize_quotes(&mut v);
        assert_eq!(v, json!("河南商报"));
    }
}
