//! Reviewer response parsing
//!
//! Reviewers are free-text models, so findings arrive wrapped in prose,
//! markdown fences, or both. Everything here is best-effort: absence of a
//! usable value is `None`, never an error.

use serde_json::{Map, Value};

/// Extract the findings array from a reviewer response.
///
/// Strategy order:
/// 1) The full trimmed text, when it is an array.
/// 2) A ```json fenced block, then any fenced block, when it is an array.
/// 3) The first top-level array found by scanning the text, preferring an
///    array of objects over e.g. a bracketed number in the narrative.
pub fn parse_reviewer_json(text: &str) -> Option<Value> {
    ResponseParser::find(text, Value::is_array)
}

/// Extract a JSON object (e.g. a summary) from a reviewer response.
pub fn parse_reviewer_object(text: &str) -> Option<Map<String, Value>> {
    match ResponseParser::find(text, Value::is_object)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Utilities for extracting JSON from reviewer responses.
pub struct ResponseParser;

impl ResponseParser {
    fn find(text: &str, accept: fn(&Value) -> bool) -> Option<Value> {
        let trimmed = text.trim();
        if let Ok(value) = serde_json::from_str::<Value>(trimmed)
            && accept(&value)
        {
            return Some(value);
        }

        for block in [
            Self::extract_fenced_block(trimmed, Some("json")),
            Self::extract_fenced_block(trimmed, None),
        ]
        .into_iter()
        .flatten()
        {
            if let Ok(value) = serde_json::from_str::<Value>(&block)
                && accept(&value)
            {
                return Some(value);
            }
        }

        let mut fallback = None;
        for value in Self::embedded_values(trimmed) {
            if !accept(&value) {
                continue;
            }
            if Self::is_array_of_objects(&value) || value.is_object() {
                return Some(value);
            }
            fallback.get_or_insert(value);
        }
        fallback
    }

    fn is_array_of_objects(value: &Value) -> bool {
        value
            .as_array()
            .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_object))
    }

    /// Every valid JSON object/array that starts at a `{` or `[` in `content`,
    /// in order of their starting offset.
    ///
    /// Uses `serde_json::Deserializer` to detect a valid JSON prefix.
    fn embedded_values(content: &str) -> impl Iterator<Item = Value> + '_ {
        content.char_indices().filter_map(move |(idx, ch)| {
            if ch != '{' && ch != '[' {
                return None;
            }
            let candidate = &content[idx..];
            let mut de = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
            match de.next() {
                Some(Ok(value)) => Some(value),
                _ => None,
            }
        })
    }

    /// Extract a fenced code block, optionally requiring a language tag.
    pub fn extract_fenced_block(content: &str, language: Option<&str>) -> Option<String> {
        let fence = "```";
        let mut search = content;

        loop {
            let start = search.find(fence)?;
            let after_start = &search[start + fence.len()..];

            let (lang_tag, rest) = match after_start.find('\n') {
                Some(line_end) => (
                    after_start[..line_end].trim(),
                    &after_start[line_end + 1..],
                ),
                None => return None,
            };

            if let Some(expected) = language
                && !lang_tag.eq_ignore_ascii_case(expected)
            {
                search = after_start;
                continue;
            }

            let end = rest.find(fence)?;
            return Some(rest[..end].trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array() {
        let parsed = parse_reviewer_json(r#"[{"title": "a"}]"#).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_fenced_array_with_narrative() {
        let content = r#"
Here is what I found:
```json
[
  {"title": "Hardcoded secret", "severity": "high"}
]
```
Let me know if you need more."#;
        let parsed = parse_reviewer_json(content).unwrap();
        assert_eq!(parsed[0]["severity"], "high");
    }

    #[test]
    fn test_prefers_array_of_objects_over_bracketed_number() {
        let content = r#"I reviewed [3] files. Findings: [{"title": "x"}] done"#;
        let parsed = parse_reviewer_json(content).unwrap();
        assert_eq!(parsed[0]["title"], "x");
    }

    #[test]
    fn test_empty_array_is_valid() {
        let parsed = parse_reviewer_json("No issues found: []").unwrap();
        assert!(parsed.as_array().unwrap().is_empty());
    }

    #[test]
    fn test_array_nested_in_object() {
        let parsed = parse_reviewer_json(r#"{"findings": [{"title": "y"}]}"#).unwrap();
        assert_eq!(parsed[0]["title"], "y");
    }

    #[test]
    fn test_no_array() {
        assert!(parse_reviewer_json("The code looks fine.").is_none());
        assert!(parse_reviewer_json("[unterminated, {").is_none());
    }

    #[test]
    fn test_object_extraction() {
        let content = r#"Summary: {"overview": "ok", "keyFindings": []} end"#;
        let parsed = parse_reviewer_object(content).unwrap();
        assert_eq!(parsed["overview"], "ok");
        assert!(parse_reviewer_object("[1, 2]").is_none());
    }

    #[test]
    fn test_extract_fenced_block_none() {
        assert!(ResponseParser::extract_fenced_block("no fences here", None).is_none());
    }
}
