//! Structured Output Extractor — best-effort parsing of raw agent text.
//!
//! Nothing in here panics or returns an error: every function yields `None` when the
//! text cannot be interpreted, and the caller decides what that means.
//!
//! # Strategies
//! - `extract`: direct JSON parse, then a retry after stripping one markdown code fence.
//! - `extract_lenient`: `extract`, then the first balanced JSON object/array anywhere in
//!   the text. Used only for the last-chance fallback once the retry loop is exhausted.
//! - `extract_text`: fence-stripped, trimmed plain text.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parses `raw` as JSON, tolerating a single surrounding markdown code fence.
pub fn extract(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let unfenced = strip_code_fence(trimmed);
    if unfenced.len() == trimmed.len() {
        return None;
    }
    serde_json::from_str(unfenced).ok()
}

/// `extract` followed by deserialization into `T`.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Option<T> {
    extract(raw).and_then(|v| serde_json::from_value(v).ok())
}

/// Like `extract`, but also finds JSON embedded in surrounding prose.
pub fn extract_lenient(raw: &str) -> Option<Value> {
    extract(raw).or_else(|| {
        let span = find_json_span(raw)?;
        serde_json::from_str(span).ok()
    })
}

/// `extract_lenient` followed by deserialization into `T`.
pub fn extract_lenient_as<T: DeserializeOwned>(raw: &str) -> Option<T> {
    extract_lenient(raw).and_then(|v| serde_json::from_value(v).ok())
}

/// Plain text output: fence stripped and trimmed. Empty output is `None`.
pub fn extract_text(raw: &str) -> Option<String> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Strips one leading/trailing markdown code fence, with or without a language tag.
///
/// Handles both ```` ```json\n{..}\n``` ```` and the single-line ```` ```json {..}``` ````.
/// Text without a leading fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };

    let body = match body.find('\n') {
        Some(idx) if is_language_tag(&body[..idx]) => &body[idx + 1..],
        _ => strip_inline_tag(body),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+')
}

/// Drops a `json` tag glued to content on the fence line, e.g. ```` ```json{"a":1}``` ````.
fn strip_inline_tag(body: &str) -> &str {
    match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &body[4..],
        _ => body,
    }
}

/// Returns the first balanced `{...}` or `[...]` span, ignoring brackets inside strings.
fn find_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
