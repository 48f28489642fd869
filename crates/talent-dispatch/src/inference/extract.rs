//! Reduces free-form model output to a JSON value.
//!
//! Models routinely wrap their answer in prose or a fenced code block. The
//! extractor peels those layers off but never invents a value: when nothing
//! parses, the caller gets [`ExtractError::MalformedResponse`] with an excerpt
//! of what the model actually said.

use serde_json::Value;

/// Longest slice of raw model text carried inside an error.
pub const EXCERPT_LIMIT: usize = 500;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("model response contained no parseable JSON: {excerpt}")]
    MalformedResponse { excerpt: String },
    #[error("model response field `{field}` is invalid: {reason}")]
    Schema { field: &'static str, reason: String },
}

impl ExtractError {
    pub fn malformed(raw: &str) -> Self {
        ExtractError::MalformedResponse {
            excerpt: excerpt(raw),
        }
    }

    pub fn schema(field: &'static str, reason: impl Into<String>) -> Self {
        ExtractError::Schema {
            field,
            reason: reason.into(),
        }
    }
}

/// Parse the structured part of a model response.
pub fn extract(raw: &str) -> Result<Value, ExtractError> {
    let body = strip_code_fence(raw.trim());

    if let Some(candidate) = brace_slice(body) {
        if let Some(value) = parse_structured(candidate) {
            return Ok(value);
        }
    }

    parse_structured(body).ok_or_else(|| ExtractError::malformed(raw))
}

/// Removes an opening fence (plus language tag) and a closing fence, but only
/// when both sit at the edges of the text.
fn strip_code_fence(text: &str) -> &str {
    if !(text.starts_with(FENCE) && text.ends_with(FENCE) && text.len() >= FENCE.len() * 2) {
        return text;
    }

    let inner = &text[FENCE.len()..text.len() - FENCE.len()];
    let inner = match inner.find('\n') {
        Some(newline) if is_language_tag(&inner[..newline]) => &inner[newline + 1..],
        _ => inner,
    };
    inner.trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_structured(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn excerpt(raw: &str) -> String {
    match raw.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}
