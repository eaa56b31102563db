//! Provider reply decoding.
//!
//! Providers (and the SDK generations behind them) disagree on where the
//! generated text lives. [`ProviderReply::decode`] tries a closed set of
//! known shapes in fixed priority order and falls back to an opaque,
//! diagnostic-only rendering of the payload.

use serde_json::Value;

/// Max characters kept when an unrecognised object is echoed back.
pub const OPAQUE_REPLY_LIMIT: usize = 2000;

/// A decoded provider reply, tagged with the shape it was found in.
///
/// Variant order is decode priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderReply {
    /// The payload itself is a string.
    Bare(String),
    /// `{ "text": "..." }`
    Text(String),
    /// `{ "output": [ { "content": [ { "text": "..." } ] } ] }`
    OutputContent(String),
    /// `{ "responses": [ { "text": "..." } ] }`
    Responses(String),
    /// `{ "candidates": [ { "content": "..." } ] }`
    CandidateContent(String),
    /// `{ "outputs": [ { "text": "..." } ] }`
    Outputs(String),
    /// `{ "response": { "text": "..." } }`
    ResponseText(String),
    /// `{ "response": "..." }`
    ResponseString(String),
    /// Native Gemini REST: `candidates[0].content.parts[*].text`, joined.
    CandidateParts(String),
    /// Legacy `generateText`: `{ "candidates": [ { "output": "..." } ] }`
    CandidateOutput(String),
    /// Unrecognised object or array, serialised and truncated.
    Opaque(String),
    /// `null`, `false` and `0` become empty; other booleans and numbers
    /// their JSON text.
    Scalar(String),
}

impl ProviderReply {
    pub fn decode(payload: &Value) -> Self {
        if let Value::String(s) = payload {
            return ProviderReply::Bare(s.clone());
        }
        if let Some(s) = payload.get("text").and_then(Value::as_str) {
            return ProviderReply::Text(s.to_string());
        }
        if let Some(s) = first(payload, "output")
            .and_then(|o| first(o, "content"))
            .and_then(|c| non_empty_str(c, "text"))
        {
            return ProviderReply::OutputContent(s.to_string());
        }
        if let Some(s) = first(payload, "responses").and_then(|r| non_empty_str(r, "text")) {
            return ProviderReply::Responses(s.to_string());
        }
        if let Some(s) = first(payload, "candidates")
            .and_then(|c| c.get("content"))
            .and_then(Value::as_str)
        {
            return ProviderReply::CandidateContent(s.to_string());
        }
        if let Some(s) = first(payload, "outputs").and_then(|o| non_empty_str(o, "text")) {
            return ProviderReply::Outputs(s.to_string());
        }
        if let Some(s) = payload.get("response").and_then(|r| non_empty_str(r, "text")) {
            return ProviderReply::ResponseText(s.to_string());
        }
        if let Some(s) = payload
            .get("response")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return ProviderReply::ResponseString(s.to_string());
        }
        if let Some(s) = candidate_parts(payload) {
            return ProviderReply::CandidateParts(s);
        }
        if let Some(s) = first(payload, "candidates").and_then(|c| non_empty_str(c, "output")) {
            return ProviderReply::CandidateOutput(s.to_string());
        }

        match payload {
            Value::Object(_) | Value::Array(_) => {
                let rendered = payload.to_string();
                ProviderReply::Opaque(truncate_chars(&rendered, OPAQUE_REPLY_LIMIT))
            }
            Value::Bool(true) => ProviderReply::Scalar("true".into()),
            Value::Number(n) if n.as_f64() != Some(0.0) => ProviderReply::Scalar(n.to_string()),
            _ => ProviderReply::Scalar(String::new()),
        }
    }

    /// Shape name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderReply::Bare(_) => "bare",
            ProviderReply::Text(_) => "text",
            ProviderReply::OutputContent(_) => "output_content",
            ProviderReply::Responses(_) => "responses",
            ProviderReply::CandidateContent(_) => "candidate_content",
            ProviderReply::Outputs(_) => "outputs",
            ProviderReply::ResponseText(_) => "response_text",
            ProviderReply::ResponseString(_) => "response_string",
            ProviderReply::CandidateParts(_) => "candidate_parts",
            ProviderReply::CandidateOutput(_) => "candidate_output",
            ProviderReply::Opaque(_) => "opaque",
            ProviderReply::Scalar(_) => "scalar",
        }
    }

    /// `true` when no known shape matched.
    pub fn is_fallback(&self) -> bool {
        matches!(self, ProviderReply::Opaque(_) | ProviderReply::Scalar(_))
    }

    pub fn into_text(self) -> String {
        match self {
            ProviderReply::Bare(s)
            | ProviderReply::Text(s)
            | ProviderReply::OutputContent(s)
            | ProviderReply::Responses(s)
            | ProviderReply::CandidateContent(s)
            | ProviderReply::Outputs(s)
            | ProviderReply::ResponseText(s)
            | ProviderReply::ResponseString(s)
            | ProviderReply::CandidateParts(s)
            | ProviderReply::CandidateOutput(s)
            | ProviderReply::Opaque(s)
            | ProviderReply::Scalar(s) => s,
        }
    }
}

/// First element of the array at `key`.
fn first<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key)?.as_array()?.first()
}

fn non_empty_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str().filter(|s| !s.is_empty())
}

fn candidate_parts(payload: &Value) -> Option<String> {
    let parts = first(payload, "candidates")?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let joined: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!joined.is_empty()).then_some(joined)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
