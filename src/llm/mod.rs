//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations, built
//! once at startup by [`providers::build`]. A request goes through two
//! steps: [`LlmProvider::connect`] turns a credential into a
//! [`ProviderClient`], and [`ProviderClient::generate`] performs the call
//! and returns the provider's raw JSON payload. Payload interpretation
//! lives in [`reply`].
//!
//! Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
//! Adding a backend = new module + new variant + new match arms.

pub mod providers;
pub mod reply;

use serde_json::Value;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("client initialisation failed: {0}")]
    ClientInit(String),
    #[error("provider request failed: {0}")]
    Request(String),
    /// Non-2xx reply. `body` is the decoded error payload (JSON when
    /// parseable, otherwise the raw text; `Null` when empty).
    #[error("provider returned HTTP {status}")]
    Status { status: u16, body: Value },
}

impl ProviderError {
    /// Best-effort diagnostic detail for callers: the provider's response
    /// payload if one came back, otherwise the error message.
    pub fn detail(&self) -> Value {
        match self {
            ProviderError::Status { body, .. } if !is_blank(body) => body.clone(),
            other => {
                let msg = other.to_string();
                if msg.is_empty() {
                    Value::String("Unknown server error".into())
                } else {
                    Value::String(msg)
                }
            }
        }
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// Who produced a prior turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

/// One earlier conversational turn forwarded as context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Final prompt, brevity instruction already applied.
    pub prompt: String,
    /// System instruction; only sent together with `history`.
    pub system: Option<String>,
    /// Prior turns, oldest first. Empty unless history injection is enabled.
    pub history: Vec<Turn>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends. Cheap to clone.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Gemini(providers::gemini::GeminiProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    /// Short backend name for logs and the health endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini(_) => "gemini",
            LlmProvider::Dummy(_) => "dummy",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::Gemini(p) => p.model(),
            LlmProvider::Dummy(_) => "echo",
        }
    }

    /// Whether [`connect`](Self::connect) needs an API key.
    pub fn requires_credential(&self) -> bool {
        matches!(self, LlmProvider::Gemini(_))
    }

    /// Construct a per-request client. `api_key` is ignored by keyless
    /// backends.
    pub fn connect(&self, api_key: Option<&str>) -> Result<ProviderClient, ProviderError> {
        match self {
            LlmProvider::Gemini(p) => {
                let key = api_key.ok_or_else(|| {
                    ProviderError::ClientInit("gemini requires an API key".into())
                })?;
                p.connect(key).map(ProviderClient::Gemini)
            }
            LlmProvider::Dummy(p) => Ok(ProviderClient::Dummy(p.clone())),
        }
    }
}

/// A connected, credential-bearing client for one request.
#[derive(Debug)]
pub enum ProviderClient {
    Gemini(providers::gemini::GeminiClient),
    Dummy(providers::dummy::DummyProvider),
}

impl ProviderClient {
    /// Send `request` and return the provider's raw reply payload.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Value, ProviderError> {
        match self {
            ProviderClient::Gemini(c) => c.generate(request).await,
            ProviderClient::Dummy(p) => p.generate(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_prefers_response_payload() {
        let e = ProviderError::Status {
            status: 429,
            body: json!({"error": {"message": "quota exceeded"}}),
        };
        assert_eq!(e.detail(), json!({"error": {"message": "quota exceeded"}}));
    }

    #[test]
    fn detail_falls_back_to_message_for_empty_payload() {
        let e = ProviderError::Status { status: 502, body: Value::Null };
        assert_eq!(e.detail(), json!("provider returned HTTP 502"));
    }

    #[test]
    fn detail_uses_message_for_transport_errors() {
        let e = ProviderError::Request("connection refused".into());
        assert_eq!(e.detail(), json!("provider request failed: connection refused"));
    }

    #[test]
    fn dummy_needs_no_credential() {
        let p = LlmProvider::Dummy(providers::dummy::DummyProvider);
        assert!(!p.requires_credential());
        assert!(p.connect(None).is_ok());
    }

    #[test]
    fn gemini_without_key_fails_to_connect() {
        let cfg = crate::config::Config::test_default();
        let p = LlmProvider::Gemini(providers::gemini::GeminiProvider::new(&cfg.llm.gemini));
        assert!(p.requires_credential());
        assert!(matches!(p.connect(None), Err(ProviderError::ClientInit(_))));
    }
}
