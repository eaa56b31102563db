//! Google Generative Language (Gemini) provider.
//!
//! The API has shipped two incompatible request conventions over time:
//!
//! - [`CallConvention::Structured`]: `models/{model}:generateContent` with
//!   multi-part `contents`.
//! - [`CallConvention::Bare`]: the legacy `models/{model}:generateText`
//!   taking a single bare prompt.
//!
//! With `call_convention = "auto"` the first request probes Structured then
//! Bare and the provider remembers whichever answered; every later request
//! goes straight to it. A pinned convention never falls back.
//!
//! The API key travels in the `x-goog-api-key` header when it is a valid
//! header value, otherwise as the `key` query parameter.
//!
//! Replies are returned as raw JSON; shape decoding is the caller's job
//! (see [`crate::llm::reply`]).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::config::{ConventionPreference, GeminiConfig};
use crate::llm::{GenerateRequest, ProviderError};

const API_KEY_HEADER: &str = "x-goog-api-key";

const CONVENTION_UNKNOWN: u8 = 0;
const CONVENTION_STRUCTURED: u8 = 1;
const CONVENTION_BARE: u8 = 2;

// ── Conventions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    Structured,
    Bare,
}

impl CallConvention {
    pub fn as_str(self) -> &'static str {
        match self {
            CallConvention::Structured => "structured",
            CallConvention::Bare => "bare",
        }
    }

    fn method(self) -> &'static str {
        match self {
            CallConvention::Structured => "generateContent",
            CallConvention::Bare => "generateText",
        }
    }

    fn tag(self) -> u8 {
        match self {
            CallConvention::Structured => CONVENTION_STRUCTURED,
            CallConvention::Bare => CONVENTION_BARE,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            CONVENTION_STRUCTURED => Some(CallConvention::Structured),
            CONVENTION_BARE => Some(CallConvention::Bare),
            _ => None,
        }
    }
}

/// Where the API key is placed on the wire.
#[derive(Clone, PartialEq, Eq)]
enum Auth {
    Header,
    Query(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Header => f.write_str("Header"),
            Auth::Query(_) => f.write_str("Query(<redacted>)"),
        }
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Startup-time Gemini configuration plus the learned call convention.
///
/// Clones share the learned convention.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_base_url: String,
    api_version: String,
    model: String,
    timeout: Duration,
    preference: ConventionPreference,
    learned: Arc<AtomicU8>,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            preference: config.call_convention,
            learned: Arc::new(AtomicU8::new(CONVENTION_UNKNOWN)),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The convention every request will use, or `None` while `auto` has
    /// not yet seen a successful call.
    pub fn convention(&self) -> Option<CallConvention> {
        match self.preference {
            ConventionPreference::Structured => Some(CallConvention::Structured),
            ConventionPreference::Bare => Some(CallConvention::Bare),
            ConventionPreference::Auto => {
                CallConvention::from_tag(self.learned.load(Ordering::Acquire))
            }
        }
    }

    fn learn(&self, convention: CallConvention) {
        if self.preference != ConventionPreference::Auto {
            return;
        }
        if self
            .learned
            .compare_exchange(
                CONVENTION_UNKNOWN,
                convention.tag(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(model = %self.model, convention = convention.as_str(), "gemini call convention selected");
        }
    }

    /// Build a client carrying `api_key`.
    ///
    /// Header placement is tried first; if the key cannot be a header value
    /// or the client fails to build, a plain client with query-parameter
    /// placement is tried. Both failing is a [`ProviderError::ClientInit`].
    pub fn connect(&self, api_key: &str) -> Result<GeminiClient, ProviderError> {
        match self.header_client(api_key) {
            Ok(http) => Ok(GeminiClient { provider: self.clone(), http, auth: Auth::Header }),
            Err(header_err) => {
                warn!(error = %header_err, "gemini header-auth client failed; retrying with query-parameter auth");
                match self.plain_client() {
                    Ok(http) => Ok(GeminiClient {
                        provider: self.clone(),
                        http,
                        auth: Auth::Query(api_key.to_string()),
                    }),
                    Err(plain_err) => {
                        error!(%header_err, %plain_err, "failed to initialise gemini client");
                        Err(ProviderError::ClientInit(format!(
                            "header auth: {header_err}; query auth: {plain_err}"
                        )))
                    }
                }
            }
        }
    }

    fn header_client(&self, api_key: &str) -> Result<Client, String> {
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| format!("API key is not a valid header value: {e}"))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);

        Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))
    }

    fn plain_client(&self) -> Result<Client, String> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))
    }

    fn endpoint(&self, convention: CallConvention) -> Result<Url, ProviderError> {
        let raw = format!(
            "{}/{}/models/{}:{}",
            self.api_base_url,
            self.api_version,
            self.model,
            convention.method()
        );
        Url::parse(&raw).map_err(|e| ProviderError::Request(format!("invalid endpoint '{raw}': {e}")))
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// A credential-bearing Gemini client for a single request.
#[derive(Debug)]
pub struct GeminiClient {
    provider: GeminiProvider,
    http: Client,
    auth: Auth,
}

impl GeminiClient {
    /// Generate a reply, honouring the provider's convention selection.
    ///
    /// In `auto` mode before any success: Structured, then Bare; if both
    /// fail the Bare failure is returned.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Value, ProviderError> {
        if let Some(convention) = self.provider.convention() {
            return self.call(convention, request).await;
        }

        match self.call(CallConvention::Structured, request).await {
            Ok(payload) => {
                self.provider.learn(CallConvention::Structured);
                Ok(payload)
            }
            Err(first) => {
                warn!(error = %first, "structured generateContent failed; retrying with bare prompt");
                match self.call(CallConvention::Bare, request).await {
                    Ok(payload) => {
                        self.provider.learn(CallConvention::Bare);
                        Ok(payload)
                    }
                    Err(second) => {
                        error!(first = %first, second = %second, "generate failed for both call conventions");
                        Err(second)
                    }
                }
            }
        }
    }

    async fn call(
        &self,
        convention: CallConvention,
        request: &GenerateRequest,
    ) -> Result<Value, ProviderError> {
        let mut url = self.provider.endpoint(convention)?;
        if let Auth::Query(key) = &self.auth {
            url.query_pairs_mut().append_pair("key", key);
        }

        let builder = self.http.post(url);
        let builder = match convention {
            CallConvention::Structured => builder.json(&structured_body(request)),
            CallConvention::Bare => builder.json(&GenerateTextRequest {
                prompt: TextPrompt { text: &request.prompt },
            }),
        };

        debug!(
            model = %self.provider.model,
            convention = convention.as_str(),
            prompt_len = request.prompt.len(),
            history = request.history.len(),
            "sending gemini request"
        );

        // `without_url` keeps a query-parameter key out of logs and details.
        let response = builder.send().await.map_err(|e| {
            let e = e.without_url();
            error!(convention = convention.as_str(), error = %e, "gemini request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {}", e.without_url())))?;
        let payload = decode_body(&text);

        if !status.is_success() {
            warn!(%status, convention = convention.as_str(), "gemini returned HTTP error");
            return Err(ProviderError::Status { status: status.as_u16(), body: payload });
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            let pretty = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(response = %pretty, "full gemini response payload");
        }
        Ok(payload)
    }
}

/// JSON when it parses, otherwise the raw text; empty bodies are `Null`.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateTextRequest<'a> {
    prompt: TextPrompt<'a>,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

fn structured_body(request: &GenerateRequest) -> GenerateContentRequest<'_> {
    let mut contents: Vec<Content<'_>> = request
        .history
        .iter()
        .map(|turn| Content {
            role: Some(turn.speaker.as_str()),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();
    contents.push(Content { role: Some("user"), parts: vec![Part { text: &request.prompt }] });

    let system_instruction = if request.history.is_empty() {
        None
    } else {
        request
            .system
            .as_deref()
            .map(|text| Content { role: None, parts: vec![Part { text }] })
    };

    GenerateContentRequest { contents, system_instruction }
}
