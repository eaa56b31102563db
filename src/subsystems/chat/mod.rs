//! Chat subsystem: the request → provider → reply relay.
//!
//! [`ChatRelay::handle`] records the user's message in its session
//! transcript, resolves a credential, calls the provider with the brevity
//! instruction prepended, decodes and sanitises the reply, and records
//! that too. Any failure after validation leaves the user entry in place
//! without an assistant entry.

pub mod credential;
pub mod sanitize;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ChatConfig;
use crate::error::RelayError;
use crate::llm::reply::ProviderReply;
use crate::llm::{GenerateRequest, LlmProvider};
use crate::subsystems::memory::{DEFAULT_SESSION, Role, SessionManager};

use credential::CredentialSources;
use sanitize::sanitize;

// ── Request ───────────────────────────────────────────────────────────────────

/// A validated chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

impl ChatRequest {
    /// Validate `message` (non-empty). `session_id` falls back to
    /// [`DEFAULT_SESSION`] when absent or empty.
    pub fn new(message: impl Into<String>, session_id: Option<&str>) -> Result<Self, RelayError> {
        let message = message.into();
        if message.is_empty() {
            return Err(RelayError::Input);
        }
        let session_id = session_id
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION)
            .to_string();
        Ok(Self { message, session_id })
    }

    /// Validate a decoded JSON body: `{ "message": string, "session_id"?: string }`.
    ///
    /// A non-string `session_id` is ignored.
    pub fn from_value(body: &Value) -> Result<Self, RelayError> {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .ok_or(RelayError::Input)?;
        let session_id = body.get("session_id").and_then(Value::as_str);
        Self::new(message, session_id)
    }

    /// Validate a raw request body. Malformed JSON is an input error.
    pub fn from_json(body: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| RelayError::Input)?;
        Self::from_value(&value)
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

pub struct ChatRelay {
    provider: LlmProvider,
    credentials: CredentialSources,
    sessions: Arc<SessionManager>,
    brevity_instruction: String,
    include_history: bool,
}

impl ChatRelay {
    pub fn new(
        provider: LlmProvider,
        credentials: CredentialSources,
        sessions: Arc<SessionManager>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            provider,
            credentials,
            sessions,
            brevity_instruction: chat.brevity_instruction.clone(),
            include_history: chat.include_history,
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Relay one message and return the sanitised reply.
    pub async fn handle(&self, request: ChatRequest) -> Result<String, RelayError> {
        let transcript = self.sessions.open(&request.session_id).await;

        // Context is captured before the new user entry so it only holds
        // earlier turns.
        let (history, system) = {
            let mut t = transcript.lock().await;
            let context = if self.include_history {
                (t.turns(), t.system_prompt().map(str::to_string))
            } else {
                (Vec::new(), None)
            };
            t.push(Role::User, request.message.as_str());
            context
        };

        let api_key = if self.provider.requires_credential() {
            match self.credentials.resolve() {
                Some(key) => Some(key),
                None => {
                    error!(source = self.credentials.primary_name(), "provider API key not found in any configured source");
                    return Err(RelayError::MissingCredential(
                        self.credentials.primary_name().to_string(),
                    ));
                }
            }
        } else {
            None
        };

        let client = self.provider.connect(api_key.as_deref()).map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "failed to initialise provider client");
            RelayError::ClientInit(e.to_string())
        })?;

        let generate = GenerateRequest {
            prompt: format!("{}{}", self.brevity_instruction, request.message),
            system,
            history,
        };

        let payload = client.generate(&generate).await.map_err(|e| {
            error!(provider = self.provider.name(), model = self.provider.model(), error = %e, "provider call failed");
            RelayError::ProviderCall { detail: e.detail() }
        })?;

        debug!(payload = %payload, "raw provider reply");

        let reply = ProviderReply::decode(&payload);
        if reply.is_fallback() {
            warn!(shape = reply.kind(), "provider reply matched no known shape");
        } else {
            debug!(shape = reply.kind(), "provider reply decoded");
        }

        let text = sanitize(&reply.into_text());
        transcript.lock().await.push(Role::Assistant, text.as_str());
        Ok(text)
    }
}
