//! Provider credential resolution.
//!
//! Sources are consulted in order on every request; the first non-empty
//! value wins. Nothing is cached, so rotating an env var takes effect on
//! the next request.

use std::env;
use std::fmt;

/// Name reported in errors when no env source is configured.
const FALLBACK_SOURCE_NAME: &str = "GEMINI_API_KEY";

#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Environment variable by name.
    Env(String),
    /// Inline value (embedding and tests).
    Literal(String),
}

impl CredentialSource {
    fn read(&self) -> Option<String> {
        match self {
            CredentialSource::Env(name) => env::var(name).ok(),
            CredentialSource::Literal(value) => Some(value.clone()),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Env(name) => f.debug_tuple("Env").field(name).finish(),
            CredentialSource::Literal(_) => f.write_str("Literal(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    sources: Vec<CredentialSource>,
}

impl CredentialSources {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self { sources }
    }

    /// Env sources in the given priority order.
    pub fn from_env_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| CredentialSource::Env(n.as_ref().to_string()))
                .collect(),
        )
    }

    /// First non-empty value, or `None`.
    pub fn resolve(&self) -> Option<String> {
        self.sources
            .iter()
            .filter_map(CredentialSource::read)
            .find(|v| !v.is_empty())
    }

    /// The highest-priority env variable name, for operator-facing errors.
    pub fn primary_name(&self) -> &str {
        self.sources
            .iter()
            .find_map(|s| match s {
                CredentialSource::Env(name) => Some(name.as_str()),
                CredentialSource::Literal(_) => None,
            })
            .unwrap_or(FALLBACK_SOURCE_NAME)
    }
}
