//! Application-wide error types.
//!
//! [`AppError`] covers process lifecycle (startup, transport, logging).
//! [`RelayError`] is the per-request taxonomy surfaced to HTTP callers;
//! none of its variants affect process lifetime.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single chat request.
///
/// The `Display` text is the caller-facing `error` string.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing, non-string or empty `message` field.
    #[error("Missing or invalid 'message' in request body")]
    Input,

    /// No credential source produced a value. Carries the primary source name.
    #[error("Server missing GEMINI API key (set {0})")]
    MissingCredential(String),

    /// Both client construction shapes failed.
    #[error("Failed to initialize generative AI client")]
    ClientInit(String),

    /// Both invocation shapes failed; `detail` is best-effort diagnostics.
    #[error("Failed to generate response")]
    ProviderCall { detail: Value },
}

impl RelayError {
    /// HTTP status code for this failure.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::Input => 400,
            RelayError::MissingCredential(_)
            | RelayError::ClientInit(_)
            | RelayError::ProviderCall { .. } => 500,
        }
    }

    /// Diagnostic payload, present only for provider call failures.
    pub fn detail(&self) -> Option<&Value> {
        match self {
            RelayError::ProviderCall { detail } => Some(detail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn logger_error_display() {
        let e = AppError::Logger("already initialized".into());
        assert!(e.to_string().contains("already initialized"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn input_error_is_client_error() {
        let e = RelayError::Input;
        assert_eq!(e.status(), 400);
        assert_eq!(e.to_string(), "Missing or invalid 'message' in request body");
        assert!(e.detail().is_none());
    }

    #[test]
    fn missing_credential_names_source() {
        let e = RelayError::MissingCredential("GEMINI_API_KEY".into());
        assert_eq!(e.status(), 500);
        assert_eq!(e.to_string(), "Server missing GEMINI API key (set GEMINI_API_KEY)");
    }

    #[test]
    fn client_init_hides_diagnostics() {
        let e = RelayError::ClientInit("builder exploded".into());
        assert_eq!(e.status(), 500);
        assert!(!e.to_string().contains("builder exploded"));
    }

    #[test]
    fn provider_call_carries_detail() {
        let e = RelayError::ProviderCall { detail: Value::String("quota".into()) };
        assert_eq!(e.status(), 500);
        assert_eq!(e.detail(), Some(&Value::String("quota".into())));
    }
}
