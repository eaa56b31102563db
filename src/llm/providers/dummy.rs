//! Dummy LLM provider: echoes the prompt back prefixed with `[echo]`.
//! Used for exercising the full request path without an API key.

use serde_json::Value;

use crate::llm::{GenerateRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    /// Replies with a bare string payload.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Value, ProviderError> {
        Ok(Value::String(format!("[echo] {}", request.prompt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_prefixes_echo() {
        let p = DummyProvider;
        let out = p.generate(&GenerateRequest::new("hello")).await.unwrap();
        assert_eq!(out, Value::String("[echo] hello".into()));
    }

    #[tokio::test]
    async fn generate_empty_prompt() {
        let p = DummyProvider;
        let out = p.generate(&GenerateRequest::new("")).await.unwrap();
        assert_eq!(out, Value::String("[echo] ".into()));
    }
}
