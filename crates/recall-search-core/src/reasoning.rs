//! Boundary to the external reasoning (chat-completion) service.
//!
//! The query expander is the only caller. Every failure mode is a
//! [`ReasoningError`] variant so callers can log precisely what went wrong
//! before degrading to "no expansion".

use async_trait::async_trait;

/// Failure taxonomy for a reasoning call.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("reasoning service unreachable: {0}")]
    Network(String),

    #[error("reasoning service rate limited the request")]
    RateLimited,

    #[error("reasoning service rejected the credentials")]
    Unauthorized,

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("reasoning service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("reasoning provider is disabled")]
    Disabled,
}

/// A chat-completion style reasoning service.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Identifier for logs (e.g. `"openai:gpt-4o-mini"`).
    fn name(&self) -> &str;

    /// Complete `user_prompt` under `system_prompt`, returning the raw text.
    async fn complete(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        temperature: f32,
    ) -> Result<String, ReasoningError>;
}
