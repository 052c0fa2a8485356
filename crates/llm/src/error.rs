use thiserror::Error;

/// Typed failures surfaced by the gateway. Callers decide whether to degrade.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider is configured for the requested role, and no fallback
    /// provider was configured either.
    #[error("no LLM provider configured for role '{role}'")]
    NoProvider { role: String },

    /// The call exceeded its deadline.
    #[error("LLM request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned 429. `retry_after` carries any
    /// `Retry-After` directive in seconds.
    #[error("rate limited by provider{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    /// The provider returned a non-success status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The provider's response could not be parsed.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// The request never reached the provider.
    #[error("transport error: {0}")]
    Transport(String),
}

impl LlmError {
    /// Whether this failure is safe to retry (idempotent HTTP failures only).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Transport(_)
                | LlmError::Upstream { status: 500..=599, .. }
        )
    }
}
