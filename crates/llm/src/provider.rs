use async_trait::async_trait;

use crate::error::LlmError;
use crate::message::{ChatMessage, ChatOptions};

/// A completed chat call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    /// Total tokens reported by the provider, 0 when the API omits usage.
    pub tokens_used: u32,
}

/// Narrow interface every provider implements.
///
/// Role order quirks (e.g. a system-free provider wanting system content in
/// a dedicated top-level slot) are handled inside each adapter; callers only
/// ever see role-tagged messages.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used in configuration and traces.
    fn name(&self) -> &'static str;

    /// Whether credentials/endpoint are present. This is a static check;
    /// runtime availability surfaces as a chat error.
    fn is_configured(&self) -> bool;

    /// The provider's default model when a role doesn't pin one.
    fn default_model(&self) -> &str;

    /// Send one chat completion. A single attempt; retries live in the
    /// gateway.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError>;

    /// List models this provider exposes.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}
