//! The gateway callers actually use.
//!
//! Resolves a role, copies what it needs before any outgoing call (no locks
//! are held across requests), applies the retry policy, and reports which
//! provider and model served the request.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::message::{ChatMessage, ChatOptions};
use crate::registry::{LlmRole, ProviderRegistry};
use crate::retry::RetryPolicy;

/// A completed gateway call, with trace metadata.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
}

pub struct LlmGateway {
    registry: Arc<ProviderRegistry>,
    retry: RetryPolicy,
}

impl LlmGateway {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether any provider is configured.
    pub fn is_available(&self) -> bool {
        self.registry.any_configured()
    }

    /// All models across configured providers, prefixed with provider name.
    pub async fn list_models(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in ["xai", "anthropic", "openai", "ollama"] {
            let Some(provider) = self.registry.provider(name) else {
                continue;
            };
            if !provider.is_configured() {
                continue;
            }
            match provider.list_models().await {
                Ok(models) => out.extend(models.into_iter().map(|m| format!("{name}/{m}"))),
                Err(error) => warn!(provider = name, %error, "model listing failed"),
            }
        }
        out
    }

    /// Send one chat completion for a role, retrying idempotent failures.
    pub async fn chat(
        &self,
        role: LlmRole,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError> {
        let resolved = self.registry.resolve(role)?;
        let provider = resolved.provider;
        let model = resolved.model;

        let mut attempt = 0;
        loop {
            match provider.chat(messages, &model, options).await {
                Ok(response) => {
                    debug!(
                        role = role.as_str(),
                        provider = provider.name(),
                        model = %model,
                        tokens = response.tokens_used,
                        "chat completed"
                    );
                    return Ok(ChatOutcome {
                        text: response.text,
                        provider: provider.name().to_string(),
                        model,
                        tokens_used: response.tokens_used,
                    });
                }
                Err(error) => match self.retry.backoff(&error, attempt) {
                    Some(delay) => {
                        warn!(
                            role = role.as_str(),
                            provider = provider.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            %error,
                            "retrying chat call"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use sage_config::RolesConfig;

    use super::*;
    use crate::provider::{ChatResponse, Provider};

    struct FlakyProvider {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &'static str {
            "xai"
        }
        fn is_configured(&self) -> bool {
            true
        }
        fn default_model(&self) -> &str {
            "grok-test"
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
            _options: &ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(LlmError::Upstream {
                    status: 503,
                    message: "overloaded".to_string(),
                })
            } else {
                Ok(ChatResponse {
                    text: "recovered".to_string(),
                    tokens_used: 5,
                })
            }
        }
        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec![])
        }
    }

    fn gateway(fail_first: u32) -> LlmGateway {
        let registry = ProviderRegistry::with_providers(
            vec![(
                "xai",
                Arc::new(FlakyProvider {
                    calls: AtomicU32::new(0),
                    fail_first,
                }) as Arc<dyn Provider>,
            )],
            RolesConfig::default(),
        );
        LlmGateway::new(registry).with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn chat_retries_transient_failures() {
        let gateway = gateway(2);
        let outcome = gateway
            .chat(
                LlmRole::Researcher,
                &[ChatMessage::user("hi")],
                &ChatOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.text, "recovered");
        assert_eq!(outcome.provider, "xai");
        assert_eq!(outcome.model, "grok-test");
    }

    #[tokio::test]
    async fn chat_surfaces_exhausted_retries() {
        let gateway = gateway(10);
        let err = gateway
            .chat(
                LlmRole::Researcher,
                &[ChatMessage::user("hi")],
                &ChatOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Upstream { status: 503, .. }));
    }
}
