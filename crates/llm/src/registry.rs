//! Role-to-provider resolution.
//!
//! Each named role maps to a preferred provider from configuration; when the
//! preferred provider is not configured, resolution falls back through the
//! fixed preference order xai → anthropic → openai → ollama.

use std::collections::HashMap;
use std::sync::Arc;

use sage_config::{AppConfig, RolesConfig};
use tracing::debug;

use crate::error::LlmError;
use crate::provider::Provider;
use crate::providers::{AnthropicProvider, OllamaProvider, OpenAiProvider, XaiProvider};

/// Named LLM role. Each agent and the classifier select providers by role,
/// never by provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmRole {
    Researcher,
    Writer,
    Engineer,
    Archivist,
    Planner,
    Classifier,
}

impl LlmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmRole::Researcher => "researcher",
            LlmRole::Writer => "writer",
            LlmRole::Engineer => "engineer",
            LlmRole::Archivist => "archivist",
            LlmRole::Planner => "planner",
            LlmRole::Classifier => "classifier",
        }
    }
}

const FALLBACK_ORDER: &[&str] = &["xai", "anthropic", "openai", "ollama"];

/// A resolved (provider, model) pair for one call.
#[derive(Clone)]
pub struct Resolved {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Small provider registry. Lookups go through here rather than inheritance;
/// the role table lives in configuration.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn Provider>>,
    roles: RolesConfig,
}

impl ProviderRegistry {
    /// Build the standard four-provider registry from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn Provider>> = HashMap::new();
        providers.insert(
            "xai",
            Arc::new(XaiProvider::new(
                config.providers.xai.api_key.clone(),
                config.providers.xai.base_url.clone(),
            )),
        );
        providers.insert(
            "anthropic",
            Arc::new(AnthropicProvider::new(
                config.providers.anthropic.api_key.clone(),
                config.providers.anthropic.base_url.clone(),
            )),
        );
        providers.insert(
            "openai",
            Arc::new(OpenAiProvider::new(
                config.providers.openai.api_key.clone(),
                config.providers.openai.base_url.clone(),
            )),
        );
        providers.insert(
            "ollama",
            Arc::new(OllamaProvider::new(
                config.providers.ollama_base_url.clone(),
                config.providers.ollama_model.clone(),
            )),
        );

        Self {
            providers,
            roles: config.roles.clone(),
        }
    }

    /// Registry over arbitrary providers, used by tests and embedders that
    /// inject their own implementations.
    pub fn with_providers(
        providers: Vec<(&'static str, Arc<dyn Provider>)>,
        roles: RolesConfig,
    ) -> Self {
        Self {
            providers: providers.into_iter().collect(),
            roles,
        }
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve a role to a configured provider and model.
    ///
    /// The role's preferred provider wins when configured; otherwise the
    /// fallback order is walked. A role-pinned model only applies to the
    /// preferred provider; fallbacks use their own defaults.
    pub fn resolve(&self, role: LlmRole) -> Result<Resolved, LlmError> {
        let assignment = self.roles.assignment(role.as_str());

        if let Some(assignment) = assignment {
            if let Some(provider) = self.provider(&assignment.provider) {
                if provider.is_configured() {
                    let model = assignment
                        .model
                        .clone()
                        .unwrap_or_else(|| provider.default_model().to_string());
                    return Ok(Resolved { provider, model });
                }
                debug!(
                    role = role.as_str(),
                    preferred = assignment.provider,
                    "preferred provider not configured, falling back"
                );
            }
        }

        for name in FALLBACK_ORDER {
            if let Some(provider) = self.provider(name) {
                if provider.is_configured() {
                    let model = provider.default_model().to_string();
                    return Ok(Resolved { provider, model });
                }
            }
        }

        Err(LlmError::NoProvider {
            role: role.as_str().to_string(),
        })
    }

    /// Whether any provider is configured at all.
    pub fn any_configured(&self) -> bool {
        self.providers.values().any(|p| p.is_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sage_config::RoleAssignment;

    use crate::message::{ChatMessage, ChatOptions};
    use crate::provider::ChatResponse;

    struct FakeProvider {
        name: &'static str,
        configured: bool,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        fn default_model(&self) -> &str {
            "fake-default"
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
            _options: &ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                text: "ok".to_string(),
                tokens_used: 1,
            })
        }
        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["fake-default".to_string()])
        }
    }

    fn registry(xai_configured: bool, anthropic_configured: bool) -> ProviderRegistry {
        ProviderRegistry::with_providers(
            vec![
                (
                    "xai",
                    Arc::new(FakeProvider {
                        name: "xai",
                        configured: xai_configured,
                    }) as Arc<dyn Provider>,
                ),
                (
                    "anthropic",
                    Arc::new(FakeProvider {
                        name: "anthropic",
                        configured: anthropic_configured,
                    }) as Arc<dyn Provider>,
                ),
            ],
            RolesConfig::default(),
        )
    }

    #[test]
    fn resolve_prefers_configured_role_provider() {
        let registry = registry(true, true);
        let resolved = registry.resolve(LlmRole::Researcher).unwrap();
        assert_eq!(resolved.provider.name(), "xai");
    }

    #[test]
    fn resolve_falls_back_when_preferred_not_configured() {
        let registry = registry(false, true);
        let resolved = registry.resolve(LlmRole::Researcher).unwrap();
        assert_eq!(resolved.provider.name(), "anthropic");
        // Fallback uses the provider's own default model.
        assert_eq!(resolved.model, "fake-default");
    }

    #[test]
    fn resolve_errors_when_nothing_configured() {
        let registry = registry(false, false);
        let err = registry.resolve(LlmRole::Writer).unwrap_err();
        assert!(matches!(err, LlmError::NoProvider { .. }));
    }

    #[test]
    fn pinned_model_applies_to_preferred_provider() {
        let mut roles = RolesConfig::default();
        roles.roles.insert(
            "writer".to_string(),
            RoleAssignment {
                provider: "xai".to_string(),
                model: Some("grok-pinned".to_string()),
            },
        );
        let registry = ProviderRegistry::with_providers(
            vec![(
                "xai",
                Arc::new(FakeProvider {
                    name: "xai",
                    configured: true,
                }) as Arc<dyn Provider>,
            )],
            roles,
        );
        let resolved = registry.resolve(LlmRole::Writer).unwrap();
        assert_eq!(resolved.model, "grok-pinned");
    }
}
