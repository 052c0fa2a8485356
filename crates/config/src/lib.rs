//! Startup configuration.
//!
//! One TOML file covers the whole core; every section has defaults so a
//! missing file yields a usable config. Provider API keys are taken from the
//! environment when not set in the file. The per-role provider/model table
//! can additionally be loaded from a `modes.json`-shaped file.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Credentials and endpoints for one cloud provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub xai: ProviderCredentials,
    pub anthropic: ProviderCredentials,
    pub openai: ProviderCredentials,
    pub ollama_base_url: String,
    pub ollama_model: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            xai: ProviderCredentials::default(),
            anthropic: ProviderCredentials::default(),
            openai: ProviderCredentials::default(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.1:8b".to_string(),
        }
    }
}

/// One role's provider assignment, optionally pinning a model.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoleAssignment {
    pub provider: String,
    pub model: Option<String>,
}

/// Role → provider/model table, `modes.json`-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    pub roles: HashMap<String, RoleAssignment>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        let mut roles = HashMap::new();
        for (role, provider) in [
            ("researcher", "xai"),
            ("writer", "xai"),
            ("engineer", "anthropic"),
            ("archivist", "anthropic"),
            ("planner", "anthropic"),
            ("classifier", "ollama"),
        ] {
            roles.insert(
                role.to_string(),
                RoleAssignment {
                    provider: provider.to_string(),
                    model: None,
                },
            );
        }
        Self { roles }
    }
}

impl RolesConfig {
    /// Load assignments from a `modes.json`-shaped file:
    /// `{ "researcher": {"provider": "xai", "model": "..."}, ... }`.
    /// Unknown roles are kept; missing roles keep their defaults.
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raw = fs::read_to_string(path)?;
        let overrides: HashMap<String, RoleAssignment> = serde_json::from_str(&raw)?;
        for (role, assignment) in overrides {
            self.roles.insert(role, assignment);
        }
        Ok(())
    }

    pub fn assignment(&self, role: &str) -> Option<&RoleAssignment> {
        self.roles.get(role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum core-tier memories per user.
    pub core_cap: usize,
    /// Maximum memories injected into one turn.
    pub max_context_memories: usize,
    pub max_long_term_memories: usize,
    pub max_episodic_memories: usize,
    pub long_term_threshold: f32,
    pub episodic_threshold: f32,
    pub episodic_half_life_days: f32,
    pub long_term_half_life_days: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            core_cap: 10,
            max_context_memories: 15,
            max_long_term_memories: 8,
            max_episodic_memories: 3,
            long_term_threshold: 0.20,
            episodic_threshold: 0.15,
            episodic_half_life_days: 14.0,
            long_term_half_life_days: 180.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// LRU capacity for classification results.
    pub cache_capacity: usize,
    /// Local model used for classification.
    pub model: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 500,
            model: "phi3:mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EpistemicConfig {
    /// Path to the epistemic rules YAML; built-in defaults when empty.
    pub rules_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OverlayConfig {
    /// Directory of profile YAML files.
    pub profiles_dir: String,
    /// Path to the overlay constraint YAML.
    pub constraints_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub roles: RolesConfig,
    pub memory: MemoryConfig,
    pub classifier: ClassifierConfig,
    pub epistemic: EpistemicConfig,
    pub overlay: OverlayConfig,
}

impl AppConfig {
    /// Load from a TOML file, falling back to defaults for anything missing,
    /// then apply environment overrides for credentials.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment credentials, no file involved.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var("XAI_API_KEY") {
            if !key.is_empty() {
                self.providers.xai.api_key = key;
            }
        }
        if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.providers.anthropic.api_key = key;
            }
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.providers.openai.api_key = key;
            }
        }
        if let Ok(url) = env::var("OLLAMA_BASE_URL") {
            if !url.is_empty() {
                self.providers.ollama_base_url = url;
            }
        }
        if let Ok(model) = env::var("OLLAMA_MODEL") {
            if !model.is_empty() {
                self.providers.ollama_model = model;
            }
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}
