//! Epistemic rule set, loaded from YAML with built-in defaults.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RiskyPhrases {
    pub high_risk: Vec<String>,
    pub medium_risk: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TopicContestation {
    /// "C1" | "C2" | "C3".
    pub level: String,
    pub positions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllowedAbsolute {
    pub pattern: String,
}

impl Default for AllowedAbsolute {
    fn default() -> Self {
        Self {
            pattern: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnchorSettings {
    pub fast_budget_ms: u64,
    pub deep_budget_ms: u64,
    /// Source names in priority order.
    pub sources: Vec<String>,
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self {
            fast_budget_ms: 250,
            deep_budget_ms: 800,
            sources: vec![
                "session_context".to_string(),
                "library_cache".to_string(),
                "reference_cache".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EpistemicRules {
    pub version: String,
    pub risky_phrases: RiskyPhrases,
    /// domain → marker phrases.
    pub contested_markers: HashMap<String, Vec<String>>,
    /// marker phrase → contestation mapping.
    pub topic_contestation: HashMap<String, TopicContestation>,
    pub allowed_absolutes: Vec<AllowedAbsolute>,
    pub hedge_tokens: Vec<String>,
    pub max_hedges_per_sentence: usize,
    pub anchor_settings: AnchorSettings,
}

impl Default for EpistemicRules {
    fn default() -> Self {
        let to_strings = |items: &[&str]| items.iter().map(ToString::to_string).collect();

        let mut contested_markers = HashMap::new();
        contested_markers.insert(
            "law_and_grace".to_string(),
            to_strings(&[
                "moral law",
                "ceremonial law",
                "under the law",
                "works of the law",
                "law versus grace",
            ]),
        );
        contested_markers.insert(
            "covenant".to_string(),
            to_strings(&["new covenant", "old covenant", "replacement"]),
        );
        contested_markers.insert("sabbath".to_string(), to_strings(&["sabbath"]));

        let mut topic_contestation = HashMap::new();
        topic_contestation.insert(
            "moral law".to_string(),
            TopicContestation {
                level: "C2".to_string(),
                positions: to_strings(&[
                    "The tripartite division is a useful interpretive framework",
                    "The division is post-biblical and foreign to the text",
                ]),
            },
        );
        topic_contestation.insert(
            "sabbath".to_string(),
            TopicContestation {
                level: "C2".to_string(),
                positions: to_strings(&[
                    "Sabbath observance continues",
                    "Sabbath was transferred or fulfilled",
                ]),
            },
        );

        Self {
            version: "1.0".to_string(),
            risky_phrases: RiskyPhrases {
                high_risk: to_strings(&[
                    "this proves",
                    "definitively proves",
                    "this definitively",
                    "this settles",
                    "this refutes",
                    "definitively",
                    "without question",
                    "beyond doubt",
                    "the only interpretation",
                    "clearly teaches",
                    "obviously means",
                ]),
                medium_risk: to_strings(&[
                    "definitely",
                    "certainly",
                    "undoubtedly",
                    "always",
                    "never",
                    "must be",
                    "cannot be",
                ]),
            },
            contested_markers,
            topic_contestation,
            allowed_absolutes: vec![AllowedAbsolute {
                // Arithmetic and counts may be stated flatly.
                pattern: r"\b(there (are|is)|you have|total|count)\b.*\b\d+\b".to_string(),
            }],
            hedge_tokens: to_strings(&[
                "maybe",
                "possibly",
                "perhaps",
                "might",
                "could",
                "seems",
                "appears",
                "arguably",
                "somewhat",
            ]),
            max_hedges_per_sentence: 2,
            anchor_settings: AnchorSettings::default(),
        }
    }
}

impl EpistemicRules {
    /// Load rules from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading epistemic rules at {}", path.as_ref().display()))?;
        let rules = serde_yaml::from_str(&raw).context("parsing epistemic rules YAML")?;
        Ok(rules)
    }

    /// Load rules, falling back to the built-in defaults when the path is
    /// empty or missing.
    pub fn load_or_default(path: &str) -> Self {
        if path.is_empty() || !Path::new(path).exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(rules) => rules,
            Err(error) => {
                tracing::warn!(%error, path, "failed to load epistemic rules, using defaults");
                Self::default()
            }
        }
    }

    /// Contestation mapping for a topic: exact match first, then partial in
    /// either direction.
    pub fn topic_info(&self, topic: &str) -> Option<&TopicContestation> {
        if let Some(info) = self.topic_contestation.get(topic) {
            return Some(info);
        }
        let topic_lower = topic.to_lowercase();
        self.topic_contestation.iter().find_map(|(key, value)| {
            let key_lower = key.to_lowercase();
            if key_lower.contains(&topic_lower) || topic_lower.contains(&key_lower) {
                Some(value)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_documented_budgets_and_limits() {
        let rules = EpistemicRules::default();
        assert_eq!(rules.anchor_settings.fast_budget_ms, 250);
        assert_eq!(rules.anchor_settings.deep_budget_ms, 800);
        assert_eq!(rules.max_hedges_per_sentence, 2);
        assert!(!rules.risky_phrases.high_risk.is_empty());
        assert!(!rules.hedge_tokens.is_empty());
    }

    #[test]
    fn topic_info_matches_partially() {
        let rules = EpistemicRules::default();
        assert!(rules.topic_info("moral law").is_some());
        // "the moral law question" contains the key.
        assert!(rules.topic_info("the moral law question").is_some());
        assert!(rules.topic_info("quantum chromodynamics").is_none());
    }

    #[test]
    fn yaml_overrides_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rules.yml");
        std::fs::write(
            &path,
            "max_hedges_per_sentence: 4\nrisky_phrases:\n  high_risk:\n    - \"this proves\"\n",
        )?;

        let rules = EpistemicRules::load(&path)?;
        assert_eq!(rules.max_hedges_per_sentence, 4);
        assert_eq!(rules.risky_phrases.high_risk, vec!["this proves"]);
        // Unspecified sections fall back to their serde defaults.
        assert!(rules.risky_phrases.medium_risk.is_empty());
        Ok(())
    }

    #[test]
    fn load_or_default_handles_missing_path() {
        let rules = EpistemicRules::load_or_default("/nonexistent/rules.yml");
        assert_eq!(rules.version, "1.0");
    }
}
