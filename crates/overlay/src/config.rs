//! Overlay constraint configuration, loaded from YAML with built-in
//! defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// A framework whose use in answers must be disclosed.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FrameworkInfo {
    pub id: String,
    pub name: String,
    pub origin: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScriptureDetection {
    pub book_names: Vec<String>,
    pub keywords: Vec<String>,
    /// Verse-reference regex patterns.
    pub patterns: Vec<String>,
    pub theological_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayRules {
    pub frameworks_requiring_disclosure: Vec<FrameworkInfo>,
    pub scripture_detection: ScriptureDetection,
}

impl Default for OverlayRules {
    fn default() -> Self {
        let framework = |id: &str, name: &str, origin: &str| FrameworkInfo {
            id: id.to_string(),
            name: name.to_string(),
            origin: origin.to_string(),
        };
        let to_strings = |items: &[&str]| items.iter().map(ToString::to_string).collect();

        Self {
            frameworks_requiring_disclosure: vec![
                framework(
                    "moral_ceremonial_civil",
                    "Moral/ceremonial/civil division",
                    "Medieval scholasticism",
                ),
                framework(
                    "fulfilled_equals_ended",
                    "Fulfilled-means-ended",
                    "Post-Reformation",
                ),
                framework(
                    "under_law_vs_grace",
                    "Law-versus-grace antithesis",
                    "Reformation-era",
                ),
                framework(
                    "covenant_replacement",
                    "Covenant replacement",
                    "Patristic and later",
                ),
                framework(
                    "works_of_law",
                    "Works-of-the-law as Torah obedience",
                    "Reformation-era",
                ),
                framework(
                    "sabbath_categorization",
                    "Sabbath as ceremonial",
                    "Post-biblical",
                ),
                framework(
                    "dispensational_ages",
                    "Dispensational ages",
                    "19th century",
                ),
            ],
            scripture_detection: ScriptureDetection {
                book_names: to_strings(&[
                    "genesis",
                    "exodus",
                    "leviticus",
                    "numbers",
                    "deuteronomy",
                    "psalms",
                    "isaiah",
                    "jeremiah",
                    "ezekiel",
                    "daniel",
                    "matthew",
                    "mark",
                    "luke",
                    "john",
                    "acts",
                    "romans",
                    "corinthians",
                    "galatians",
                    "ephesians",
                    "hebrews",
                    "revelation",
                ]),
                keywords: to_strings(&[
                    "scripture",
                    "torah",
                    "gospel",
                    "epistle",
                    "covenant",
                    "commandment",
                    "sabbath",
                    "passover",
                ]),
                patterns: vec![r"\b[A-Z][a-z]+\s+\d+:\d+(?:-\d+)?\b".to_string()],
                theological_markers: to_strings(&[
                    "exegesis",
                    "hermeneutic",
                    "justification",
                    "sanctification",
                    "atonement",
                    "messianic",
                ]),
            },
        }
    }
}

impl OverlayRules {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading overlay rules at {}", path.as_ref().display()))?;
        serde_yaml::from_str(&raw).context("parsing overlay rules YAML")
    }

    pub fn load_or_default(path: &str) -> Self {
        if path.is_empty() || !Path::new(path).exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(rules) => rules,
            Err(error) => {
                tracing::warn!(%error, path, "failed to load overlay rules, using defaults");
                Self::default()
            }
        }
    }

    pub fn framework(&self, id: &str) -> Option<&FrameworkInfo> {
        self.frameworks_requiring_disclosure
            .iter()
            .find(|f| f.id == id)
    }
}
