//! Study-profile definitions.
//!
//! Profiles are YAML files in a configured directory. A profile adds
//! observational questions and evidence weighting to the system prompt; it
//! never prescribes conclusions.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WeightRule {
    pub description: String,
    pub weight: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct QuestionPrompt {
    pub trigger: String,
    pub question: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub version: String,
    pub principle: String,
    /// Keyed map so prompt rendering is stable across loads.
    pub weighting: BTreeMap<String, WeightRule>,
    pub question_prompts: Vec<QuestionPrompt>,
}

/// Loads profiles from a directory, caching parsed definitions.
pub struct ProfileLibrary {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Option<Profile>>>,
}

impl ProfileLibrary {
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: PathBuf::from(dir.into()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load one profile by id (`<id>.yml` in the profiles directory).
    pub fn load(&self, profile_id: &str) -> Option<Profile> {
        if let Some(cached) = self.cache.lock().unwrap().get(profile_id) {
            return cached.clone();
        }

        let path = self.dir.join(format!("{profile_id}.yml"));
        let loaded = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_yaml::from_str::<Profile>(&raw) {
                Ok(mut profile) => {
                    if profile.id.is_empty() {
                        profile.id = profile_id.to_string();
                    }
                    Some(profile)
                }
                Err(error) => {
                    warn!(%error, profile_id, "failed to parse profile YAML");
                    None
                }
            });

        self.cache
            .lock()
            .unwrap()
            .insert(profile_id.to_string(), loaded.clone());
        loaded
    }

    /// Metadata for every profile in the directory.
    pub fn available(&self) -> Vec<Profile> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".yml").map(ToString::to_string)
            })
            .collect();
        ids.sort();
        ids.iter().filter_map(|id| self.load(id)).collect()
    }
}

/// Render a profile as a system prompt addition.
pub fn prompt_addition(profile: &Profile) -> String {
    let mut sections = Vec::new();

    let name = if profile.display_name.is_empty() {
        &profile.id
    } else {
        &profile.display_name
    };
    sections.push(format!("## Active Profile: {name}"));

    if !profile.principle.is_empty() {
        sections.push(format!("**Core Principle:** {}", profile.principle.trim()));
    }

    if !profile.weighting.is_empty() {
        let mut lines = vec!["### Evidence Weighting".to_string()];
        for (key, rule) in &profile.weighting {
            let description = if rule.description.is_empty() {
                key
            } else {
                &rule.description
            };
            lines.push(format!("- {} (weight: {})", description, rule.weight));
        }
        sections.push(lines.join("\n"));
    }

    if !profile.question_prompts.is_empty() {
        let mut lines = vec![
            "### Questions to Surface".to_string(),
            "When relevant, surface these questions (do not answer them for the user):"
                .to_string(),
        ];
        for prompt in &profile.question_prompts {
            lines.push(format!(
                "- **{}:** \"{}\"",
                prompt.trigger,
                prompt.question.trim()
            ));
        }
        sections.push(lines.join("\n"));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
id: textual_trajectory
display_name: Textual Trajectory
category: study
version: "0.2"
principle: Weight the text's own trajectory over later systematizations.
weighting:
  primary_text:
    description: Direct statements in the passage under study
    weight: high
  later_tradition:
    description: Post-biblical systematizations
    weight: low
question_prompts:
  - trigger: category claims
    question: Does the text itself use this category?
"#;

    fn library_with_sample() -> (tempfile::TempDir, ProfileLibrary) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("textual_trajectory.yml"), SAMPLE).unwrap();
        let library = ProfileLibrary::new(dir.path().to_string_lossy().to_string());
        (dir, library)
    }

    #[test]
    fn load_parses_profile_yaml() {
        let (_dir, library) = library_with_sample();
        let profile = library.load("textual_trajectory").unwrap();
        assert_eq!(profile.display_name, "Textual Trajectory");
        assert_eq!(profile.weighting.len(), 2);
        assert_eq!(profile.question_prompts.len(), 1);
    }

    #[test]
    fn missing_profile_returns_none_and_is_cached() {
        let (_dir, library) = library_with_sample();
        assert!(library.load("nope").is_none());
        assert!(library.load("nope").is_none());
    }

    #[test]
    fn available_lists_profiles_sorted() {
        let (dir, library) = library_with_sample();
        std::fs::write(
            dir.path().join("another.yml"),
            "id: another\ndisplay_name: Another\n",
        )
        .unwrap();
        let profiles = library.available();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, "another");
    }

    #[test]
    fn prompt_addition_renders_all_sections() {
        let (_dir, library) = library_with_sample();
        let profile = library.load("textual_trajectory").unwrap();
        let addition = prompt_addition(&profile);
        assert!(addition.contains("## Active Profile: Textual Trajectory"));
        assert!(addition.contains("**Core Principle:**"));
        assert!(addition.contains("Evidence Weighting"));
        assert!(addition.contains("Questions to Surface"));
        assert!(addition.contains("Does the text itself use this category?"));
    }
}
