//! Hermeneutic overlay.
//!
//! Optional per-conversation layer for textual-study work. Before agents
//! run, the user's question is scanned for framework assumptions and the
//! system prompt gains a challenge-the-frame directive; after the response
//! is generated, framework usage is disclosed and harmonization or
//! comfort-softening patterns are surfaced as warnings. The overlay only
//! activates for a conversation with a declared study profile; the content
//! detector can suggest one, never activate it.

pub mod config;
pub mod detector;
pub mod enforcer;
pub mod frames;
pub mod profiles;

use std::sync::Arc;

pub use config::{FrameworkInfo, OverlayRules};
pub use detector::{ContentDetector, DetectionResult, SuggestedAction};
pub use enforcer::{EnforcementResult, FrameworkUsage, OverlayEnforcer};
pub use frames::{FrameAnalyzer, FrameAssumption};
pub use profiles::{Profile, ProfileLibrary};

/// The assembled overlay: analyzer + enforcer + profile library.
pub struct HermeneuticOverlay {
    analyzer: FrameAnalyzer,
    enforcer: OverlayEnforcer,
    profiles: ProfileLibrary,
}

impl HermeneuticOverlay {
    pub fn new(rules: Arc<OverlayRules>, profiles_dir: impl Into<String>) -> Self {
        Self {
            analyzer: FrameAnalyzer::new(rules.clone()),
            enforcer: OverlayEnforcer::new(rules),
            profiles: ProfileLibrary::new(profiles_dir),
        }
    }

    pub fn profiles(&self) -> &ProfileLibrary {
        &self.profiles
    }

    /// System-prompt addition for a turn under a declared profile: the
    /// profile's own directives plus, when the question assumes a
    /// post-biblical framework, an explicit challenge-the-frame directive.
    pub fn prompt_addition(&self, question: &str, profile_id: &str) -> Option<String> {
        let profile = self.profiles.load(profile_id)?;
        let mut sections = vec![profiles::prompt_addition(&profile)];

        if let Some(challenge) = self.analyzer.challenge(question) {
            sections.push(format!(
                "## Frame Check\nChallenge the frame before answering:\n\n{challenge}"
            ));
        }

        Some(sections.join("\n\n"))
    }

    /// Post-generation enforcement: disclosure block appended when
    /// frameworks were used, warnings surfaced for the trace.
    pub fn enforce(&self, response_text: &str) -> EnforcementResult {
        self.enforcer.enforce(response_text)
    }

    /// Apply enforcement to a response, appending the disclosure block when
    /// required. Returns the (possibly extended) text and the result.
    pub fn apply(&self, response_text: &str) -> (String, EnforcementResult) {
        let result = self.enforce(response_text);
        let text = match &result.disclosure_text {
            Some(disclosure) => format!("{response_text}\n\n{disclosure}"),
            None => response_text.to_string(),
        };
        (text, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(dir: &str) -> HermeneuticOverlay {
        HermeneuticOverlay::new(Arc::new(OverlayRules::default()), dir)
    }

    #[test]
    fn prompt_addition_requires_a_known_profile() {
        let overlay = overlay("/nonexistent");
        assert!(overlay
            .prompt_addition("is the sabbath ceremonial?", "missing_profile")
            .is_none());
    }

    #[test]
    fn apply_appends_disclosure_for_framework_usage() {
        let overlay = overlay("/nonexistent");
        let (text, result) =
            overlay.apply("The moral law remains while the ceremonial law ended.");
        assert!(result.disclosure_required);
        assert!(text.contains("Frameworks used"));
        assert!(text.starts_with("The moral law remains"));
    }

    #[test]
    fn apply_leaves_clean_text_alone() {
        let overlay = overlay("/nonexistent");
        let (text, result) = overlay.apply("The passage describes a renewal ceremony.");
        assert!(!result.disclosure_required);
        assert_eq!(text, "The passage describes a renewal ceremony.");
    }
}
