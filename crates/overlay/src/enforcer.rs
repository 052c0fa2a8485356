//! Post-generation enforcement.
//!
//! Checks the generated text for framework usage requiring disclosure,
//! premature-harmonization signals, and comfort-softening language. Only
//! disclosure modifies the response; the rest become trace warnings.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::config::OverlayRules;

/// A detected framework that requires disclosure.
#[derive(Debug, Clone)]
pub struct FrameworkUsage {
    pub framework_id: String,
    pub framework_name: String,
    pub origin: String,
    pub matched_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnforcementResult {
    pub passed: bool,
    pub frameworks_used: Vec<FrameworkUsage>,
    pub warnings: Vec<String>,
    pub disclosure_required: bool,
    pub disclosure_text: Option<String>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid enforcement pattern '{p}': {e}"))
        })
        .collect()
}

pub struct OverlayEnforcer {
    rules: Arc<OverlayRules>,
    framework_patterns: Vec<(&'static str, Vec<Regex>)>,
    harmonization: Vec<Regex>,
    softening: Vec<Regex>,
}

impl OverlayEnforcer {
    pub fn new(rules: Arc<OverlayRules>) -> Self {
        let framework_patterns = vec![
            (
                "moral_ceremonial_civil",
                compile(&[
                    r"moral law",
                    r"ceremonial law",
                    r"civil law",
                    r"moral[,\s]+ceremonial[,\s]+(?:and\s+)?civil",
                ]),
            ),
            (
                "fulfilled_equals_ended",
                compile(&[
                    r"fulfilled[,\s]+(?:and\s+)?(?:therefore\s+)?(?:ended|abolished|done away)",
                    r"fulfilled\s+means?\s+(?:ended|abolished|finished)",
                    r"fulfilled\s+in\s+Christ[,\s]+(?:so|therefore)",
                ]),
            ),
            (
                "covenant_replacement",
                compile(&[
                    r"church\s+(?:replaces?|replaced)\s+Israel",
                    r"new Israel",
                    r"spiritual Israel",
                    r"covenant\s+(?:replaces?|replaced|superseded?)",
                ]),
            ),
            (
                "dispensational_ages",
                compile(&[
                    r"dispensation(?:al)?\s+(?:of|age)",
                    r"age of (?:law|grace)",
                    r"church age",
                ]),
            ),
            (
                "under_law_vs_grace",
                compile(&[
                    r"law\s+(?:vs?\.?|versus|against)\s+gospel",
                    r"antithesis\s+(?:of|between)\s+law\s+and\s+gospel",
                ]),
            ),
        ];

        let harmonization = compile(&[
            r"(?:simply|obviously|clearly)\s+(?:means?|teaches?)",
            r"(?:all|most)\s+(?:scholars?|theologians?)\s+agree",
            r"the\s+(?:clear|obvious|plain)\s+(?:meaning|teaching)",
            r"(?:resolves?|solved?)\s+(?:the|this)\s+(?:tension|contradiction)",
        ]);

        let softening = compile(&[
            r"(?:but|however)[,\s]+(?:we|Christians?)\s+(?:today|now)",
            r"(?:of course|naturally)[,\s]+(?:this|that)\s+(?:doesn'?t|does not)\s+(?:mean|apply)",
            r"(?:we\s+)?(?:shouldn'?t|should not)\s+(?:take|read)\s+(?:this|that)\s+(?:too\s+)?literally",
        ]);

        Self {
            rules,
            framework_patterns,
            harmonization,
            softening,
        }
    }

    pub fn enforce(&self, text: &str) -> EnforcementResult {
        let frameworks_used = self.detect_frameworks(text);
        let mut warnings = Vec::new();

        if let Some(m) = self.harmonization.iter().find_map(|p| p.find(text)) {
            warnings.push(format!(
                "Possible premature harmonization detected: {}",
                m.as_str()
            ));
        }
        if let Some(m) = self.softening.iter().find_map(|p| p.find(text)) {
            warnings.push(format!(
                "Possible comfort-softening detected: {}",
                m.as_str()
            ));
        }

        let disclosure_required = !frameworks_used.is_empty();
        let disclosure_text = disclosure_required.then(|| build_disclosure(&frameworks_used));

        EnforcementResult {
            passed: true,
            frameworks_used,
            warnings,
            disclosure_required,
            disclosure_text,
        }
    }

    fn detect_frameworks(&self, text: &str) -> Vec<FrameworkUsage> {
        let mut found = Vec::new();
        for (id, patterns) in &self.framework_patterns {
            // One match per framework is enough.
            let Some(m) = patterns.iter().find_map(|p| p.find(text)) else {
                continue;
            };
            let info = self.rules.framework(id);
            found.push(FrameworkUsage {
                framework_id: id.to_string(),
                framework_name: info
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| id.to_string()),
                origin: info
                    .map(|f| f.origin.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                matched_text: m.as_str().to_string(),
            });
        }
        found
    }
}

fn build_disclosure(frameworks: &[FrameworkUsage]) -> String {
    let mut lines = vec!["**Frameworks used (post-biblical):**".to_string()];
    for framework in frameworks {
        lines.push(format!(
            "- {} (origin: {})",
            framework.framework_name, framework.origin
        ));
    }
    lines.join("\n")
}
