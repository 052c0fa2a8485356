//! Scripture-facing content detection.
//!
//! Secondary to an explicit profile declaration: conservative and
//! suggestive, never authoritative. Callers may use it to suggest enabling
//! a study profile for an unassigned conversation.

use std::collections::HashSet;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::config::OverlayRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    None,
    Soft,
    Suggest,
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detected: bool,
    pub confidence: f32,
    /// Human-readable descriptions of what fired.
    pub signals: Vec<String>,
    pub suggested_action: SuggestedAction,
}

pub struct ContentDetector {
    book_names: HashSet<String>,
    keywords: HashSet<String>,
    patterns: Vec<Regex>,
    theological_markers: HashSet<String>,
}

impl ContentDetector {
    pub fn new(rules: Arc<OverlayRules>) -> Self {
        let detection = &rules.scripture_detection;
        let lower_set = |items: &[String]| {
            items
                .iter()
                .map(|s| s.to_lowercase())
                .collect::<HashSet<_>>()
        };
        Self {
            book_names: lower_set(&detection.book_names),
            keywords: lower_set(&detection.keywords),
            patterns: detection
                .patterns
                .iter()
                .filter_map(|p| RegexBuilder::new(p).build().ok())
                .collect(),
            theological_markers: lower_set(&detection.theological_markers),
        }
    }

    pub fn detect(&self, text: &str) -> DetectionResult {
        let words: HashSet<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(ToString::to_string)
            .collect();

        let mut signals = Vec::new();

        let book_hits: Vec<&String> = words.intersection(&self.book_names).collect();
        if !book_hits.is_empty() {
            let mut names: Vec<String> = book_hits.iter().map(|s| s.to_string()).collect();
            names.sort();
            signals.push(format!("Book names: {}", names.join(", ")));
        }

        let keyword_hits: Vec<&String> = words.intersection(&self.keywords).collect();
        if !keyword_hits.is_empty() {
            let mut names: Vec<String> = keyword_hits.iter().map(|s| s.to_string()).collect();
            names.sort();
            signals.push(format!("Keywords: {}", names.join(", ")));
        }

        let mut has_reference = false;
        for pattern in &self.patterns {
            let matches: Vec<&str> = pattern.find_iter(text).map(|m| m.as_str()).collect();
            if !matches.is_empty() {
                has_reference = true;
                signals.push(format!(
                    "References: {}",
                    matches.into_iter().take(3).collect::<Vec<_>>().join(", ")
                ));
                break;
            }
        }

        let marker_hits: Vec<&String> = words.intersection(&self.theological_markers).collect();
        if !marker_hits.is_empty() {
            let mut names: Vec<String> = marker_hits.iter().map(|s| s.to_string()).collect();
            names.sort();
            signals.push(format!("Theological terms: {}", names.join(", ")));
        }

        let mut confidence: f32 = 0.0;
        if !book_hits.is_empty() {
            confidence += 0.4;
        }
        if !keyword_hits.is_empty() {
            confidence += 0.3;
        }
        if has_reference {
            confidence += 0.4;
        }
        if !marker_hits.is_empty() {
            confidence += 0.2;
        }
        let confidence = confidence.min(1.0);

        let suggested_action = if confidence >= 0.7 {
            SuggestedAction::Suggest
        } else if confidence >= 0.4 {
            SuggestedAction::Soft
        } else {
            SuggestedAction::None
        };

        DetectionResult {
            detected: confidence >= 0.3,
            confidence,
            signals,
            suggested_action,
        }
    }
}
