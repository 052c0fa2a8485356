//! Answer classification by provenance.
//!
//! Four tiers: deterministic (computed, exact), grounded-direct (restating
//! explicit text), grounded-contested (grounded but interpretive with live
//! disagreement), ungrounded (purely inferential).

use std::collections::HashSet;
use std::sync::Arc;

use regex::RegexBuilder;

use crate::rules::EpistemicRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerType {
    Deterministic,
    GroundedDirect,
    GroundedContested,
    Ungrounded,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Deterministic => "deterministic",
            AnswerType::GroundedDirect => "grounded_direct",
            AnswerType::GroundedContested => "grounded_contested",
            AnswerType::Ungrounded => "ungrounded",
        }
    }
}

/// Three-level contestation scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestationLevel {
    /// Nuance within one tradition.
    C1,
    /// Major traditions diverge.
    C2,
    /// Legitimate but not widely held.
    C3,
}

impl ContestationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestationLevel::C1 => "C1",
            ContestationLevel::C2 => "C2",
            ContestationLevel::C3 => "C3",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "C1" => ContestationLevel::C1,
            "C3" => ContestationLevel::C3,
            _ => ContestationLevel::C2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    pub answer_type: AnswerType,
    pub confidence: f32,
    pub has_citations: bool,
    pub citation_count: usize,
    pub sources: Vec<String>,
    pub is_contested: bool,
    pub contested_domains: Vec<String>,
    pub contestation_level: Option<ContestationLevel>,
    pub contestation_topic: Option<String>,
    pub alternative_positions: Vec<String>,
    pub reason: String,
}

impl Default for AnswerType {
    fn default() -> Self {
        AnswerType::Ungrounded
    }
}

/// Caller-supplied context for classification.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    /// "count" | "list" | "schedule" | "status" force deterministic.
    pub query_type: Option<String>,
    /// Sources the caller already attached (citations from the pipeline).
    pub sources: Vec<String>,
    pub is_deterministic: bool,
}

const DETERMINISTIC_PATTERNS: &[&str] = &[
    r"there (?:are|is) \d+",
    r"you have \d+",
    r"(?:scheduled|set) for \d",
    r"(?:reminder|task) (?:at|on) ",
    r"total[:\s]+\d+",
    r"count[:\s]+\d+",
    r"^\d+\s+(?:files?|items?|tasks?)",
];

const GROUNDED_PATTERNS: &[&str] = &[
    r"according to",
    r"the (?:text|passage|verse) (?:says|states)",
    r"in (?:verse|chapter) \d+",
    r"Paul (?:writes|says|states)",
    r"\[\d+\]",
    r"(?:source|citation|reference):",
];

const SCRIPTURE_REF: &str = r"\b(?:Genesis|Exodus|Leviticus|Numbers|Deuteronomy|Joshua|Judges|Ruth|Samuel|Kings|Chronicles|Ezra|Nehemiah|Esther|Job|Psalm|Proverbs|Ecclesiastes|Song|Isaiah|Jeremiah|Lamentations|Ezekiel|Daniel|Hosea|Joel|Amos|Obadiah|Jonah|Micah|Nahum|Habakkuk|Zephaniah|Haggai|Zechariah|Malachi|Matthew|Mark|Luke|John|Acts|Romans|Corinthians|Galatians|Ephesians|Philippians|Colossians|Thessalonians|Timothy|Titus|Philemon|Hebrews|James|Peter|Jude|Revelation)\s+\d+(?::\d+(?:-\d+)?)?";

pub struct AnswerClassifier {
    rules: Arc<EpistemicRules>,
    deterministic: Vec<regex::Regex>,
    grounded: Vec<regex::Regex>,
    scripture: regex::Regex,
}

impl AnswerClassifier {
    pub fn new(rules: Arc<EpistemicRules>) -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .unwrap_or_else(|e| panic!("invalid classifier pattern '{p}': {e}"))
                })
                .collect()
        };
        Self {
            rules,
            deterministic: compile(DETERMINISTIC_PATTERNS),
            grounded: compile(GROUNDED_PATTERNS),
            scripture: RegexBuilder::new(SCRIPTURE_REF)
                .case_insensitive(true)
                .build()
                .expect("scripture pattern compiles"),
        }
    }

    pub fn classify(&self, text: &str, context: &ClassifyContext) -> ClassificationResult {
        if self.is_deterministic(text, context) {
            return ClassificationResult {
                answer_type: AnswerType::Deterministic,
                confidence: 1.0,
                reason: "Response contains computed/exact data".to_string(),
                ..Default::default()
            };
        }

        let sources = self.grounding_sources(text, context);
        if !sources.is_empty() {
            let contested = self.check_contestation(text);
            if contested.is_contested {
                return ClassificationResult {
                    answer_type: AnswerType::GroundedContested,
                    confidence: 0.85,
                    has_citations: true,
                    citation_count: sources.len(),
                    sources,
                    is_contested: true,
                    contested_domains: contested.domains,
                    contestation_level: contested.level,
                    contestation_topic: contested.topic,
                    alternative_positions: contested.alternatives,
                    reason: "Response is grounded but addresses contested topic".to_string(),
                };
            }
            return ClassificationResult {
                answer_type: AnswerType::GroundedDirect,
                confidence: 0.9,
                has_citations: true,
                citation_count: sources.len(),
                sources,
                reason: "Response directly references source material".to_string(),
                ..Default::default()
            };
        }

        ClassificationResult {
            answer_type: AnswerType::Ungrounded,
            confidence: 0.7,
            reason: "Response is inferential without direct grounding".to_string(),
            ..Default::default()
        }
    }

    fn is_deterministic(&self, text: &str, context: &ClassifyContext) -> bool {
        if context.is_deterministic {
            return true;
        }
        if let Some(query_type) = &context.query_type {
            if matches!(query_type.as_str(), "count" | "list" | "schedule" | "status") {
                return true;
            }
        }
        self.deterministic.iter().any(|p| p.is_match(text))
    }

    fn grounding_sources(&self, text: &str, context: &ClassifyContext) -> Vec<String> {
        let mut sources: Vec<String> = context.sources.clone();

        for pattern in &self.grounded {
            for m in pattern.find_iter(text).take(5) {
                sources.push(m.as_str().to_string());
            }
        }
        for m in self.scripture.find_iter(text).take(10) {
            sources.push(m.as_str().to_string());
        }

        // Dedup preserving first occurrence.
        let mut seen = HashSet::new();
        sources.retain(|s| seen.insert(s.clone()));
        sources
    }

    fn check_contestation(&self, text: &str) -> Contested {
        let text_lower = text.to_lowercase();
        let mut result = Contested::default();

        for (domain, markers) in &self.rules.contested_markers {
            for marker in markers {
                if text_lower.contains(&marker.to_lowercase()) {
                    result.is_contested = true;
                    if !result.domains.contains(domain) {
                        result.domains.push(domain.clone());
                    }
                    if result.topic.is_none() {
                        if let Some(info) = self.rules.topic_info(marker) {
                            result.topic = Some(marker.clone());
                            result.level = Some(ContestationLevel::parse(&info.level));
                            result.alternatives = info.positions.clone();
                        }
                    }
                }
            }
        }

        if result.is_contested && result.level.is_none() {
            result.level = Some(ContestationLevel::C2);
        }
        result.domains.sort();
        result
    }
}

#[derive(Debug, Default)]
struct Contested {
    is_contested: bool,
    domains: Vec<String>,
    level: Option<ContestationLevel>,
    topic: Option<String>,
    alternatives: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AnswerClassifier {
        AnswerClassifier::new(Arc::new(EpistemicRules::default()))
    }

    #[test]
    fn counts_classify_deterministic() {
        let result = classifier().classify("There are 5 files in the project.", &Default::default());
        assert_eq!(result.answer_type, AnswerType::Deterministic);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn query_type_forces_deterministic() {
        let context = ClassifyContext {
            query_type: Some("count".to_string()),
            ..Default::default()
        };
        let result = classifier().classify("anything at all", &context);
        assert_eq!(result.answer_type, AnswerType::Deterministic);
    }

    #[test]
    fn citation_markers_classify_grounded_direct() {
        let result = classifier().classify(
            "According to [1], the covenant language here is conditional.",
            &Default::default(),
        );
        assert_eq!(result.answer_type, AnswerType::GroundedDirect);
        assert!(result.has_citations);
        assert!(result.citation_count >= 1);
    }

    #[test]
    fn scripture_reference_counts_as_grounding() {
        let result = classifier().classify(
            "Romans 8:3 addresses what the law could not do.",
            &Default::default(),
        );
        assert_eq!(result.answer_type, AnswerType::GroundedDirect);
        assert!(result.sources.iter().any(|s| s.contains("Romans")));
    }

    #[test]
    fn caller_sources_ground_plain_text() {
        let context = ClassifyContext {
            sources: vec!["notes.md".to_string()],
            ..Default::default()
        };
        let result = classifier().classify("A plain restatement of the material.", &context);
        assert_eq!(result.answer_type, AnswerType::GroundedDirect);
    }

    #[test]
    fn contested_marker_with_grounding_is_grounded_contested() {
        let result = classifier().classify(
            "According to [1], the moral law remains binding for believers.",
            &Default::default(),
        );
        assert_eq!(result.answer_type, AnswerType::GroundedContested);
        assert!(result.is_contested);
        assert_eq!(result.contestation_level, Some(ContestationLevel::C2));
        assert_eq!(result.contestation_topic.as_deref(), Some("moral law"));
        assert!(!result.alternative_positions.is_empty());
        assert!(result.contested_domains.contains(&"law_and_grace".to_string()));
    }

    #[test]
    fn plain_inference_is_ungrounded() {
        let result = classifier().classify(
            "I think this framework generally works well for most teams.",
            &Default::default(),
        );
        assert_eq!(result.answer_type, AnswerType::Ungrounded);
    }
}
