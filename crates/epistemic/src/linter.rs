//! Confidence linting.
//!
//! Two dimensions: certainty posture versus provenance (absolutist claims
//! need backing) and clarity erosion (too many hedges in one sentence reads
//! as evasion). High-severity issues set the needs-repair flag and choose a
//! strategy.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::classifier::{AnswerType, ClassificationResult};
use crate::rules::EpistemicRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCategory {
    Certainty,
    Clarity,
}

#[derive(Debug, Clone)]
pub struct LintIssue {
    pub severity: LintSeverity,
    pub category: IssueCategory,
    pub message: String,
    /// The problematic text.
    pub text_span: String,
    /// Byte offsets into the original text.
    pub position: (usize, usize),
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Anchor,
    Rewrite,
    Clarify,
}

#[derive(Debug, Clone, Default)]
pub struct LintResult {
    pub has_issues: bool,
    pub issues: Vec<LintIssue>,
    /// 0 = appropriately uncertain, 1 = overconfident.
    pub certainty_score: f32,
    /// 1 = clear, 0 = hedged into oblivion.
    pub clarity_score: f32,
    pub needs_repair: bool,
    pub repair_strategy: Option<RepairStrategy>,
}

/// Split into sentences on terminal punctuation followed by whitespace.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let end = i + 1;
            if end >= bytes.len() || bytes[end].is_ascii_whitespace() {
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// The sentence containing a byte position.
fn sentence_at(text: &str, position: usize) -> &str {
    let start = text[..position].rfind('.').map(|i| i + 1).unwrap_or(0);
    let end = text[position..]
        .find('.')
        .map(|i| position + i + 1)
        .unwrap_or(text.len());
    text[start..end].trim()
}

pub struct ConfidenceLinter {
    rules: Arc<EpistemicRules>,
    high_risk: Vec<Regex>,
    medium_risk: Vec<Regex>,
    allowed_absolutes: Vec<Regex>,
}

impl ConfidenceLinter {
    pub fn new(rules: Arc<EpistemicRules>) -> Self {
        let compile_literals = |phrases: &[String]| {
            phrases
                .iter()
                .map(|p| {
                    RegexBuilder::new(&regex::escape(p))
                        .case_insensitive(true)
                        .build()
                        .expect("escaped literal compiles")
                })
                .collect()
        };
        let allowed_absolutes = rules
            .allowed_absolutes
            .iter()
            .filter(|a| !a.pattern.is_empty())
            .filter_map(|a| {
                RegexBuilder::new(&a.pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self {
            high_risk: compile_literals(&rules.risky_phrases.high_risk),
            medium_risk: compile_literals(&rules.risky_phrases.medium_risk),
            allowed_absolutes,
            rules,
        }
    }

    fn is_allowed_absolute(&self, sentence: &str) -> bool {
        self.allowed_absolutes.iter().any(|p| p.is_match(sentence))
    }

    pub fn lint(&self, text: &str, classification: &ClassificationResult) -> LintResult {
        let mut issues = Vec::new();
        issues.extend(self.check_certainty(text, classification));
        issues.extend(self.check_clarity(text));

        let certainty_score = certainty_score(&issues);
        let clarity_score = clarity_score(&issues, text);

        let needs_repair = issues.iter().any(|i| i.severity == LintSeverity::High);
        let repair_strategy = if needs_repair {
            Some(choose_strategy(&issues, classification))
        } else {
            None
        };

        LintResult {
            has_issues: !issues.is_empty(),
            issues,
            certainty_score,
            clarity_score,
            needs_repair,
            repair_strategy,
        }
    }

    fn check_certainty(
        &self,
        text: &str,
        classification: &ClassificationResult,
    ) -> Vec<LintIssue> {
        let mut issues = Vec::new();

        // Grounded and deterministic answers may state their claims flatly.
        let grounded = matches!(
            classification.answer_type,
            AnswerType::Deterministic | AnswerType::GroundedDirect
        );

        for pattern in &self.high_risk {
            for m in pattern.find_iter(text) {
                if grounded || self.is_allowed_absolute(sentence_at(text, m.start())) {
                    continue;
                }
                issues.push(LintIssue {
                    severity: LintSeverity::High,
                    category: IssueCategory::Certainty,
                    message: format!("Absolutist claim '{}' without grounding", m.as_str()),
                    text_span: m.as_str().to_string(),
                    position: (m.start(), m.end()),
                    suggestion: Some("Attach citation or soften claim".to_string()),
                });
            }
        }

        if classification.answer_type == AnswerType::Ungrounded {
            for pattern in &self.medium_risk {
                for m in pattern.find_iter(text) {
                    if self.is_allowed_absolute(sentence_at(text, m.start())) {
                        continue;
                    }
                    issues.push(LintIssue {
                        severity: LintSeverity::Medium,
                        category: IssueCategory::Certainty,
                        message: format!(
                            "Strong claim '{}' in ungrounded response",
                            m.as_str()
                        ),
                        text_span: m.as_str().to_string(),
                        position: (m.start(), m.end()),
                        suggestion: Some("Consider softening or adding source".to_string()),
                    });
                }
            }
        }

        issues
    }

    fn check_clarity(&self, text: &str) -> Vec<LintIssue> {
        let max_hedges = self.rules.max_hedges_per_sentence;
        let mut issues = Vec::new();

        for sentence in split_sentences(text) {
            let sentence_lower = sentence.to_lowercase();
            let hedge_count = self
                .rules
                .hedge_tokens
                .iter()
                .filter(|token| sentence_lower.contains(&token.to_lowercase()))
                .count();

            if hedge_count > max_hedges {
                let pos = text.find(sentence).unwrap_or(0);
                let span: String = sentence.chars().take(50).collect();
                issues.push(LintIssue {
                    severity: LintSeverity::Medium,
                    category: IssueCategory::Clarity,
                    message: format!(
                        "Sentence has {hedge_count} hedge tokens (max: {max_hedges})"
                    ),
                    text_span: span,
                    position: (pos, pos + sentence.len()),
                    suggestion: Some("State thesis clearly, then qualify".to_string()),
                });
            }
        }

        issues
    }
}

fn certainty_score(issues: &[LintIssue]) -> f32 {
    let high = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Certainty && i.severity == LintSeverity::High)
        .count() as f32;
    let medium = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Certainty && i.severity == LintSeverity::Medium)
        .count() as f32;
    (high * 0.3 + medium * 0.1).min(1.0)
}

fn clarity_score(issues: &[LintIssue], text: &str) -> f32 {
    let clarity_issues = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Clarity)
        .count();
    if clarity_issues == 0 {
        return 1.0;
    }
    let sentence_count = split_sentences(text).len();
    if sentence_count == 0 {
        return 1.0;
    }
    (1.0 - clarity_issues as f32 / sentence_count as f32).max(0.0)
}

fn choose_strategy(issues: &[LintIssue], classification: &ClassificationResult) -> RepairStrategy {
    let certainty = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Certainty)
        .count();
    let clarity = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Clarity)
        .count();

    if classification.answer_type == AnswerType::Ungrounded && certainty > 0 {
        return RepairStrategy::Anchor;
    }
    if classification.answer_type == AnswerType::GroundedContested {
        return RepairStrategy::Rewrite;
    }
    if clarity > certainty {
        return RepairStrategy::Clarify;
    }
    RepairStrategy::Rewrite
}
