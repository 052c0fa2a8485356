//! Minimal repair.
//!
//! Only flagged sentences are touched, never the whole response. Evidence
//! attachment is preferred over softening, softening uses a fixed table
//! with case-preserving substitution, and generic hedges are never
//! inserted.

use crate::anchor::{Anchor, AnchorResult};
use crate::linter::{IssueCategory, LintResult, LintSeverity, RepairStrategy};

/// Softening replacements for high-risk phrases. Checked in order; multi-word
/// entries come before their single-word tails.
const SOFTENINGS: &[(&str, &str)] = &[
    ("this proves", "this strongly suggests"),
    ("definitively proves", "strongly suggests"),
    ("this definitively", "this appears to"),
    ("this settles", "this addresses"),
    ("this refutes", "this challenges"),
    ("without question", "with strong evidence"),
    ("beyond doubt", "with high confidence"),
    ("the only interpretation", "a compelling interpretation"),
    ("clearly teaches", "appears to teach"),
    ("obviously means", "likely means"),
    ("definitively", "strongly suggests"),
    ("definitely", "likely"),
    ("certainly", "appears"),
    ("always", "typically"),
    ("never", "rarely"),
    ("must be", "likely is"),
    ("cannot be", "is unlikely to be"),
];

#[derive(Debug, Clone)]
pub struct RepairResult {
    pub repaired: bool,
    pub original_text: String,
    pub repaired_text: String,
    pub changes_made: Vec<String>,
    pub anchors_attached: Vec<Anchor>,
}

#[derive(Debug, Default)]
pub struct RepairService;

impl RepairService {
    pub fn new() -> Self {
        Self
    }

    pub fn repair(
        &self,
        text: &str,
        lint: &LintResult,
        anchors: Option<&AnchorResult>,
    ) -> RepairResult {
        if !lint.needs_repair {
            return RepairResult {
                repaired: false,
                original_text: text.to_string(),
                repaired_text: text.to_string(),
                changes_made: Vec::new(),
                anchors_attached: Vec::new(),
            };
        }

        let mut repaired_text = text.to_string();
        let mut changes = Vec::new();
        let mut attached = Vec::new();

        match lint.repair_strategy {
            Some(RepairStrategy::Anchor) if anchors.is_some_and(|a| a.found) => {
                let anchor_result = anchors.unwrap();
                let (new_text, anchor_changes) =
                    apply_anchor(&repaired_text, lint, anchor_result);
                repaired_text = new_text;
                changes.extend(anchor_changes);
                attached = anchor_result.anchors.clone();
            }
            // No anchors found: fall back to the minimal rewrite so the
            // overconfident phrasing still gets fixed.
            Some(RepairStrategy::Anchor) | Some(RepairStrategy::Rewrite) => {
                let (new_text, rewrite_changes) = apply_rewrite(&repaired_text, lint);
                repaired_text = new_text;
                changes.extend(rewrite_changes);
            }
            Some(RepairStrategy::Clarify) => {
                // A thesis must come from understanding the content, so
                // clarity issues are flagged, not auto-edited.
                changes.push("Flagged for manual clarity improvement".to_string());
            }
            None => {}
        }

        RepairResult {
            repaired: !changes.is_empty(),
            original_text: text.to_string(),
            repaired_text,
            changes_made: changes,
            anchors_attached: attached,
        }
    }
}

/// Splice inline citations after the sentence carrying the first
/// high-severity certainty issue.
fn apply_anchor(text: &str, lint: &LintResult, anchors: &AnchorResult) -> (String, Vec<String>) {
    let Some(issue) = lint
        .issues
        .iter()
        .find(|i| i.severity == LintSeverity::High && i.category == IssueCategory::Certainty)
    else {
        return (text.to_string(), Vec::new());
    };
    if anchors.anchors.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let citation_text = format_anchor_citations(&anchors.anchors);
    let sentence_end = text[issue.position.1.min(text.len())..]
        .find('.')
        .map(|i| issue.position.1 + i + 1)
        .unwrap_or(text.len());

    let mut repaired = String::with_capacity(text.len() + citation_text.len());
    repaired.push_str(&text[..sentence_end]);
    repaired.push_str(&citation_text);
    repaired.push_str(&text[sentence_end..]);

    let change = format!(
        "Attached {} supporting reference(s)",
        anchors.anchors.len()
    );
    (repaired, vec![change])
}

fn format_anchor_citations(anchors: &[Anchor]) -> String {
    let parts: Vec<String> = anchors
        .iter()
        .take(2)
        .map(|anchor| match &anchor.verse {
            Some(verse) => format!("[{verse}]"),
            None => format!("[{}]", anchor.source_name),
        })
        .collect();
    format!(" {}", parts.join(", "))
}

/// Case-preserving substitution of each high-severity phrase using the
/// softening table. One replacement per issue, first table hit wins.
fn apply_rewrite(text: &str, lint: &LintResult) -> (String, Vec<String>) {
    let mut repaired = text.to_string();
    let mut changes = Vec::new();

    for issue in &lint.issues {
        if issue.severity != LintSeverity::High || issue.category != IssueCategory::Certainty {
            continue;
        }
        let span_lower = issue.text_span.to_lowercase();
        for (original, replacement) in SOFTENINGS {
            if !span_lower.contains(original) {
                continue;
            }
            if let Some(new_text) = replace_preserving_case(&repaired, original, replacement) {
                repaired = new_text;
                changes.push(format!("Softened '{original}' -> '{replacement}'"));
            }
            break;
        }
    }

    (repaired, changes)
}

/// Replace the first case-insensitive occurrence of `original`, matching the
/// original's casing: ALL CAPS stays caps, Capitalized stays capitalized.
fn replace_preserving_case(text: &str, original: &str, replacement: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let start = lower.find(&original.to_lowercase())?;
    let end = start + original.len();
    let matched = &text[start..end];

    let cased = if matched.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) {
        replacement.to_uppercase()
    } else if matched.chars().next().is_some_and(char::is_uppercase) {
        let mut out = replacement.to_string();
        if let Some(first) = out.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        out
    } else {
        replacement.to_string()
    };

    let mut out = String::with_capacity(text.len() + cased.len());
    out.push_str(&text[..start]);
    out.push_str(&cased);
    out.push_str(&text[end..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::classifier::{AnswerClassifier, ClassifyContext};
    use crate::linter::ConfidenceLinter;
    use crate::rules::EpistemicRules;

    fn lint(text: &str) -> LintResult {
        let rules = Arc::new(EpistemicRules::default());
        let classification =
            AnswerClassifier::new(rules.clone()).classify(text, &ClassifyContext::default());
        ConfidenceLinter::new(rules).lint(text, &classification)
    }

    fn anchor(name: &str) -> Anchor {
        Anchor {
            source: "session_context".to_string(),
            source_id: "1".to_string(),
            source_name: name.to_string(),
            content: "supporting text".to_string(),
            relevance: 0.8,
            page: None,
            verse: None,
        }
    }

    #[test]
    fn no_repair_needed_returns_text_unchanged() {
        let text = "The passage describes a covenant ceremony.";
        let result = RepairService::new().repair(text, &lint(text), None);
        assert!(!result.repaired);
        assert_eq!(result.repaired_text, text);
    }

    #[test]
    fn anchor_strategy_splices_citations_after_flagged_sentence() {
        let text = "This definitively proves the claim. More discussion follows.";
        let lint_result = lint(text);
        let anchors = AnchorResult {
            found: true,
            anchors: vec![anchor("sources.md")],
            ..Default::default()
        };

        let result = RepairService::new().repair(text, &lint_result, Some(&anchors));
        assert!(result.repaired);
        assert!(result
            .repaired_text
            .starts_with("This definitively proves the claim. [sources.md]"));
        assert_eq!(result.anchors_attached.len(), 1);
    }

    #[test]
    fn anchor_strategy_without_anchors_falls_back_to_rewrite() {
        let text = "This definitively proves the claim.";
        let lint_result = lint(text);
        let empty = AnchorResult::default();

        let result = RepairService::new().repair(text, &lint_result, Some(&empty));
        assert!(result.repaired);
        assert!(result.repaired_text.contains("strongly suggests"));
        assert!(result.anchors_attached.is_empty());
    }

    #[test]
    fn rewrite_preserves_leading_case() {
        let (out, _) =
            apply_rewrite("Definitively proves the point.", &lint("Definitively proves the point."));
        assert!(out.starts_with("Strongly suggests"), "got: {out}");
    }

    #[test]
    fn rewrite_softening_table_sample() {
        let text = "The author clearly teaches a single position here.";
        let lint_result = lint(text);
        let (out, changes) = apply_rewrite(text, &lint_result);
        assert!(out.contains("appears to teach"));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn verse_anchors_cite_the_reference() {
        let mut a = anchor("ignored");
        a.verse = Some("Romans 8:3".to_string());
        assert_eq!(format_anchor_citations(&[a]), " [Romans 8:3]");
    }

    #[test]
    fn clarify_strategy_flags_without_editing() {
        // Build a lint result with a high certainty issue rewritten into a
        // clarify strategy is not natural here, so drive the service with a
        // synthetic result.
        let text = "It might possibly perhaps work, maybe. This definitively proves it.";
        let mut lint_result = lint(text);
        lint_result.repair_strategy = Some(RepairStrategy::Clarify);

        let result = RepairService::new().repair(text, &lint_result, None);
        assert!(result.repaired);
        assert_eq!(result.repaired_text, text);
        assert!(result.changes_made[0].contains("clarity"));
    }
}
