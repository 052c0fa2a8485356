//! The pipeline: classify → lint → anchor → repair → metadata.

use std::sync::Arc;

use sage_core::Chunk;
use tracing::debug;

use crate::anchor::{AnchorResult, AnchorService, EvidenceSource, SessionEvidence};
use crate::classifier::{AnswerClassifier, AnswerType, ClassificationResult, ClassifyContext};
use crate::linter::{ConfidenceLinter, IssueCategory, LintResult, RepairStrategy};
use crate::repair::{RepairResult, RepairService};
use crate::rules::EpistemicRules;

/// UI badge. `ungrounded` is never exposed; it maps to no badge at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Deterministic,
    Grounded,
    Contested,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Deterministic => "deterministic",
            Badge::Grounded => "grounded",
            Badge::Contested => "contested",
        }
    }
}

/// Metadata attached to the response for the UI.
#[derive(Debug, Clone, Default)]
pub struct EpistemicMetadata {
    pub answer_type: String,
    pub badge: Option<Badge>,
    pub is_contested: bool,
    pub contestation_level: Option<String>,
    pub contested_domains: Vec<String>,
    pub alternative_positions: Vec<String>,
    pub has_sources: bool,
    pub sources: Vec<String>,
    pub had_issues: bool,
    pub was_repaired: bool,
    pub certainty_score: f32,
    pub clarity_score: f32,
}

/// Complete result. The original text is always preserved alongside the
/// processed one.
#[derive(Debug, Clone)]
pub struct EpistemicResult {
    pub original_text: String,
    pub processed_text: String,
    pub metadata: EpistemicMetadata,
    pub classification: ClassificationResult,
    pub lint: LintResult,
    pub anchor: Option<AnchorResult>,
    pub repair: Option<RepairResult>,
}

/// Per-turn context handed to the pipeline by the router.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// "count" | "list" | "schedule" | "status" force deterministic.
    pub query_type: Option<String>,
    /// Sources already attached by the pipeline (citation filenames).
    pub sources: Vec<String>,
    /// Chunks retrieved this turn, used as session evidence for anchoring.
    pub chunks: Vec<Chunk>,
    /// User preference for the deeper anchor budget.
    pub prefers_accuracy: bool,
}

pub struct EpistemicPipeline {
    rules: Arc<EpistemicRules>,
    classifier: AnswerClassifier,
    linter: ConfidenceLinter,
    repair: RepairService,
    /// Extra evidence sources beyond the per-turn session context
    /// (library cache, reference cache), injected by the embedder.
    extra_sources: Vec<Arc<dyn EvidenceSource>>,
}

impl EpistemicPipeline {
    pub fn new(rules: Arc<EpistemicRules>) -> Self {
        Self {
            classifier: AnswerClassifier::new(rules.clone()),
            linter: ConfidenceLinter::new(rules.clone()),
            repair: RepairService::new(),
            extra_sources: Vec::new(),
            rules,
        }
    }

    pub fn with_sources(mut self, sources: Vec<Arc<dyn EvidenceSource>>) -> Self {
        self.extra_sources = sources;
        self
    }

    /// Process one user-facing response.
    pub async fn process(&self, text: &str, context: &SessionContext) -> EpistemicResult {
        self.process_with(text, context, false).await
    }

    /// Like [`process`](Self::process), but `skip_anchor` lets a router
    /// under deadline pressure skip the evidence search (classify, lint, and
    /// repair still run).
    pub async fn process_with(
        &self,
        text: &str,
        context: &SessionContext,
        skip_anchor: bool,
    ) -> EpistemicResult {
        let classify_context = ClassifyContext {
            query_type: context.query_type.clone(),
            sources: context.sources.clone(),
            is_deterministic: false,
        };
        let classification = self.classifier.classify(text, &classify_context);
        let lint = self.linter.lint(text, &classification);

        // Anchor only when the chosen strategy wants evidence.
        let anchor = if !skip_anchor
            && lint.needs_repair
            && lint.repair_strategy == Some(RepairStrategy::Anchor)
        {
            let claim = lint
                .issues
                .iter()
                .find(|i| i.category == IssueCategory::Certainty)
                .map(|i| sentence_claim(text, i.position.0))
                .unwrap_or_else(|| text.to_string());

            let mut sources: Vec<Arc<dyn EvidenceSource>> =
                vec![Arc::new(SessionEvidence::new(context.chunks.clone()))];
            sources.extend(self.extra_sources.iter().cloned());

            let service = AnchorService::new(self.rules.anchor_settings.clone(), sources);
            Some(
                service
                    .find_anchors(&claim, context.prefers_accuracy, 3)
                    .await,
            )
        } else {
            None
        };

        let repair = if lint.needs_repair {
            Some(self.repair.repair(text, &lint, anchor.as_ref()))
        } else {
            None
        };

        let processed_text = repair
            .as_ref()
            .filter(|r| r.repaired)
            .map(|r| r.repaired_text.clone())
            .unwrap_or_else(|| text.to_string());

        let metadata = build_metadata(&classification, &lint, repair.as_ref(), anchor.as_ref());

        debug!(
            answer_type = classification.answer_type.as_str(),
            badge = ?metadata.badge.map(|b| b.as_str()),
            repaired = metadata.was_repaired,
            "epistemic processing complete"
        );

        EpistemicResult {
            original_text: text.to_string(),
            processed_text,
            metadata,
            classification,
            lint,
            anchor,
            repair,
        }
    }
}

/// The claim handed to anchor search: the whole sentence around the flagged
/// phrase, which carries far more keywords than the phrase itself.
fn sentence_claim(text: &str, position: usize) -> String {
    let start = text[..position].rfind('.').map(|i| i + 1).unwrap_or(0);
    let end = text[position..]
        .find('.')
        .map(|i| position + i + 1)
        .unwrap_or(text.len());
    text[start..end].trim().to_string()
}

fn build_metadata(
    classification: &ClassificationResult,
    lint: &LintResult,
    repair: Option<&RepairResult>,
    anchor: Option<&AnchorResult>,
) -> EpistemicMetadata {
    let anchors_attached = repair.is_some_and(|r| !r.anchors_attached.is_empty());

    let badge = match classification.answer_type {
        AnswerType::Deterministic => Some(Badge::Deterministic),
        AnswerType::GroundedContested => Some(Badge::Contested),
        AnswerType::GroundedDirect => Some(Badge::Grounded),
        // An ungrounded answer earns the grounded badge only when repair
        // actually attached evidence; otherwise it gets no badge.
        AnswerType::Ungrounded => anchors_attached.then_some(Badge::Grounded),
    };

    let mut sources: Vec<String> = classification.sources.iter().take(5).cloned().collect();
    if let Some(anchor) = anchor {
        for a in &anchor.anchors {
            if sources.len() >= 5 {
                break;
            }
            sources.push(a.source_name.clone());
        }
    }

    EpistemicMetadata {
        answer_type: classification.answer_type.as_str().to_string(),
        badge,
        is_contested: classification.is_contested,
        contestation_level: classification
            .contestation_level
            .map(|l| l.as_str().to_string()),
        contested_domains: classification.contested_domains.clone(),
        alternative_positions: classification.alternative_positions.clone(),
        has_sources: classification.has_citations || anchors_attached,
        sources,
        had_issues: lint.has_issues,
        was_repaired: repair.is_some_and(|r| r.repaired),
        certainty_score: lint.certainty_score,
        clarity_score: lint.clarity_score,
    }
}

#[cfg(test)]
mod tests {
    use sage_core::ChunkOrigin;

    use super::*;

    fn pipeline() -> EpistemicPipeline {
        EpistemicPipeline::new(Arc::new(EpistemicRules::default()))
    }

    fn chunk(content: &str) -> Chunk {
        Chunk {
            file_id: Some(1),
            filename: "evidence.md".to_string(),
            chunk_index: 0,
            page: None,
            content: content.to_string(),
            score: 0.8,
            origin: ChunkOrigin::Project,
        }
    }

    #[tokio::test]
    async fn deterministic_text_gets_deterministic_badge() {
        let result = pipeline()
            .process("There are 5 files in the project.", &SessionContext::default())
            .await;
        assert_eq!(result.metadata.badge, Some(Badge::Deterministic));
        assert_eq!(result.processed_text, result.original_text);
    }

    #[tokio::test]
    async fn plain_ungrounded_text_gets_no_badge() {
        let result = pipeline()
            .process(
                "I think the approach is reasonable for most situations.",
                &SessionContext::default(),
            )
            .await;
        assert_eq!(result.metadata.badge, None);
        assert_eq!(result.metadata.answer_type, "ungrounded");
    }

    #[tokio::test]
    async fn grounded_text_gets_grounded_badge() {
        let result = pipeline()
            .process(
                "According to [1], the ceremony renews the covenant.",
                &SessionContext::default(),
            )
            .await;
        assert_eq!(result.metadata.badge, Some(Badge::Grounded));
        assert!(result.metadata.has_sources);
    }

    #[tokio::test]
    async fn contested_text_gets_contested_badge_with_level_and_positions() {
        let result = pipeline()
            .process(
                "According to [1], the moral law category shapes this reading.",
                &SessionContext::default(),
            )
            .await;
        assert_eq!(result.metadata.badge, Some(Badge::Contested));
        assert_eq!(result.metadata.contestation_level.as_deref(), Some("C2"));
        assert!(!result.metadata.contested_domains.is_empty());
        assert!(!result.metadata.alternative_positions.is_empty());
    }

    #[tokio::test]
    async fn overconfident_claim_with_evidence_is_anchored_and_badged() {
        let context = SessionContext {
            chunks: vec![chunk("detailed analysis of the covenant claim and its support")],
            ..Default::default()
        };
        let result = pipeline()
            .process("This definitively proves the covenant claim.", &context)
            .await;

        assert!(result.metadata.was_repaired);
        assert!(result.processed_text.contains("[evidence.md]"));
        // Anchors attached upgrade the ungrounded answer to a grounded badge.
        assert_eq!(result.metadata.badge, Some(Badge::Grounded));
    }

    #[tokio::test]
    async fn overconfident_claim_without_evidence_is_softened_and_unbadged() {
        let result = pipeline()
            .process("This definitively proves X.", &SessionContext::default())
            .await;

        assert!(result.metadata.was_repaired);
        assert_eq!(result.processed_text, "This strongly suggests X.");
        assert_eq!(result.metadata.badge, None);
        assert_eq!(result.original_text, "This definitively proves X.");
    }

    #[tokio::test]
    async fn skip_anchor_still_lints_and_repairs() {
        let context = SessionContext {
            chunks: vec![chunk("covenant claim evidence text here")],
            ..Default::default()
        };
        let result = pipeline()
            .process_with("This definitively proves the covenant claim.", &context, true)
            .await;

        assert!(result.anchor.is_none());
        // Repair fell back to rewrite because no anchors were available.
        assert!(result.processed_text.contains("strongly suggests"));
    }

    #[tokio::test]
    async fn caller_sources_count_as_grounding() {
        let context = SessionContext {
            sources: vec!["notes.md".to_string()],
            ..Default::default()
        };
        let result = pipeline()
            .process("A plain restatement of the findings.", &context)
            .await;
        assert_eq!(result.metadata.badge, Some(Badge::Grounded));
    }
}
