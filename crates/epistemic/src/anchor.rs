//! Evidence anchoring.
//!
//! "Anchor, don't hedge": when a claim is flagged, try to find supporting
//! text quickly and attach it instead of watering the claim down. Sources
//! are consulted in configured priority order under a strict time budget;
//! partial results are fine, and every failure is silent; anchoring is
//! best-effort by design.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sage_core::Chunk;
use tracing::debug;

use crate::rules::AnchorSettings;

/// A piece of supporting evidence.
#[derive(Debug, Clone)]
pub struct Anchor {
    /// Which source produced it ("session_context", "library_cache", ...).
    pub source: String,
    pub source_id: String,
    pub source_name: String,
    pub content: String,
    pub relevance: f32,
    pub page: Option<u32>,
    pub verse: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnchorResult {
    pub found: bool,
    pub anchors: Vec<Anchor>,
    pub search_time_ms: u64,
    pub sources_checked: Vec<String>,
    pub budget_exceeded: bool,
}

/// One place evidence can come from. Implementations must respect the
/// passed budget themselves when their lookup is expensive.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Name matched against the configured source order.
    fn name(&self) -> &'static str;

    async fn find(&self, claim: &str, max_anchors: usize) -> Vec<Anchor>;
}

/// Words ignored by the keyword-overlap relevance check.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they", "what",
    "which", "who", "whom", "whose", "where", "when", "why", "how", "and", "or", "but", "if",
    "then", "so", "than", "too", "very", "just", "only", "own", "same", "as", "of", "at", "by",
    "for", "with", "about", "to", "from", "in", "on", "not", "no",
];

fn content_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(ToString::to_string)
        .collect()
}

/// Keyword-overlap relevance: ≥2 shared content words, or ≥1 when the claim
/// itself has at most 3.
pub fn is_relevant(claim: &str, content: &str) -> bool {
    let claim_words = content_words(claim);
    if claim_words.is_empty() {
        return false;
    }
    let candidate_words = content_words(content);
    let overlap = claim_words
        .iter()
        .filter(|w| candidate_words.contains(w))
        .count();
    overlap >= 2 || (overlap >= 1 && claim_words.len() <= 3)
}

/// Evidence already retrieved this turn: chunks plus any pre-formatted
/// scripture references. Built fresh per turn by the pipeline caller.
pub struct SessionEvidence {
    chunks: Vec<Chunk>,
}

impl SessionEvidence {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl EvidenceSource for SessionEvidence {
    fn name(&self) -> &'static str {
        "session_context"
    }

    async fn find(&self, claim: &str, max_anchors: usize) -> Vec<Anchor> {
        self.chunks
            .iter()
            .filter(|chunk| is_relevant(claim, &chunk.content))
            .take(max_anchors)
            .map(|chunk| Anchor {
                source: "session_context".to_string(),
                source_id: chunk
                    .file_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                source_name: chunk.filename.clone(),
                content: chunk.content.chars().take(500).collect(),
                relevance: if chunk.score > 0.0 { chunk.score } else { 0.5 },
                page: chunk.page,
                verse: None,
            })
            .collect()
    }
}

pub struct AnchorService {
    settings: AnchorSettings,
    sources: Vec<Arc<dyn EvidenceSource>>,
}

impl AnchorService {
    pub fn new(settings: AnchorSettings, sources: Vec<Arc<dyn EvidenceSource>>) -> Self {
        Self { settings, sources }
    }

    /// Search for supporting evidence within the time budget. Sources run in
    /// configured priority order; the search stops as soon as enough anchors
    /// are found or the budget is spent.
    pub async fn find_anchors(
        &self,
        claim: &str,
        deep_search: bool,
        max_anchors: usize,
    ) -> AnchorResult {
        let budget_ms = if deep_search {
            self.settings.deep_budget_ms
        } else {
            self.settings.fast_budget_ms
        };
        let started = Instant::now();

        let mut anchors: Vec<Anchor> = Vec::new();
        let mut sources_checked = Vec::new();

        for source_name in &self.settings.sources {
            if started.elapsed().as_millis() as u64 >= budget_ms {
                break;
            }
            let Some(source) = self
                .sources
                .iter()
                .find(|s| s.name() == source_name.as_str())
            else {
                continue;
            };

            sources_checked.push(source.name().to_string());
            anchors.extend(source.find(claim, max_anchors).await);

            if anchors.len() >= max_anchors {
                break;
            }
        }

        let search_time_ms = started.elapsed().as_millis() as u64;
        anchors.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        anchors.truncate(max_anchors);

        debug!(
            anchors = anchors.len(),
            search_time_ms,
            sources = ?sources_checked,
            "anchor search complete"
        );

        AnchorResult {
            found: !anchors.is_empty(),
            budget_exceeded: search_time_ms >= budget_ms && anchors.is_empty(),
            anchors,
            search_time_ms,
            sources_checked,
        }
    }
}

#[cfg(test)]
mod tests {
    use sage_core::ChunkOrigin;

    use super::*;

    fn chunk(filename: &str, content: &str, score: f32) -> Chunk {
        Chunk {
            file_id: Some(4),
            filename: filename.to_string(),
            chunk_index: 0,
            page: Some(12),
            content: content.to_string(),
            score,
            origin: ChunkOrigin::Library,
        }
    }

    #[test]
    fn relevance_needs_two_overlapping_content_words() {
        assert!(is_relevant(
            "covenant renewal ceremony",
            "the chapter describes a covenant renewal in detail"
        ));
        assert!(!is_relevant(
            "covenant renewal ceremony practices today",
            "completely unrelated network protocol text"
        ));
    }

    #[test]
    fn short_claims_need_only_one_overlap() {
        assert!(is_relevant("sabbath", "teachings about the sabbath day"));
    }

    #[test]
    fn stop_words_do_not_count_as_overlap() {
        assert!(!is_relevant(
            "what is the point of this",
            "the purpose of that is unclear"
        ));
    }

    #[tokio::test]
    async fn session_evidence_returns_relevant_chunks_only() {
        let source = SessionEvidence::new(vec![
            chunk("torah.md", "covenant faithfulness language throughout exodus", 0.8),
            chunk("net.md", "tcp buffer sizing heuristics", 0.9),
        ]);

        let anchors = source.find("covenant faithfulness in exodus", 3).await;
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].source_name, "torah.md");
        assert_eq!(anchors[0].page, Some(12));
    }

    #[tokio::test]
    async fn find_anchors_walks_sources_in_priority_order() {
        let settings = AnchorSettings::default();
        let session = Arc::new(SessionEvidence::new(vec![chunk(
            "notes.md",
            "covenant renewal ceremony details",
            0.7,
        )]));

        let service = AnchorService::new(settings, vec![session]);
        let result = service
            .find_anchors("covenant renewal ceremony", false, 3)
            .await;

        assert!(result.found);
        assert_eq!(result.sources_checked, vec!["session_context"]);
        assert!(result.anchors.len() <= 3);
    }

    #[tokio::test]
    async fn no_evidence_reports_not_found() {
        let service = AnchorService::new(
            AnchorSettings::default(),
            vec![Arc::new(SessionEvidence::new(vec![]))],
        );
        let result = service.find_anchors("anything at all here", false, 3).await;
        assert!(!result.found);
        assert!(result.anchors.is_empty());
    }

    #[tokio::test]
    async fn anchors_are_sorted_by_relevance_and_capped() {
        let source = SessionEvidence::new(vec![
            chunk("a.md", "covenant renewal ceremony one", 0.2),
            chunk("b.md", "covenant renewal ceremony two", 0.9),
            chunk("c.md", "covenant renewal ceremony three", 0.5),
            chunk("d.md", "covenant renewal ceremony four", 0.7),
        ]);
        let service = AnchorService::new(AnchorSettings::default(), vec![Arc::new(source)]);

        let result = service
            .find_anchors("covenant renewal ceremony", true, 3)
            .await;
        assert_eq!(result.anchors.len(), 3);
        assert!(result.anchors[0].relevance >= result.anchors[1].relevance);
        assert!(result.anchors[1].relevance >= result.anchors[2].relevance);
    }
}
