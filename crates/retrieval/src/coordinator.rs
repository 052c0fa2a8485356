//! The retrieval coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use sage_core::{Chunk, ChunkOrigin, Intent};
use tracing::{debug, warn};

use crate::source::ChunkSource;

const NARROW_TOP_K: usize = 10;
const BROAD_TOP_K_FLOOR: usize = 50;
const BROAD_PER_FILE_FACTOR: usize = 10;
const DIVERSIFY_MAX_PER_FILE: usize = 5;
const DIVERSIFY_TOTAL_MAX: usize = 25;
const LIBRARY_TOP_K: usize = 10;
const LIBRARY_MIN_SCORE: f32 = 0.3;
const MERGED_CAP: usize = 30;

/// Intents that search the global library and widen project retrieval.
fn is_research_intent(intents: &[Intent]) -> bool {
    intents.iter().any(|i| {
        matches!(
            i,
            Intent::Research | Intent::Write | Intent::Summarize | Intent::Explain
        )
    })
}

/// Broad queries want coverage across every project file, not just the top
/// similarity hits.
fn is_broad_query(intents: &[Intent]) -> bool {
    intents
        .iter()
        .any(|i| matches!(i, Intent::Research | Intent::Write | Intent::Summarize))
}

pub struct RetrievalCoordinator {
    source: Arc<dyn ChunkSource>,
}

impl RetrievalCoordinator {
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        Self { source }
    }

    /// Retrieve the merged, capped chunk list for one turn.
    pub async fn retrieve(
        &self,
        project_id: Option<i64>,
        query: &str,
        intents: &[Intent],
    ) -> Vec<Chunk> {
        let mut project_chunks: Vec<Chunk> = Vec::new();
        let mut library_chunks: Vec<Chunk> = Vec::new();

        if let Some(project_id) = project_id {
            let broad = is_broad_query(intents);
            let top_k = if broad {
                match self.source.project_file_count(project_id).await {
                    Ok(file_count) => BROAD_TOP_K_FLOOR.max(file_count * BROAD_PER_FILE_FACTOR),
                    Err(error) => {
                        warn!(project_id, %error, "project file count failed");
                        BROAD_TOP_K_FLOOR
                    }
                }
            } else {
                NARROW_TOP_K
            };

            match self.source.search_project(project_id, query, top_k).await {
                Ok(chunks) => {
                    project_chunks = chunks;
                    if broad && !project_chunks.is_empty() {
                        project_chunks = diversify(
                            project_chunks,
                            DIVERSIFY_MAX_PER_FILE,
                            DIVERSIFY_TOTAL_MAX,
                        );
                    }
                }
                Err(error) => warn!(project_id, %error, "project retrieval failed"),
            }
        }

        if is_research_intent(intents) {
            match self
                .source
                .search_library(query, LIBRARY_TOP_K, LIBRARY_MIN_SCORE)
                .await
            {
                Ok(chunks) => library_chunks = chunks,
                Err(error) => warn!(%error, "library retrieval failed"),
            }
        }

        let merged = merge(project_chunks, library_chunks);
        debug!(count = merged.len(), "retrieval complete");
        merged
    }
}

/// Cap chunks per file, then re-sort by score and cap the total. Chunks with
/// no file id carry no diversity signal and are dropped here.
fn diversify(chunks: Vec<Chunk>, max_per_file: usize, total_max: usize) -> Vec<Chunk> {
    let mut by_file: HashMap<i64, Vec<Chunk>> = HashMap::new();
    for chunk in chunks {
        if let Some(file_id) = chunk.file_id {
            by_file.entry(file_id).or_default().push(chunk);
        }
    }

    // Per-file lists arrive sorted by relevance; keep the head of each.
    let mut diversified: Vec<Chunk> = by_file
        .into_values()
        .flat_map(|file_chunks| file_chunks.into_iter().take(max_per_file))
        .collect();

    diversified.sort_by(|a, b| b.score.total_cmp(&a.score));
    diversified.truncate(total_max);
    diversified
}

/// Project chunks first, then library, deduplicated on the first 200 content
/// characters, capped.
fn merge(project: Vec<Chunk>, library: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen: Vec<String> = Vec::new();
    let mut merged: Vec<Chunk> = Vec::new();

    for (chunks, origin) in [
        (project, ChunkOrigin::Project),
        (library, ChunkOrigin::Library),
    ] {
        for mut chunk in chunks {
            let key = chunk.dedup_key();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            chunk.origin = origin;
            merged.push(chunk);
        }
    }

    merged.truncate(MERGED_CAP);
    merged
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::source::ChunkSource;

    fn chunk(file_id: i64, index: usize, content: &str, score: f32) -> Chunk {
        Chunk {
            file_id: Some(file_id),
            filename: format!("file{file_id}.md"),
            chunk_index: index,
            page: Some(1),
            content: content.to_string(),
            score,
            origin: ChunkOrigin::Project,
        }
    }

    /// Source that records the requested k and serves canned chunks.
    struct CannedSource {
        file_count: usize,
        project: Vec<Chunk>,
        library: Vec<Chunk>,
        seen_k: std::sync::Mutex<Option<usize>>,
    }

    #[async_trait]
    impl ChunkSource for CannedSource {
        async fn project_file_count(&self, _project_id: i64) -> Result<usize> {
            Ok(self.file_count)
        }
        async fn search_project(
            &self,
            _project_id: i64,
            _query: &str,
            k: usize,
        ) -> Result<Vec<Chunk>> {
            *self.seen_k.lock().unwrap() = Some(k);
            Ok(self.project.clone())
        }
        async fn search_library(
            &self,
            _query: &str,
            k: usize,
            _min_score: f32,
        ) -> Result<Vec<Chunk>> {
            Ok(self.library.iter().take(k).cloned().collect())
        }
    }

    fn coordinator(source: CannedSource) -> (RetrievalCoordinator, Arc<CannedSource>) {
        let source = Arc::new(source);
        (RetrievalCoordinator::new(source.clone()), source)
    }

    #[tokio::test]
    async fn broad_query_scales_k_with_file_count() {
        let (coordinator, source) = coordinator(CannedSource {
            file_count: 7,
            project: vec![],
            library: vec![],
            seen_k: std::sync::Mutex::new(None),
        });

        coordinator
            .retrieve(Some(1), "summarize the project", &[Intent::Summarize])
            .await;
        // max(50, 7 × 10) = 70
        assert_eq!(*source.seen_k.lock().unwrap(), Some(70));
    }

    #[tokio::test]
    async fn narrow_query_uses_small_k() {
        let (coordinator, source) = coordinator(CannedSource {
            file_count: 7,
            project: vec![],
            library: vec![],
            seen_k: std::sync::Mutex::new(None),
        });

        coordinator
            .retrieve(Some(1), "fix the parser", &[Intent::Code])
            .await;
        assert_eq!(*source.seen_k.lock().unwrap(), Some(10));
    }

    #[tokio::test]
    async fn diversification_caps_chunks_per_file() {
        let mut project = Vec::new();
        for file_id in 0..3 {
            for index in 0..10 {
                project.push(chunk(
                    file_id,
                    index,
                    &format!("file {file_id} chunk {index}"),
                    1.0 - index as f32 * 0.01,
                ));
            }
        }
        let (coordinator, _) = coordinator(CannedSource {
            file_count: 3,
            project,
            library: vec![],
            seen_k: std::sync::Mutex::new(None),
        });

        let chunks = coordinator
            .retrieve(Some(1), "summarize everything", &[Intent::Summarize])
            .await;

        assert!(chunks.len() <= 15);
        for file_id in 0..3 {
            let per_file = chunks
                .iter()
                .filter(|c| c.file_id == Some(file_id))
                .count();
            assert!(per_file <= 5, "file {file_id} has {per_file} chunks");
        }
    }

    #[tokio::test]
    async fn merge_dedups_on_content_prefix_and_tags_origin() {
        let shared = "identical content that appears in both project and library sources";
        let (coordinator, _) = coordinator(CannedSource {
            file_count: 1,
            project: vec![chunk(1, 0, shared, 0.9)],
            library: vec![chunk(2, 0, shared, 0.8), chunk(3, 0, "library only text", 0.7)],
            seen_k: std::sync::Mutex::new(None),
        });

        let chunks = coordinator
            .retrieve(Some(1), "research this", &[Intent::Research])
            .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].origin, ChunkOrigin::Project);
        assert_eq!(chunks[1].origin, ChunkOrigin::Library);
        // No two chunks share a 200-char prefix.
        let keys: Vec<String> = chunks.iter().map(|c| c.dedup_key()).collect();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[tokio::test]
    async fn no_project_and_non_research_intent_yields_nothing() {
        let (coordinator, _) = coordinator(CannedSource {
            file_count: 0,
            project: vec![chunk(1, 0, "should not appear", 0.9)],
            library: vec![chunk(2, 0, "nor this", 0.9)],
            seen_k: std::sync::Mutex::new(None),
        });

        let chunks = coordinator
            .retrieve(None, "write me a function", &[Intent::Code])
            .await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn merged_output_caps_at_thirty() {
        let mut library = Vec::new();
        for i in 0..60 {
            library.push(chunk(100 + i, 0, &format!("library text number {i}"), 0.9));
        }
        let (coordinator, _) = coordinator(CannedSource {
            file_count: 0,
            project: vec![],
            library,
            seen_k: std::sync::Mutex::new(None),
        });

        // Library search itself caps at k=10, so force the cap through the
        // merge path by checking it holds regardless.
        let chunks = coordinator
            .retrieve(None, "research broadly", &[Intent::Research])
            .await;
        assert!(chunks.len() <= 30);
    }
}
