//! Chunk sources.
//!
//! The coordinator only sees this trait; the shipped implementation sits on
//! top of the vector store, with chunk metadata carried as JSON payloads.
//! Chunk ingest itself is owned upstream; `VectorChunkSource` exposes an
//! indexing surface so wiring and tests can register chunks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sage_core::{Chunk, ChunkOrigin};
use sage_embed::{Embedder, VectorStore};
use serde_json::{json, Value};

#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Number of files indexed for a project.
    async fn project_file_count(&self, project_id: i64) -> Result<usize>;

    /// Top-k chunks from a project collection, best first.
    async fn search_project(&self, project_id: i64, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Top-k chunks from the global library, best first, dropping results
    /// under `min_score`.
    async fn search_library(&self, query: &str, k: usize, min_score: f32) -> Result<Vec<Chunk>>;
}

const LIBRARY_COLLECTION: &str = "library";

fn project_collection(project_id: i64) -> String {
    format!("project:{project_id}")
}

/// `ChunkSource` over a vector store and embedder.
pub struct VectorChunkSource {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    /// project_id → file ids seen at index time.
    project_files: Mutex<HashMap<i64, HashSet<i64>>>,
}

impl VectorChunkSource {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            project_files: Mutex::new(HashMap::new()),
        }
    }

    fn payload(chunk: &Chunk) -> Value {
        json!({
            "file_id": chunk.file_id,
            "filename": chunk.filename,
            "chunk_index": chunk.chunk_index,
            "page": chunk.page,
            "content": chunk.content,
        })
    }

    fn chunk_from_payload(payload: &Value, score: f32, origin: ChunkOrigin) -> Chunk {
        Chunk {
            file_id: payload.get("file_id").and_then(Value::as_i64),
            filename: payload
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            chunk_index: payload
                .get("chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            page: payload
                .get("page")
                .and_then(Value::as_u64)
                .map(|p| p as u32),
            content: payload
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            score,
            origin,
        }
    }

    /// Register a project chunk. The chunk's `score` field is ignored.
    pub async fn index_project_chunk(&self, project_id: i64, chunk: &Chunk) -> Result<()> {
        let vector = self.embedder.embed(&chunk.content).await?;
        let id = format!(
            "{}:{}",
            chunk.file_id.unwrap_or_default(),
            chunk.chunk_index
        );
        self.store
            .add(&project_collection(project_id), &id, vector, Self::payload(chunk))
            .await?;
        if let Some(file_id) = chunk.file_id {
            self.project_files
                .lock()
                .unwrap()
                .entry(project_id)
                .or_default()
                .insert(file_id);
        }
        Ok(())
    }

    /// Register a library chunk.
    pub async fn index_library_chunk(&self, chunk: &Chunk) -> Result<()> {
        let vector = self.embedder.embed(&chunk.content).await?;
        let id = format!(
            "{}:{}",
            chunk.file_id.unwrap_or_default(),
            chunk.chunk_index
        );
        self.store
            .add(LIBRARY_COLLECTION, &id, vector, Self::payload(chunk))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChunkSource for VectorChunkSource {
    async fn project_file_count(&self, project_id: i64) -> Result<usize> {
        Ok(self
            .project_files
            .lock()
            .unwrap()
            .get(&project_id)
            .map_or(0, HashSet::len))
    }

    async fn search_project(&self, project_id: i64, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .top_k(&project_collection(project_id), &vector, k, None)
            .await?;
        Ok(hits
            .iter()
            .map(|hit| Self::chunk_from_payload(&hit.payload, hit.score, ChunkOrigin::Project))
            .collect())
    }

    async fn search_library(&self, query: &str, k: usize, min_score: f32) -> Result<Vec<Chunk>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.store.top_k(LIBRARY_COLLECTION, &vector, k, None).await?;
        Ok(hits
            .iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| Self::chunk_from_payload(&hit.payload, hit.score, ChunkOrigin::Library))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use sage_embed::{HashEmbedder, InMemoryVectorStore};

    use super::*;

    fn chunk(file_id: i64, index: usize, content: &str) -> Chunk {
        Chunk {
            file_id: Some(file_id),
            filename: format!("file{file_id}.md"),
            chunk_index: index,
            page: None,
            content: content.to_string(),
            score: 0.0,
            origin: ChunkOrigin::Project,
        }
    }

    fn source() -> VectorChunkSource {
        VectorChunkSource::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashEmbedder::default()),
        )
    }

    #[tokio::test]
    async fn file_count_tracks_distinct_files() -> Result<()> {
        let source = source();
        source
            .index_project_chunk(1, &chunk(10, 0, "covenant themes in exodus"))
            .await?;
        source
            .index_project_chunk(1, &chunk(10, 1, "more covenant themes"))
            .await?;
        source
            .index_project_chunk(1, &chunk(11, 0, "psalms of ascent"))
            .await?;

        assert_eq!(source.project_file_count(1).await?, 2);
        assert_eq!(source.project_file_count(2).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn project_search_returns_tagged_chunks() -> Result<()> {
        let source = source();
        source
            .index_project_chunk(1, &chunk(10, 0, "covenant faithfulness in the torah"))
            .await?;

        let hits = source.search_project(1, "torah covenant", 5).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].origin, ChunkOrigin::Project);
        assert_eq!(hits[0].filename, "file10.md");
        Ok(())
    }

    #[tokio::test]
    async fn library_search_applies_min_score() -> Result<()> {
        let source = source();
        let mut library = chunk(99, 0, "unrelated text about socket buffers");
        library.origin = ChunkOrigin::Library;
        source.index_library_chunk(&library).await?;

        let hits = source
            .search_library("covenant torah teaching", 5, 0.3)
            .await?;
        assert!(hits.is_empty());
        Ok(())
    }
}
