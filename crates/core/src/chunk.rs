use serde::{Deserialize, Serialize};

/// Where a retrieved chunk came from. Project chunks always sort ahead of
/// library chunks when merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkOrigin {
    Project,
    Library,
}

/// A retrieved text chunk. Owned by upstream ingest; the core treats it as
/// read-only beyond these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub file_id: Option<i64>,
    pub filename: String,
    pub chunk_index: usize,
    pub page: Option<u32>,
    pub content: String,
    pub score: f32,
    pub origin: ChunkOrigin,
}

impl Chunk {
    /// Dedup key: the first 200 characters of content. Two chunks that share
    /// this prefix are treated as the same text.
    pub fn dedup_key(&self) -> String {
        self.content.chars().take(200).collect()
    }
}
