//! Vector store trait and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::cosine_similarity;

/// Equality filter on one payload field.
#[derive(Debug, Clone)]
pub struct PayloadFilter {
    pub field: String,
    pub equals: Value,
}

/// A similarity hit.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// Top-K similarity over named chunk collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, collection: &str, id: &str, vector: Vec<f32>, payload: Value)
        -> Result<()>;

    /// Items with cosine similarity to `query`, descending, at most `k`.
    async fn top_k(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Number of points in a collection (0 when absent).
    async fn count(&self, collection: &str) -> Result<usize>;
}

#[derive(Debug, Clone)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: Value,
}

/// Brute-force cosine store. Collections are created on first insert; an
/// existing id within a collection is upserted.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, Vec<Point>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let points = collections.entry(collection.to_string()).or_default();
        if let Some(existing) = points.iter_mut().find(|p| p.id == id) {
            existing.vector = vector;
            existing.payload = payload;
        } else {
            points.push(Point {
                id: id.to_string(),
                vector,
                payload,
            });
        }
        Ok(())
    }

    async fn top_k(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.lock().unwrap();
        let Some(points) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredPoint> = points
            .iter()
            .filter(|p| match filter {
                Some(f) => p.payload.get(&f.field) == Some(&f.equals),
                None => true,
            })
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(&p.vector, query),
                payload: p.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).map_or(0, Vec::len))
    }
}
