//! The memory store.
//!
//! All state sits behind one internal lock; the embedder is called before
//! the lock is taken, so no lock is ever held across an await point. The
//! logical schema (memories, memory_entities, memory_entity_links,
//! memory_settings) is what a persistent datastore would implement;
//! ownership filtering is always `user_id = ? OR user_id IS NULL`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::Utc;
use sage_embed::{cosine_similarity, Embedder};
use tracing::{debug, info, warn};

use crate::decay::{decayed_score, DecayParams};
use crate::schema::{
    Entity, EntityType, Memory, MemorySettings, MemorySource, MemoryStats, MemoryTier,
    ScoredMemory, TierStats,
};

/// Parameters for [`MemoryStore::add`].
#[derive(Debug, Clone)]
pub struct AddMemory {
    pub content: String,
    pub category: String,
    pub user_id: Option<i64>,
    pub source: MemorySource,
    pub tier: MemoryTier,
    pub confidence: f32,
}

impl AddMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            category: "general".to_string(),
            user_id: None,
            source: MemorySource::Auto,
            tier: MemoryTier::LongTerm,
            confidence: 0.5,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn source(mut self, source: MemorySource) -> Self {
        self.source = source;
        self
    }

    pub fn tier(mut self, tier: MemoryTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Partial update for [`MemoryStore::update`]. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub category: Option<String>,
    pub tier: Option<MemoryTier>,
    pub confidence: Option<f32>,
    pub summary: Option<String>,
}

/// Filters for [`MemoryStore::list`].
#[derive(Debug, Clone)]
pub struct MemoryFilter {
    pub user_id: Option<i64>,
    pub category: Option<String>,
    pub source: Option<MemorySource>,
    pub tier: Option<MemoryTier>,
    /// Substring match on content.
    pub query: Option<String>,
    pub limit: usize,
}

impl Default for MemoryFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            category: None,
            source: None,
            tier: None,
            query: None,
            limit: 200,
        }
    }
}

/// Partial settings update. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub auto_save_enabled: Option<bool>,
    pub auto_save_categories: Option<Vec<String>>,
    pub core_cap: Option<usize>,
}

#[derive(Default)]
struct State {
    memories: Vec<Memory>,
    entities: Vec<Entity>,
    /// (memory_id, entity_id, relationship)
    links: Vec<(i64, i64, String)>,
    settings: HashMap<i64, MemorySettings>,
    next_memory_id: i64,
    next_entity_id: i64,
}

impl State {
    fn visible_to(&self, memory: &Memory, user_id: Option<i64>) -> bool {
        match user_id {
            Some(uid) => memory.user_id.is_none() || memory.user_id == Some(uid),
            None => true,
        }
    }

    fn count_tier(&self, user_id: Option<i64>, tier: MemoryTier) -> usize {
        self.memories
            .iter()
            .filter(|m| m.tier == tier && self.visible_to(m, user_id))
            .count()
    }

    fn settings_for(&self, user_id: Option<i64>, default_core_cap: usize) -> MemorySettings {
        user_id
            .and_then(|uid| self.settings.get(&uid).cloned())
            .unwrap_or_else(|| MemorySettings::defaults(default_core_cap))
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    embedder: Arc<dyn Embedder>,
    decay: DecayParams,
    default_core_cap: usize,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, config: &sage_config::MemoryConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            embedder,
            decay: DecayParams {
                episodic_half_life_days: config.episodic_half_life_days,
                long_term_half_life_days: config.long_term_half_life_days,
            },
            default_core_cap: config.core_cap,
        }
    }

    pub fn decay_params(&self) -> DecayParams {
        self.decay
    }

    // ── CRUD ──────────────────────────────────────────────────────────────────

    /// Add a memory. Adding a core memory to a full core tier demotes it to
    /// long-term (the add still succeeds). Returns the new id.
    pub async fn add(&self, params: AddMemory) -> Result<i64> {
        let content = params.content.trim().to_string();
        if content.is_empty() {
            bail!("memory content must not be empty");
        }

        let embedding = self.embedder.embed(&content).await?;
        let now = Utc::now();

        let mut state = self.state.lock().unwrap();
        let mut tier = params.tier;
        if tier == MemoryTier::Core {
            let cap = state
                .settings_for(params.user_id, self.default_core_cap)
                .core_cap;
            let core_count = state.count_tier(params.user_id, MemoryTier::Core);
            if core_count >= cap {
                warn!(
                    user_id = ?params.user_id,
                    core_count,
                    cap,
                    "core tier full, storing as long_term instead"
                );
                tier = MemoryTier::LongTerm;
            }
        }

        state.next_memory_id += 1;
        let id = state.next_memory_id;
        let memory = Memory {
            id,
            user_id: params.user_id,
            category: params.category,
            content,
            tier,
            confidence: params.confidence.clamp(0.0, 1.0),
            access_count: 0,
            last_accessed: now,
            created_at: now,
            updated_at: now,
            source: params.source,
            summary: None,
            embedding,
        };
        info!(
            id,
            tier = tier.slug(),
            category = %memory.category,
            confidence = memory.confidence,
            "memory stored"
        );
        state.memories.push(memory);
        Ok(id)
    }

    /// Update a memory. Ownership-checked when `user_id` is provided; content
    /// changes re-embed atomically with the write. Returns false when the
    /// memory is missing or owned by someone else.
    pub async fn update(
        &self,
        id: i64,
        update: MemoryUpdate,
        user_id: Option<i64>,
    ) -> Result<bool> {
        // Embed outside the lock, and only when content actually changes, so an
        // identity update preserves the stored embedding byte-for-byte.
        let new_embedding = {
            let state = self.state.lock().unwrap();
            let Some(memory) = state.memories.iter().find(|m| m.id == id) else {
                return Ok(false);
            };
            if !state.visible_to(memory, user_id) {
                return Ok(false);
            }
            match &update.content {
                Some(content) if content != &memory.content => Some(content.clone()),
                _ => None,
            }
        };
        let new_embedding = match new_embedding {
            Some(content) => Some(self.embedder.embed(&content).await?),
            None => None,
        };

        let mut state = self.state.lock().unwrap();
        let Some(memory) = state.memories.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };

        let mut changed = false;
        if let Some(content) = update.content {
            if content != memory.content {
                memory.content = content;
                if let Some(embedding) = new_embedding {
                    memory.embedding = embedding;
                }
                changed = true;
            }
        }
        if let Some(category) = update.category {
            memory.category = category;
            changed = true;
        }
        if let Some(tier) = update.tier {
            memory.tier = tier;
            changed = true;
        }
        if let Some(confidence) = update.confidence {
            memory.confidence = confidence.clamp(0.0, 1.0);
            changed = true;
        }
        if let Some(summary) = update.summary {
            memory.summary = Some(summary);
            changed = true;
        }
        if changed {
            memory.updated_at = Utc::now();
        }
        Ok(true)
    }

    /// Delete a memory, removing its entity links first. Returns false when
    /// nothing was deleted.
    pub async fn delete(&self, id: i64, user_id: Option<i64>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state
            .memories
            .iter()
            .position(|m| m.id == id && state.visible_to(m, user_id))
        else {
            return Ok(false);
        };
        state.links.retain(|(memory_id, _, _)| *memory_id != id);
        state.memories.remove(pos);
        debug!(id, "memory deleted");
        Ok(true)
    }

    pub fn get(&self, id: i64) -> Option<Memory> {
        let state = self.state.lock().unwrap();
        state.memories.iter().find(|m| m.id == id).cloned()
    }

    /// List memories, ordered core → long_term → episodic, then confidence
    /// descending, then newest first.
    pub fn list(&self, filter: &MemoryFilter) -> Vec<Memory> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<Memory> = state
            .memories
            .iter()
            .filter(|m| state.visible_to(m, filter.user_id))
            .filter(|m| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|c| m.category.eq_ignore_ascii_case(c))
            })
            .filter(|m| filter.source.is_none_or(|s| m.source == s))
            .filter(|m| filter.tier.is_none_or(|t| m.tier == t))
            .filter(|m| {
                filter
                    .query
                    .as_ref()
                    .is_none_or(|q| m.content.to_lowercase().contains(&q.to_lowercase()))
            })
            .cloned()
            .collect();

        out.sort_by(|a, b| {
            a.tier
                .rank()
                .cmp(&b.tier.rank())
                .then(b.confidence.total_cmp(&a.confidence))
                .then(b.created_at.cmp(&a.created_at))
        });
        out.truncate(filter.limit);
        out
    }

    pub fn get_by_tier(&self, user_id: Option<i64>, tier: MemoryTier) -> Vec<Memory> {
        self.list(&MemoryFilter {
            user_id,
            tier: Some(tier),
            ..Default::default()
        })
    }

    pub fn count_tier(&self, user_id: Option<i64>, tier: MemoryTier) -> usize {
        let state = self.state.lock().unwrap();
        state.count_tier(user_id, tier)
    }

    // ── Tier operations ───────────────────────────────────────────────────────

    /// Promote a memory to the core tier. Fails when the core tier is full;
    /// nothing else about the memory changes.
    pub async fn promote_to_core(&self, id: i64, user_id: Option<i64>) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            let cap = state.settings_for(user_id, self.default_core_cap).core_cap;
            let core_count = state.count_tier(user_id, MemoryTier::Core);
            if core_count >= cap {
                bail!("core tier full ({core_count}/{cap}); demote another memory first");
            }
        }
        let updated = self
            .update(
                id,
                MemoryUpdate {
                    tier: Some(MemoryTier::Core),
                    ..Default::default()
                },
                user_id,
            )
            .await?;
        if !updated {
            bail!("memory {id} not found");
        }
        Ok(())
    }

    /// Demote a memory from core to long-term.
    pub async fn demote_from_core(&self, id: i64, user_id: Option<i64>) -> Result<bool> {
        self.update(
            id,
            MemoryUpdate {
                tier: Some(MemoryTier::LongTerm),
                ..Default::default()
            },
            user_id,
        )
        .await
    }

    // ── Search ────────────────────────────────────────────────────────────────

    /// Semantic search with decay-adjusted ranking.
    pub async fn search(&self, query: &str, user_id: Option<i64>, k: usize) -> Result<Vec<ScoredMemory>> {
        let query_embedding = self.embedder.embed(query).await?;
        let now = Utc::now();

        let state = self.state.lock().unwrap();
        let mut scored: Vec<ScoredMemory> = state
            .memories
            .iter()
            .filter(|m| state.visible_to(m, user_id))
            .map(|m| {
                let raw = cosine_similarity(&m.embedding, &query_embedding);
                let score =
                    decayed_score(raw, m.tier, m.last_accessed, m.confidence, now, &self.decay);
                ScoredMemory {
                    memory: m.clone(),
                    raw_score: raw,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    /// Update `last_accessed` and bump `access_count` for a batch of ids.
    /// Applied all-or-nothing under one lock acquisition.
    pub fn record_access(&self, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        for memory in state.memories.iter_mut() {
            if ids.contains(&memory.id) {
                memory.last_accessed = now;
                memory.access_count += 1;
            }
        }
    }

    // ── Entities ──────────────────────────────────────────────────────────────

    /// Add an entity, or return the existing id for the same (name, type).
    pub fn add_entity(&self, name: &str, entity_type: EntityType) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            bail!("entity name must not be empty");
        }
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .entities
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name) && e.entity_type == entity_type)
        {
            return Ok(existing.id);
        }
        state.next_entity_id += 1;
        let id = state.next_entity_id;
        state.entities.push(Entity {
            id,
            name: name.to_string(),
            entity_type,
        });
        Ok(id)
    }

    /// Link a memory to an entity. Idempotent on the full triple.
    pub fn link(&self, memory_id: i64, entity_id: i64, relationship: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.memories.iter().any(|m| m.id == memory_id) {
            bail!("memory {memory_id} not found");
        }
        if !state.entities.iter().any(|e| e.id == entity_id) {
            bail!("entity {entity_id} not found");
        }
        let triple = (memory_id, entity_id, relationship.to_string());
        if !state.links.contains(&triple) {
            state.links.push(triple);
        }
        Ok(())
    }

    /// All memories connected to entities whose name contains `name`.
    pub fn by_entity(&self, name: &str, user_id: Option<i64>) -> Vec<Memory> {
        let needle = name.to_lowercase();
        let state = self.state.lock().unwrap();
        let entity_ids: Vec<i64> = state
            .entities
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .map(|e| e.id)
            .collect();

        let memory_ids: Vec<i64> = state
            .links
            .iter()
            .filter(|(_, entity_id, _)| entity_ids.contains(entity_id))
            .map(|(memory_id, _, _)| *memory_id)
            .collect();

        let mut out: Vec<Memory> = state
            .memories
            .iter()
            .filter(|m| memory_ids.contains(&m.id) && state.visible_to(m, user_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.tier
                .rank()
                .cmp(&b.tier.rank())
                .then(b.confidence.total_cmp(&a.confidence))
        });
        out
    }

    /// Number of links that reference a memory. Test and audit surface.
    pub fn link_count(&self, memory_id: i64) -> usize {
        let state = self.state.lock().unwrap();
        state
            .links
            .iter()
            .filter(|(mid, _, _)| *mid == memory_id)
            .count()
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    pub fn get_settings(&self, user_id: Option<i64>) -> MemorySettings {
        let state = self.state.lock().unwrap();
        state.settings_for(user_id, self.default_core_cap)
    }

    pub fn update_settings(&self, user_id: i64, update: SettingsUpdate) {
        let mut state = self.state.lock().unwrap();
        let defaults = MemorySettings::defaults(self.default_core_cap);
        let settings = state.settings.entry(user_id).or_insert(defaults);
        if let Some(enabled) = update.auto_save_enabled {
            settings.auto_save_enabled = enabled;
        }
        if let Some(categories) = update.auto_save_categories {
            settings.auto_save_categories = categories;
        }
        if let Some(cap) = update.core_cap {
            settings.core_cap = cap;
        }
    }

    /// Whether a category may be auto-saved for this user.
    pub fn should_auto_save(&self, category: &str, user_id: Option<i64>) -> bool {
        let settings = self.get_settings(user_id);
        settings.auto_save_enabled
            && settings
                .auto_save_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    pub fn stats(&self, user_id: Option<i64>) -> MemoryStats {
        let state = self.state.lock().unwrap();

        let tier_stats = |tier: MemoryTier| {
            let memories: Vec<&Memory> = state
                .memories
                .iter()
                .filter(|m| m.tier == tier && state.visible_to(m, user_id))
                .collect();
            if memories.is_empty() {
                return TierStats::default();
            }
            let count = memories.len();
            TierStats {
                count,
                avg_confidence: memories.iter().map(|m| m.confidence).sum::<f32>()
                    / count as f32,
                avg_access_count: memories.iter().map(|m| m.access_count as f32).sum::<f32>()
                    / count as f32,
            }
        };

        MemoryStats {
            core: tier_stats(MemoryTier::Core),
            long_term: tier_stats(MemoryTier::LongTerm),
            episodic: tier_stats(MemoryTier::Episodic),
            total: state
                .memories
                .iter()
                .filter(|m| state.visible_to(m, user_id))
                .count(),
            entities: state.entities.len(),
        }
    }

    /// Distinct categories in use, sorted.
    pub fn categories(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<String> = state
            .memories
            .iter()
            .map(|m| m.category.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use sage_embed::HashEmbedder;

    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(HashEmbedder::default()),
            &sage_config::MemoryConfig::default(),
        )
    }

    fn store_with_cap(cap: usize) -> MemoryStore {
        let config = sage_config::MemoryConfig {
            core_cap: cap,
            ..Default::default()
        };
        MemoryStore::new(Arc::new(HashEmbedder::default()), &config)
    }

    #[tokio::test]
    async fn add_rejects_empty_content() {
        let store = store();
        assert!(store.add(AddMemory::new("   ")).await.is_err());
    }

    #[tokio::test]
    async fn core_cap_demotes_overflow_to_long_term() -> Result<()> {
        let store = store_with_cap(2);
        for i in 0..2 {
            store
                .add(
                    AddMemory::new(format!("core fact {i}"))
                        .user(1)
                        .tier(MemoryTier::Core),
                )
                .await?;
        }
        let id = store
            .add(AddMemory::new("one too many").user(1).tier(MemoryTier::Core))
            .await?;

        let overflow = store.get(id).unwrap();
        assert_eq!(overflow.tier, MemoryTier::LongTerm);
        assert_eq!(store.count_tier(Some(1), MemoryTier::Core), 2);
        Ok(())
    }

    #[tokio::test]
    async fn confidence_is_clamped_on_add_and_update() -> Result<()> {
        let store = store();
        let id = store
            .add(AddMemory::new("a fact").confidence(3.5))
            .await?;
        assert_eq!(store.get(id).unwrap().confidence, 1.0);

        store
            .update(
                id,
                MemoryUpdate {
                    confidence: Some(-0.3),
                    ..Default::default()
                },
                None,
            )
            .await?;
        assert_eq!(store.get(id).unwrap().confidence, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn identity_content_update_preserves_embedding_bytes() -> Result<()> {
        let store = store();
        let id = store.add(AddMemory::new("the user prefers rust")).await?;
        let before = store.get(id).unwrap().embedding;

        store
            .update(
                id,
                MemoryUpdate {
                    content: Some("the user prefers rust".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await?;

        assert_eq!(store.get(id).unwrap().embedding, before);
        Ok(())
    }

    #[tokio::test]
    async fn content_change_regenerates_embedding() -> Result<()> {
        let store = store();
        let id = store.add(AddMemory::new("original fact")).await?;
        let before = store.get(id).unwrap().embedding;

        store
            .update(
                id,
                MemoryUpdate {
                    content: Some("entirely different statement".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await?;

        assert_ne!(store.get(id).unwrap().embedding, before);
        Ok(())
    }

    #[tokio::test]
    async fn delete_cascades_entity_links() -> Result<()> {
        let store = store();
        let memory_id = store.add(AddMemory::new("studies torah weekly")).await?;
        let entity_id = store.add_entity("Torah", EntityType::Concept)?;
        store.link(memory_id, entity_id, "about")?;
        assert_eq!(store.link_count(memory_id), 1);

        assert!(store.delete(memory_id, None).await?);
        assert_eq!(store.link_count(memory_id), 0);
        Ok(())
    }

    #[tokio::test]
    async fn ownership_check_blocks_foreign_updates_and_deletes() -> Result<()> {
        let store = store();
        let id = store.add(AddMemory::new("private fact").user(1)).await?;

        assert!(
            !store
                .update(
                    id,
                    MemoryUpdate {
                        category: Some("hijacked".to_string()),
                        ..Default::default()
                    },
                    Some(2),
                )
                .await?
        );
        assert!(!store.delete(id, Some(2)).await?);
        assert!(store.delete(id, Some(1)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn global_memories_are_visible_to_every_user() -> Result<()> {
        let store = store();
        store.add(AddMemory::new("a global fact")).await?;
        store.add(AddMemory::new("user one fact").user(1)).await?;
        store.add(AddMemory::new("user two fact").user(2)).await?;

        let visible = store.list(&MemoryFilter {
            user_id: Some(1),
            ..Default::default()
        });
        assert_eq!(visible.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn add_entity_is_idempotent_on_name_and_type() -> Result<()> {
        let store = store();
        let a = store.add_entity("Ollama", EntityType::Tool)?;
        let b = store.add_entity("Ollama", EntityType::Tool)?;
        assert_eq!(a, b);

        // Same name, different type is a distinct entity.
        let c = store.add_entity("Ollama", EntityType::Project)?;
        assert_ne!(a, c);
        Ok(())
    }

    #[tokio::test]
    async fn by_entity_returns_linked_memories() -> Result<()> {
        let store = store();
        let memory_id = store
            .add(AddMemory::new("building the sage workspace").user(1))
            .await?;
        let other_id = store.add(AddMemory::new("unrelated fact").user(1)).await?;
        let entity_id = store.add_entity("Sage", EntityType::Project)?;
        store.link(memory_id, entity_id, "about")?;

        let connected = store.by_entity("sage", Some(1));
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, memory_id);
        assert_ne!(connected[0].id, other_id);
        Ok(())
    }

    #[tokio::test]
    async fn promote_then_demote_preserves_everything_but_tier_and_updated_at() -> Result<()> {
        let store = store();
        let id = store
            .add(
                AddMemory::new("a promotable fact")
                    .user(1)
                    .confidence(0.7),
            )
            .await?;
        let before = store.get(id).unwrap();

        store.promote_to_core(id, Some(1)).await?;
        assert_eq!(store.get(id).unwrap().tier, MemoryTier::Core);

        store.demote_from_core(id, Some(1)).await?;
        let after = store.get(id).unwrap();

        assert_eq!(after.tier, MemoryTier::LongTerm);
        assert_eq!(after.content, before.content);
        assert_eq!(after.confidence, before.confidence);
        assert_eq!(after.embedding, before.embedding);
        assert_eq!(after.created_at, before.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn promote_fails_when_core_is_full() -> Result<()> {
        let store = store_with_cap(1);
        store
            .add(AddMemory::new("only core").user(1).tier(MemoryTier::Core))
            .await?;
        let id = store.add(AddMemory::new("wants in").user(1)).await?;

        assert!(store.promote_to_core(id, Some(1)).await.is_err());
        assert_eq!(store.get(id).unwrap().tier, MemoryTier::LongTerm);
        Ok(())
    }

    #[tokio::test]
    async fn search_ranks_relevant_memories_first() -> Result<()> {
        let store = store();
        store
            .add(AddMemory::new("the user enjoys mountain hiking on weekends").user(1))
            .await?;
        store
            .add(AddMemory::new("prefers milestone based project plans").user(1))
            .await?;

        let results = store.search("milestone project plan", Some(1), 2).await?;
        assert_eq!(results.len(), 2);
        assert!(results[0].memory.content.contains("milestone"));
        assert!(results[0].score >= results[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn record_access_bumps_batch_counters() -> Result<()> {
        let store = store();
        let a = store.add(AddMemory::new("first")).await?;
        let b = store.add(AddMemory::new("second")).await?;

        store.record_access(&[a, b]);
        store.record_access(&[a]);

        assert_eq!(store.get(a).unwrap().access_count, 2);
        assert_eq!(store.get(b).unwrap().access_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn settings_default_and_update() {
        let store = store();
        let defaults = store.get_settings(Some(9));
        assert!(defaults.auto_save_enabled);
        assert_eq!(defaults.core_cap, 10);

        store.update_settings(
            9,
            SettingsUpdate {
                auto_save_enabled: Some(false),
                ..Default::default()
            },
        );
        assert!(!store.get_settings(Some(9)).auto_save_enabled);
        assert!(!store.should_auto_save("preference", Some(9)));
    }

    #[tokio::test]
    async fn should_auto_save_respects_category_allowlist() {
        let store = store();
        assert!(store.should_auto_save("preference", Some(1)));
        assert!(!store.should_auto_save("humor", Some(1)));
    }

    #[tokio::test]
    async fn stats_counts_by_tier() -> Result<()> {
        let store = store();
        store
            .add(AddMemory::new("core value").user(1).tier(MemoryTier::Core))
            .await?;
        store.add(AddMemory::new("long term fact").user(1)).await?;
        store
            .add(
                AddMemory::new("session note")
                    .user(1)
                    .tier(MemoryTier::Episodic),
            )
            .await?;

        let stats = store.stats(Some(1));
        assert_eq!(stats.core.count, 1);
        assert_eq!(stats.long_term.count, 1);
        assert_eq!(stats.episodic.count, 1);
        assert_eq!(stats.total, 3);
        Ok(())
    }
}
