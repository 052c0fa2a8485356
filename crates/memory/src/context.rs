//! Context selection for turn injection.
//!
//! Selection order is fixed: every core memory first (up to the per-user
//! cap), then up to 8 long-term memories over the relevance threshold, then
//! up to 3 episodic memories over a lower threshold, stopping at the overall
//! cap. Every returned memory gets its access recorded.

use anyhow::Result;

use crate::schema::{Memory, MemoryTier};
use crate::store::MemoryStore;

#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    pub max_total: usize,
    pub max_long_term: usize,
    pub max_episodic: usize,
    pub long_term_threshold: f32,
    pub episodic_threshold: f32,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_total: 15,
            max_long_term: 8,
            max_episodic: 3,
            long_term_threshold: 0.20,
            episodic_threshold: 0.15,
        }
    }
}

impl From<&sage_config::MemoryConfig> for ContextLimits {
    fn from(config: &sage_config::MemoryConfig) -> Self {
        Self {
            max_total: config.max_context_memories,
            max_long_term: config.max_long_term_memories,
            max_episodic: config.max_episodic_memories,
            long_term_threshold: config.long_term_threshold,
            episodic_threshold: config.episodic_threshold,
        }
    }
}

impl MemoryStore {
    /// Select memories to inject into the current turn.
    pub async fn memories_for_context(
        &self,
        message: &str,
        user_id: Option<i64>,
        limits: &ContextLimits,
    ) -> Result<Vec<Memory>> {
        let mut selected: Vec<Memory> = Vec::new();
        let mut included: Vec<i64> = Vec::new();

        // 1. Every core memory, up to the per-user cap.
        let core_cap = self.get_settings(user_id).core_cap;
        for memory in self
            .get_by_tier(user_id, MemoryTier::Core)
            .into_iter()
            .take(core_cap)
        {
            if selected.len() >= limits.max_total {
                break;
            }
            included.push(memory.id);
            selected.push(memory);
        }

        if selected.len() >= limits.max_total || message.trim().is_empty() {
            self.record_access(&included);
            return Ok(selected);
        }

        // 2. Relevant long-term memories over the threshold.
        let candidates = self
            .search(message, user_id, limits.max_long_term + 5)
            .await?;
        let mut long_term_added = 0;
        for scored in &candidates {
            if scored.memory.tier != MemoryTier::LongTerm
                || included.contains(&scored.memory.id)
                || scored.score < limits.long_term_threshold
            {
                continue;
            }
            included.push(scored.memory.id);
            selected.push(scored.memory.clone());
            long_term_added += 1;
            if long_term_added >= limits.max_long_term || selected.len() >= limits.max_total {
                break;
            }
        }

        if selected.len() >= limits.max_total {
            self.record_access(&included);
            return Ok(selected);
        }

        // 3. Recent episodic context over the lower threshold.
        let candidates = self
            .search(message, user_id, limits.max_episodic + 3)
            .await?;
        let mut episodic_added = 0;
        for scored in &candidates {
            if scored.memory.tier != MemoryTier::Episodic
                || included.contains(&scored.memory.id)
                || scored.score < limits.episodic_threshold
            {
                continue;
            }
            included.push(scored.memory.id);
            selected.push(scored.memory.clone());
            episodic_added += 1;
            if episodic_added >= limits.max_episodic || selected.len() >= limits.max_total {
                break;
            }
        }

        self.record_access(&included);
        Ok(selected)
    }
}

/// Format selected memories for system-prompt injection, partitioned into an
/// always-remember block (core) and tagged relevant context (everything
/// else).
pub fn format_for_prompt(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let mut lines = vec!["## What You Know About the User".to_string(), String::new()];

    let core: Vec<&Memory> = memories
        .iter()
        .filter(|m| m.tier == MemoryTier::Core)
        .collect();
    let others: Vec<&Memory> = memories
        .iter()
        .filter(|m| m.tier != MemoryTier::Core)
        .collect();

    if !core.is_empty() {
        lines.push("**Always remember:**".to_string());
        for memory in &core {
            lines.push(format!("- {}", memory.content));
        }
        lines.push(String::new());
    }

    if !others.is_empty() {
        lines.push("**Relevant context:**".to_string());
        for memory in &others {
            lines.push(format!("- [{}] {}", memory.category, memory.content));
        }
    }

    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sage_embed::HashEmbedder;

    use super::*;
    use crate::store::AddMemory;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(HashEmbedder::default()),
            &sage_config::MemoryConfig::default(),
        )
    }

    #[tokio::test]
    async fn core_memories_come_before_any_non_core() -> Result<()> {
        let store = store();
        store
            .add(
                AddMemory::new("user name is Chuck")
                    .user(1)
                    .tier(MemoryTier::Core),
            )
            .await?;
        store
            .add(
                AddMemory::new("prefers milestone based project plans")
                    .user(1)
                    .confidence(0.9),
            )
            .await?;

        let memories = store
            .memories_for_context("milestone project plans", Some(1), &ContextLimits::default())
            .await?;

        let first_non_core = memories
            .iter()
            .position(|m| m.tier != MemoryTier::Core)
            .unwrap_or(memories.len());
        let last_core = memories
            .iter()
            .rposition(|m| m.tier == MemoryTier::Core)
            .unwrap_or(0);
        assert!(last_core < first_non_core || first_non_core == memories.len());
        assert_eq!(memories[0].tier, MemoryTier::Core);
        Ok(())
    }

    #[tokio::test]
    async fn selection_respects_overall_cap() -> Result<()> {
        let store = store();
        for i in 0..20 {
            store
                .add(
                    AddMemory::new(format!("milestone project planning fact number {i}"))
                        .user(1)
                        .confidence(0.9),
                )
                .await?;
        }

        let limits = ContextLimits {
            max_total: 5,
            ..Default::default()
        };
        let memories = store
            .memories_for_context("milestone project planning", Some(1), &limits)
            .await?;
        assert!(memories.len() <= 5);
        Ok(())
    }

    #[tokio::test]
    async fn empty_message_returns_core_only() -> Result<()> {
        let store = store();
        store
            .add(AddMemory::new("core identity").user(1).tier(MemoryTier::Core))
            .await?;
        store
            .add(AddMemory::new("some long term fact").user(1))
            .await?;

        let memories = store
            .memories_for_context("", Some(1), &ContextLimits::default())
            .await?;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].tier, MemoryTier::Core);
        Ok(())
    }

    #[tokio::test]
    async fn selection_records_access_on_returned_ids() -> Result<()> {
        let store = store();
        let id = store
            .add(AddMemory::new("core value").user(1).tier(MemoryTier::Core))
            .await?;

        store
            .memories_for_context("anything", Some(1), &ContextLimits::default())
            .await?;

        assert_eq!(store.get(id).unwrap().access_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn low_scoring_memories_stay_out_of_context() -> Result<()> {
        let store = store();
        store
            .add(
                AddMemory::new("completely unrelated topic about gardening tulips")
                    .user(1)
                    .confidence(0.1),
            )
            .await?;

        let memories = store
            .memories_for_context(
                "rust async runtime scheduling",
                Some(1),
                &ContextLimits::default(),
            )
            .await?;
        assert!(memories.is_empty());
        Ok(())
    }

    #[test]
    fn prompt_block_partitions_core_and_tagged_context() {
        use chrono::Utc;
        use crate::schema::{Memory, MemorySource};

        let make = |tier, category: &str, content: &str| Memory {
            id: 1,
            user_id: Some(1),
            category: category.to_string(),
            content: content.to_string(),
            tier,
            confidence: 0.8,
            access_count: 0,
            last_accessed: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            source: MemorySource::Manual,
            summary: None,
            embedding: Vec::new(),
        };

        let block = format_for_prompt(&[
            make(MemoryTier::Core, "identity", "name is Chuck"),
            make(MemoryTier::LongTerm, "preference", "prefers concise answers"),
        ]);

        assert!(block.contains("**Always remember:**"));
        assert!(block.contains("- name is Chuck"));
        assert!(block.contains("**Relevant context:**"));
        assert!(block.contains("- [preference] prefers concise answers"));
    }

    #[test]
    fn prompt_block_is_empty_for_no_memories() {
        assert_eq!(format_for_prompt(&[]), "");
    }
}
