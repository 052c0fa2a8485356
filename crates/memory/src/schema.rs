use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    Core,
    LongTerm,
    Episodic,
}

impl MemoryTier {
    pub fn slug(&self) -> &'static str {
        match self {
            MemoryTier::Core => "core",
            MemoryTier::LongTerm => "long_term",
            MemoryTier::Episodic => "episodic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "core" => Some(MemoryTier::Core),
            "long_term" => Some(MemoryTier::LongTerm),
            "episodic" => Some(MemoryTier::Episodic),
            _ => None,
        }
    }

    /// Sort rank for listing: core first.
    pub fn rank(&self) -> u8 {
        match self {
            MemoryTier::Core => 0,
            MemoryTier::LongTerm => 1,
            MemoryTier::Episodic => 2,
        }
    }
}

/// How a memory came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    Manual,
    Auto,
}

/// One persisted memory.
///
/// Logical schema of the `memories` table. `user_id = None` means global,
/// visible to every user. The embedding is regenerated atomically whenever
/// the content changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub user_id: Option<i64>,
    pub category: String,
    pub content: String,
    pub tier: MemoryTier,
    /// Clamped to [0.0, 1.0] on every write.
    pub confidence: f32,
    pub access_count: u32,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: MemorySource,
    /// Compressed summary written by consolidation, if any.
    pub summary: Option<String>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A memory with its relevance scores from semantic search.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    /// Raw cosine similarity.
    pub raw_score: f32,
    /// Cosine adjusted by the decay rule.
    pub score: f32,
}

/// Entity types in the memory graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Project,
    Tool,
    Concept,
    Organization,
}

impl EntityType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "person" => Some(EntityType::Person),
            "project" => Some(EntityType::Project),
            "tool" => Some(EntityType::Tool),
            "concept" => Some(EntityType::Concept),
            "organization" => Some(EntityType::Organization),
            _ => None,
        }
    }
}

/// A node in the entity graph. Idempotent on (name, type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub entity_type: EntityType,
}

/// Per-user memory governance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    pub auto_save_enabled: bool,
    pub auto_save_categories: Vec<String>,
    pub core_cap: usize,
}

impl MemorySettings {
    pub fn defaults(core_cap: usize) -> Self {
        Self {
            auto_save_enabled: true,
            auto_save_categories: [
                "identity",
                "preference",
                "project",
                "theology",
                "engineering",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            core_cap,
        }
    }
}

/// Per-tier aggregate numbers for the stats surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    pub count: usize,
    pub avg_confidence: f32,
    pub avg_access_count: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub core: TierStats,
    pub long_term: TierStats,
    pub episodic: TierStats,
    pub total: usize,
    pub entities: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_slugs_round_trip() {
        for tier in [MemoryTier::Core, MemoryTier::LongTerm, MemoryTier::Episodic] {
            assert_eq!(MemoryTier::parse(tier.slug()), Some(tier));
        }
        assert_eq!(MemoryTier::parse("working"), None);
    }

    #[test]
    fn core_ranks_first() {
        assert!(MemoryTier::Core.rank() < MemoryTier::LongTerm.rank());
        assert!(MemoryTier::LongTerm.rank() < MemoryTier::Episodic.rank());
    }

    #[test]
    fn entity_type_parse_is_case_insensitive() {
        assert_eq!(EntityType::parse("Person"), Some(EntityType::Person));
        assert_eq!(EntityType::parse("TOOL"), Some(EntityType::Tool));
        assert_eq!(EntityType::parse("widget"), None);
    }
}
