//! Tiered long-term memory.
//!
//! Three tiers with different lifecycles:
//!
//! - **Core**: always injected into context (identity, values); capped per
//!   user, never decays.
//! - **Long-term**: searchable knowledge subject to slow decay (180-day
//!   half-life).
//! - **Episodic**: session context that fades fast (14-day half-life).
//!
//! The store owns the logical schema (memories, entities, entity links,
//! per-user settings) and serializes all mutation behind one lock. Memory
//! failures are logged by callers and never fail a turn.

pub mod context;
pub mod decay;
pub mod schema;
pub mod store;

pub use context::{format_for_prompt, ContextLimits};
pub use decay::{decayed_score, DecayParams};
pub use schema::{
    Entity, EntityType, Memory, MemorySettings, MemorySource, MemoryStats, MemoryTier,
    ScoredMemory, TierStats,
};
pub use store::{AddMemory, MemoryFilter, MemoryStore, MemoryUpdate, SettingsUpdate};
