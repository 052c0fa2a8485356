//! Shared per-turn types for the assistant core.
//!
//! Everything here is transient: a [`RequestContext`] is built by the caller,
//! enriched by the router (memories, retrieved chunks, prior outputs), consumed
//! by agents, and discarded at the end of the turn. Nothing in this crate is
//! persisted.

pub mod agent;
pub mod chunk;
pub mod context;
pub mod intent;
pub mod output;

pub use agent::Agent;
pub use chunk::{Chunk, ChunkOrigin};
pub use context::{ContextMemory, HistoryMessage, RequestContext};
pub use intent::Intent;
pub use output::{
    AgentContent, AgentOutput, Artifact, Citation, Contradiction, KeyFinding, MemoryReport,
    PlannedTask, ProjectPlan, ResearchNotes, TaskKind,
};
