//! The five agents.
//!
//! Each one is a stateless processor behind the two-method
//! [`sage_core::Agent`] contract: it reads the request context, talks to the
//! gateway under its own role, and returns one structured output. Agents
//! never invoke each other and never decide routing; the router owns the
//! pipeline.

pub mod archivist;
pub mod engineer;
pub mod planner;
pub mod prompt;
pub mod researcher;
pub mod writer;

pub use archivist::ArchivistAgent;
pub use engineer::EngineerAgent;
pub use planner::{InMemoryTaskStore, PlannerAgent, StoredTask, TaskStore};
pub use researcher::ResearcherAgent;
pub use writer::WriterAgent;
