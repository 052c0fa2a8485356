//! The per-turn orchestrator.
//!
//! One entry point: [`Router::handle_turn`]. Deterministic gates run first
//! and bypass everything; otherwise the turn is classified, an agent
//! sequence is selected, retrieval and memory context are injected, agents
//! execute in order, and the composed response passes through the epistemic
//! pipeline (and the hermeneutic overlay when the conversation declares a
//! profile) before returning. The router is single-threaded per turn;
//! concurrent turns share only the classification cache and the memory
//! store, both internally synchronized.

pub mod compose;
pub mod detect;
pub mod gates;
pub mod router;
pub mod trace;

pub use gates::{DeterministicGates, DeterministicSource, GateResponse};
pub use router::{HandledBy, Router, RouterResult};
pub use trace::RouteTrace;
