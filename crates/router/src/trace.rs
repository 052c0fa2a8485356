use std::collections::BTreeMap;

use serde::Serialize;

/// Debug/audit trace for one routing decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteTrace {
    pub trace_id: String,
    /// "deterministic" | "llm_single" | "agent_pipeline".
    pub route_type: String,
    pub intents_detected: Vec<String>,
    /// "heuristic" | "local_llm" | "local_llm_cache" | "none".
    pub intent_source: String,
    pub agent_sequence: Vec<String>,
    /// Provider of the last agent that actually used an LLM.
    pub provider_used: String,
    pub model_used: String,
    pub retrieval_used: bool,
    pub retrieval_count: usize,
    pub timing_ms: BTreeMap<String, u64>,
    pub errors: Vec<String>,
    /// Overlay warnings (harmonization, comfort-softening).
    pub warnings: Vec<String>,
}

impl RouteTrace {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            route_type: "unknown".to_string(),
            intent_source: "none".to_string(),
            ..Default::default()
        }
    }

    pub fn record_timing(&mut self, step: &str, ms: u64) {
        self.timing_ms.insert(step.to_string(), ms);
    }
}
