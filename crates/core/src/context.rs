use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::output::AgentOutput;

/// One prior message in the conversation, newest last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A memory selected for injection into the current turn.
///
/// A flattened view of whatever the memory store holds; agents only need
/// the category and content, the id is kept for trace correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMemory {
    pub id: i64,
    pub category: String,
    pub content: String,
    pub tier: String,
}

/// Everything an agent needs to do its job for one turn.
///
/// Created by the caller, enriched by the router before and during pipeline
/// execution, never persisted.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_message: String,
    pub conversation_id: Option<i64>,
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Prior role/content pairs, newest last.
    pub history: Vec<HistoryMessage>,
    /// Filled by the router from the memory store.
    pub memories: Vec<ContextMemory>,
    /// Filled by the router from the retrieval coordinator.
    pub retrieved_chunks: Vec<Chunk>,
    /// Pre-formatted scripture context supplied by the caller.
    pub scripture_context: Option<String>,
    /// Pre-formatted library context supplied by the caller.
    pub library_context: Option<String>,
    /// Pre-formatted project-file context supplied by the caller.
    pub project_files_context: Option<String>,
    /// Outputs of agents that already ran this turn, in execution order.
    pub prior_outputs: Vec<AgentOutput>,
    /// Selected mode, "Auto" unless the caller picked one.
    pub mode: String,
    /// Textual-study profile declared for this conversation, if any.
    pub study_profile: Option<String>,
    /// Extra system-prompt directives injected by the router (overlay frame
    /// challenges, profile directives). Agents append this verbatim.
    pub system_addition: Option<String>,
}

impl RequestContext {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            mode: "Auto".to_string(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_conversation(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::RequestContext;

    #[test]
    fn new_context_defaults_to_auto_mode() {
        let ctx = RequestContext::new("hello");
        assert_eq!(ctx.mode, "Auto");
        assert!(ctx.prior_outputs.is_empty());
        assert!(ctx.retrieved_chunks.is_empty());
    }
}
