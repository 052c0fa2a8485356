//! Deterministic gates.
//!
//! A small set of patterns answered from trusted data with no LLM anywhere
//! near the path. A gate only fires when the injected source can actually
//! answer; otherwise the turn falls through to classification.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

/// Trusted data the caller exposes for deterministic answers.
pub trait DeterministicSource: Send + Sync {
    fn task_count(&self, user_id: Option<i64>) -> Option<usize>;
    fn reminder_count(&self, user_id: Option<i64>) -> Option<usize>;
    fn file_count(&self, project_id: Option<i64>) -> Option<usize>;
    /// Resolve a drawing/part reference to a description.
    fn drawing_lookup(&self, reference: &str) -> Option<String>;
}

/// A fired gate: the response plus the query type for downstream
/// classification.
#[derive(Debug, Clone)]
pub struct GateResponse {
    pub content: String,
    /// "count" | "list" | "status", fed to the epistemic classifier.
    pub query_type: String,
}

pub struct DeterministicGates {
    source: Option<Arc<dyn DeterministicSource>>,
    how_many: Regex,
    list_items: Regex,
    drawing: Regex,
}

impl DeterministicGates {
    pub fn new(source: Option<Arc<dyn DeterministicSource>>) -> Self {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("gate pattern compiles")
        };
        Self {
            source,
            how_many: build(r"\bhow many (tasks|reminders|files)\b"),
            list_items: build(r"\blist (?:my )?(tasks|reminders)\b"),
            drawing: build(r"\b(?:drawing|dwg|part)\s*(?:number|#|num)?\s*[:=]?\s*([A-Z0-9][A-Z0-9-]+)"),
        }
    }

    /// Check the message against the gate patterns. `Some` bypasses
    /// classification, retrieval, and all LLMs.
    pub fn check(
        &self,
        message: &str,
        user_id: Option<i64>,
        project_id: Option<i64>,
    ) -> Option<GateResponse> {
        let source = self.source.as_ref()?;

        if let Some(caps) = self.how_many.captures(message) {
            let subject = caps.get(1)?.as_str().to_lowercase();
            let count = match subject.as_str() {
                "tasks" => source.task_count(user_id),
                "reminders" => source.reminder_count(user_id),
                "files" => source.file_count(project_id),
                _ => None,
            }?;
            let content = match subject.as_str() {
                "files" => format!("There are {count} files in this project."),
                _ => format!("You have {count} {subject}."),
            };
            return Some(GateResponse {
                content,
                query_type: "count".to_string(),
            });
        }

        if let Some(caps) = self.list_items.captures(message) {
            let subject = caps.get(1)?.as_str().to_lowercase();
            let count = match subject.as_str() {
                "tasks" => source.task_count(user_id),
                "reminders" => source.reminder_count(user_id),
                _ => None,
            }?;
            return Some(GateResponse {
                content: format!("You have {count} {subject}."),
                query_type: "list".to_string(),
            });
        }

        if let Some(caps) = self.drawing.captures(message) {
            let reference = caps.get(1)?.as_str();
            let description = source.drawing_lookup(reference)?;
            return Some(GateResponse {
                content: description,
                query_type: "status".to_string(),
            });
        }

        None
    }
}
