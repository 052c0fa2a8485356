use serde::{Deserialize, Serialize};

/// A source reference for a claim or piece of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Citation {
    pub file_id: Option<i64>,
    pub filename: Option<String>,
    pub chunk_index: Option<usize>,
    pub page: Option<u32>,
    /// Excerpt of the cited text, truncated to 200 characters on construction.
    pub snippet: String,
    pub relevance_score: Option<f32>,
}

impl Citation {
    /// Build a citation, truncating the snippet to 200 characters.
    pub fn new(snippet: impl Into<String>) -> Self {
        let snippet: String = snippet.into().chars().take(200).collect();
        Self {
            snippet,
            ..Default::default()
        }
    }
}

/// One finding in a researcher's structured notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyFinding {
    pub finding: String,
    #[serde(default)]
    pub source: String,
    /// "high" | "medium" | "low" as reported by the model.
    #[serde(default)]
    pub confidence: String,
}

/// A contradiction or tension between sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contradiction {
    pub issue: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Structured research notes produced by the researcher agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchNotes {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<KeyFinding>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<Contradiction>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub recommended_structure: Vec<String>,
}

/// The kind of work a planned task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Research,
    Draft,
    Review,
    Revise,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Research => "research",
            TaskKind::Draft => "draft",
            TaskKind::Review => "review",
            TaskKind::Revise => "revise",
        }
    }
}

/// One entry in a project plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task_type: TaskKind,
    pub description: String,
    /// "researcher" | "writer", or `None` for checkpoint tasks.
    #[serde(default)]
    pub agent: Option<String>,
    /// Indices of tasks this one depends on.
    #[serde(default)]
    pub depends_on: Vec<usize>,
    #[serde(default)]
    pub estimated_scope: String,
}

/// A task plan (or a request for clarification) produced by the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPlan {
    #[serde(default)]
    pub project_summary: String,
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
    #[serde(default)]
    pub notes: String,
}

impl ProjectPlan {
    pub fn needs_clarification(&self) -> bool {
        !self.clarifying_questions.is_empty()
    }
}

/// Summary of memory changes made by the archivist this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MemoryReport {
    /// An explicit "remember ..." command was stored.
    Stored {
        id: i64,
        content: String,
        category: String,
        tier: String,
    },
    /// An explicit "forget ..." command removed matching memories.
    Forgotten { ids: Vec<i64> },
    /// Nothing could be done with the command.
    NoAction { reason: String },
    /// Background analysis ran; counts of applied operations.
    Analysis {
        stored: Vec<i64>,
        updated: Vec<i64>,
        forgotten: Vec<i64>,
        consolidations: usize,
        analysis: String,
    },
}

/// Agent output payload, tagged so the composer can dispatch without
/// inspecting shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentContent {
    Text(String),
    Research(ResearchNotes),
    Plan(ProjectPlan),
    MemoryReport(MemoryReport),
}

impl AgentContent {
    /// The user-facing text, if this content is plain prose.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AgentContent::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A storable object produced alongside the main content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Artifact {
    ResearchNotes(ResearchNotes),
    Draft {
        content: String,
        output_type: String,
        word_count: usize,
    },
    Code {
        language: String,
        content: String,
        filepath: Option<String>,
    },
    ProjectPlan(ProjectPlan),
    ClarifyingQuestions(Vec<String>),
}

/// Structured output from an agent.
///
/// Agents return this; the router decides what to do with it: pass it to
/// the next agent, store artifacts, or surface it to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: String,
    pub content: AgentContent,
    /// True if the content is ready for user display as-is.
    pub is_final: bool,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub tokens_used: u32,
    #[serde(default)]
    pub processing_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub provider_used: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
}

impl AgentOutput {
    pub fn text(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(agent, AgentContent::Text(content.into()))
    }

    pub fn new(agent: impl Into<String>, content: AgentContent) -> Self {
        Self {
            agent: agent.into(),
            content,
            is_final: false,
            artifacts: Vec::new(),
            citations: Vec::new(),
            tokens_used: 0,
            processing_ms: 0,
            error: None,
            provider_used: None,
            model_used: None,
        }
    }

    pub fn finalized(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_snippet_is_truncated_to_200_chars() {
        let long = "x".repeat(500);
        let citation = Citation::new(long);
        assert_eq!(citation.snippet.chars().count(), 200);
    }

    #[test]
    fn agent_content_dispatches_on_tag() {
        let text = AgentContent::Text("hello".to_string());
        assert_eq!(text.as_text(), Some("hello"));

        let research = AgentContent::Research(ResearchNotes::default());
        assert!(research.as_text().is_none());
    }

    #[test]
    fn project_plan_with_questions_needs_clarification() {
        let plan = ProjectPlan {
            clarifying_questions: vec!["Which audience?".to_string()],
            ..Default::default()
        };
        assert!(plan.needs_clarification());
        assert!(!ProjectPlan::default().needs_clarification());
    }

    #[test]
    fn planned_task_deserializes_from_llm_json() {
        let raw = r#"{
            "task_type": "research",
            "description": "Gather sources on covenant themes",
            "agent": "researcher",
            "depends_on": [],
            "estimated_scope": "moderate"
        }"#;
        let task: PlannedTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.task_type, TaskKind::Research);
        assert_eq!(task.agent.as_deref(), Some("researcher"));
    }
}
