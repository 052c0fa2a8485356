//! Planner: multi-step project orchestration.
//!
//! Breaks a complex writing request into research → draft → review → revise
//! tasks, or asks clarifying questions when the request is genuinely
//! ambiguous. Plans are persisted for the project when one is attached; the
//! planner itself never executes a task.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use sage_core::{
    Agent, AgentOutput, Artifact, Intent, ProjectPlan, RequestContext, TaskKind,
};
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use tracing::{error, info, warn};

use crate::prompt::{extract_json, format_memories};

const SYSTEM_PROMPT: &str = "You are a Project Planner. Your role is to break down complex writing projects into executable pipeline tasks.

## Your Responsibilities
1. Analyze the user's writing request
2. If unclear, ask 1-3 clarifying questions (max)
3. Once you have enough information, create a task pipeline
4. NEVER write the actual content — only plan the steps

## Task Types You Can Plan
- **research**: Gather information on a specific topic → Researcher agent
- **draft**: Write content based on research → Writer agent
- **review**: Present draft for user feedback (no agent, just checkpoint)
- **revise**: Incorporate user edits → Writer agent

## CRITICAL: Output Format
You MUST respond with a JSON object. Do NOT write prose, outlines, or article drafts.

If you need clarification:
{
    \"project_summary\": \"Brief description\",
    \"clarifying_questions\": [\"Question 1\", \"Question 2\"],
    \"tasks\": [],
    \"notes\": \"\"
}

If you have enough information to plan (including when the user has answered your questions):
{
    \"project_summary\": \"Brief description\",
    \"clarifying_questions\": [],
    \"tasks\": [
        {
            \"task_type\": \"research\",
            \"description\": \"What this task should accomplish\",
            \"agent\": \"researcher\",
            \"depends_on\": [],
            \"estimated_scope\": \"brief|moderate|extensive\"
        },
        {
            \"task_type\": \"draft\",
            \"description\": \"Write the article based on research\",
            \"agent\": \"writer\",
            \"depends_on\": [0],
            \"estimated_scope\": \"moderate\"
        }
    ],
    \"notes\": \"Any additional context\"
}

## When to Plan vs When to Ask
- If the conversation history shows you already asked questions AND the user answered them → CREATE TASKS NOW
- If this is a fresh request with clear requirements → CREATE TASKS NOW
- Only ask questions if genuinely unclear AND you haven't asked before

## Guidelines
- Research tasks first, then draft tasks
- Include a review task for user feedback before final revision
- 3-6 tasks is typical; max 8
- Each task gets one agent (researcher OR writer)
- NEVER output an article outline as prose — only JSON task objects";

const MAX_TASKS: usize = 8;

/// A task persisted for later execution.
#[derive(Debug, Clone)]
pub struct StoredTask {
    pub sequence: usize,
    pub task_type: TaskKind,
    pub description: String,
    pub agent: Option<String>,
    pub status: String,
}

/// Where plans are persisted. The real implementation lives with the
/// project datastore; the in-memory one covers wiring and tests.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn pending_tasks(&self, project_id: i64) -> Result<Vec<StoredTask>>;
    async fn save_plan(&self, project_id: i64, plan: &ProjectPlan) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<i64, Vec<StoredTask>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn pending_tasks(&self, project_id: i64) -> Result<Vec<StoredTask>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .get(&project_id)
            .map(|tasks| {
                tasks
                    .iter()
                    .filter(|t| t.status == "pending" || t.status == "active")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_plan(&self, project_id: i64, plan: &ProjectPlan) -> Result<()> {
        let stored: Vec<StoredTask> = plan
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| StoredTask {
                sequence: i + 1,
                task_type: task.task_type,
                description: task.description.clone(),
                agent: task.agent.clone(),
                status: "pending".to_string(),
            })
            .collect();
        self.tasks.lock().unwrap().insert(project_id, stored);
        Ok(())
    }
}

pub struct PlannerAgent {
    gateway: Arc<LlmGateway>,
    tasks: Arc<dyn TaskStore>,
}

impl PlannerAgent {
    pub const NAME: &'static str = "planner";

    pub fn new(gateway: Arc<LlmGateway>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { gateway, tasks }
    }

    fn parse_plan(raw: &str) -> ProjectPlan {
        if let Some(mut plan) = extract_json::<ProjectPlan>(raw) {
            if plan.tasks.len() > MAX_TASKS {
                warn!(count = plan.tasks.len(), "plan exceeds task cap, truncating");
                plan.tasks.truncate(MAX_TASKS);
            }
            return plan;
        }
        warn!("failed to parse planner response as JSON");
        ProjectPlan {
            project_summary: "Could not parse structured plan".to_string(),
            notes: raw.to_string(),
            ..Default::default()
        }
    }

    fn format_questions(plan: &ProjectPlan) -> String {
        let mut out =
            String::from("I need some clarification before I can create a plan:\n\n");
        for (i, question) in plan.clarifying_questions.iter().enumerate() {
            out.push_str(&format!("{}. {question}\n", i + 1));
        }
        out
    }

    fn format_plan(plan: &ProjectPlan, tasks_saved: bool) -> String {
        let mut lines = Vec::new();

        if !plan.project_summary.is_empty() {
            lines.push(format!("Here's the plan for your {}:", plan.project_summary));
            lines.push(String::new());
        }

        for (i, task) in plan.tasks.iter().enumerate() {
            let agent_arrow = task
                .agent
                .as_ref()
                .map(|agent| {
                    let mut label = agent.clone();
                    if let Some(first) = label.get_mut(0..1) {
                        first.make_ascii_uppercase();
                    }
                    format!(" -> {label}")
                })
                .unwrap_or_default();
            lines.push(format!(
                "{}. [{}] {}{agent_arrow}",
                i + 1,
                task.task_type.as_str().to_uppercase(),
                task.description,
            ));
        }
        lines.push(String::new());

        if !plan.notes.is_empty() {
            lines.push(format!("*{}*", plan.notes));
            lines.push(String::new());
        }

        if !plan.tasks.is_empty() {
            if tasks_saved {
                lines.push("Tasks saved to pipeline. **Ready to start step 1?**".to_string());
            } else {
                lines.push("---".to_string());
                lines.push("**This plan needs a project to track progress.**".to_string());
                lines.push(String::new());
                lines.push("Would you like to:".to_string());
                lines.push("- Create a new project for this plan?".to_string());
                lines.push("- Assign it to an existing project?".to_string());
            }
        }

        lines.join("\n")
    }

    fn format_existing_plan(tasks: &[StoredTask]) -> String {
        let mut lines = vec![
            "## Existing Plan in Progress".to_string(),
            String::new(),
            "You have pending tasks for this project:".to_string(),
            String::new(),
        ];
        for task in tasks {
            lines.push(format!(
                "{}. [{}] {} ({})",
                task.sequence,
                task.task_type.as_str().to_uppercase(),
                task.description,
                task.status,
            ));
        }
        lines.push(String::new());
        lines.push(
            "Run the next pending task to continue, or clear the plan to start fresh.".to_string(),
        );
        lines.join("\n")
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _ctx: &RequestContext, intent: Intent) -> bool {
        intent == Intent::Plan
    }

    async fn run(&self, ctx: &RequestContext) -> AgentOutput {
        let started = Instant::now();

        // A project with pending tasks gets the existing plan, not a new one.
        if let Some(project_id) = ctx.project_id {
            match self.tasks.pending_tasks(project_id).await {
                Ok(pending) if !pending.is_empty() => {
                    let mut output =
                        AgentOutput::text(Self::NAME, Self::format_existing_plan(&pending))
                            .finalized();
                    output.processing_ms = started.elapsed().as_millis() as u64;
                    return output;
                }
                Ok(_) => {}
                Err(error) => warn!(project_id, %error, "pending task lookup failed"),
            }
        }

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if !ctx.memories.is_empty() {
            system_prompt.push_str("\n\n## User Preferences\n");
            system_prompt.push_str(&format_memories(&ctx.memories, 5));
        }

        // Recent history lets the planner see answered questions.
        let mut messages = vec![ChatMessage::system(system_prompt)];
        for message in ctx.history.iter().rev().take(10).rev() {
            match message.role.as_str() {
                "user" => messages.push(ChatMessage::user(message.content.clone())),
                "assistant" => messages.push(ChatMessage::assistant(message.content.clone())),
                _ => {}
            }
        }
        messages.push(ChatMessage::user(format!(
            "## Planning Request\n{}\n\nIf you have enough information (including from any previous conversation), output a JSON task plan.\nIf genuinely unclear, ask clarifying questions. Do NOT output prose or article outlines.",
            ctx.user_message
        )));

        let outcome = match self
            .gateway
            .chat(LlmRole::Planner, &messages, &ChatOptions::default())
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "planner agent failed");
                let mut output =
                    AgentOutput::text(Self::NAME, format!("Error creating plan: {err}"))
                        .finalized();
                output.error = Some(err.to_string());
                output.processing_ms = started.elapsed().as_millis() as u64;
                return output;
            }
        };

        let plan = Self::parse_plan(&outcome.text);

        // Clarifying questions short-circuit: no tasks are persisted.
        if plan.needs_clarification() {
            let mut output =
                AgentOutput::text(Self::NAME, Self::format_questions(&plan)).finalized();
            output.artifacts = vec![Artifact::ClarifyingQuestions(
                plan.clarifying_questions.clone(),
            )];
            output.tokens_used = outcome.tokens_used;
            output.provider_used = Some(outcome.provider);
            output.model_used = Some(outcome.model);
            output.processing_ms = started.elapsed().as_millis() as u64;
            return output;
        }

        let mut tasks_saved = false;
        if !plan.tasks.is_empty() {
            if let Some(project_id) = ctx.project_id {
                match self.tasks.save_plan(project_id, &plan).await {
                    Ok(()) => {
                        tasks_saved = true;
                        info!(project_id, tasks = plan.tasks.len(), "pipeline tasks saved");
                    }
                    Err(error) => warn!(project_id, %error, "failed to save pipeline tasks"),
                }
            }
        }

        let mut output =
            AgentOutput::text(Self::NAME, Self::format_plan(&plan, tasks_saved)).finalized();
        output.artifacts = vec![Artifact::ProjectPlan(plan)];
        output.tokens_used = outcome.tokens_used;
        output.provider_used = Some(outcome.provider);
        output.model_used = Some(outcome.model);
        output.processing_ms = started.elapsed().as_millis() as u64;
        output
    }
}

#[cfg(test)]
mod tests {
    use sage_core::PlannedTask;

    use super::*;

    #[test]
    fn parse_plan_truncates_to_task_cap() {
        let tasks: Vec<String> = (0..12)
            .map(|i| {
                format!(
                    r#"{{"task_type": "research", "description": "t{i}", "agent": "researcher", "depends_on": [], "estimated_scope": "brief"}}"#
                )
            })
            .collect();
        let raw = format!(
            r#"{{"project_summary": "big", "clarifying_questions": [], "tasks": [{}], "notes": ""}}"#,
            tasks.join(",")
        );
        let plan = PlannerAgent::parse_plan(&raw);
        assert_eq!(plan.tasks.len(), 8);
    }

    #[test]
    fn parse_plan_falls_back_to_notes() {
        let plan = PlannerAgent::parse_plan("Sure! First you should research, then draft.");
        assert!(plan.tasks.is_empty());
        assert!(plan.notes.contains("research"));
    }

    #[test]
    fn question_formatting_numbers_each_question() {
        let plan = ProjectPlan {
            clarifying_questions: vec!["Audience?".to_string(), "Length?".to_string()],
            ..Default::default()
        };
        let text = PlannerAgent::format_questions(&plan);
        assert!(text.contains("1. Audience?"));
        assert!(text.contains("2. Length?"));
    }

    #[test]
    fn plan_formatting_marks_saved_and_unsaved_states() {
        let plan = ProjectPlan {
            project_summary: "article on covenant themes".to_string(),
            tasks: vec![PlannedTask {
                task_type: TaskKind::Research,
                description: "Gather sources".to_string(),
                agent: Some("researcher".to_string()),
                depends_on: vec![],
                estimated_scope: "moderate".to_string(),
            }],
            ..Default::default()
        };

        let saved = PlannerAgent::format_plan(&plan, true);
        assert!(saved.contains("Ready to start step 1?"));
        assert!(saved.contains("[RESEARCH] Gather sources -> Researcher"));

        let unsaved = PlannerAgent::format_plan(&plan, false);
        assert!(unsaved.contains("needs a project"));
    }

    #[tokio::test]
    async fn in_memory_task_store_round_trips_pending_tasks() -> Result<()> {
        let store = InMemoryTaskStore::new();
        let plan = ProjectPlan {
            tasks: vec![
                PlannedTask {
                    task_type: TaskKind::Research,
                    description: "research step".to_string(),
                    agent: Some("researcher".to_string()),
                    depends_on: vec![],
                    estimated_scope: "brief".to_string(),
                },
                PlannedTask {
                    task_type: TaskKind::Draft,
                    description: "draft step".to_string(),
                    agent: Some("writer".to_string()),
                    depends_on: vec![0],
                    estimated_scope: "moderate".to_string(),
                },
            ],
            ..Default::default()
        };

        store.save_plan(7, &plan).await?;
        let pending = store.pending_tasks(7).await?;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].sequence, 1);
        assert_eq!(pending[1].task_type, TaskKind::Draft);
        assert!(store.pending_tasks(8).await?.is_empty());
        Ok(())
    }
}
