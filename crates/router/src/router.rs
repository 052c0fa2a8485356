//! Router construction and the turn algorithm.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use sage_agents::{
    ArchivistAgent, EngineerAgent, PlannerAgent, ResearcherAgent, TaskStore, WriterAgent,
};
use sage_config::AppConfig;
use sage_core::{Agent, AgentContent, AgentOutput, Citation, ContextMemory, Intent, RequestContext};
use sage_epistemic::{EpistemicMetadata, EpistemicPipeline, EpistemicRules, SessionContext};
use sage_intent::IntentClassifier;
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use sage_memory::{ContextLimits, MemoryStore};
use sage_overlay::HermeneuticOverlay;
use sage_retrieval::RetrievalCoordinator;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compose::{append_citations, format_memory_report, format_research};
use crate::detect::{ProjectReferenceDetector, ScholarlyDetector};
use crate::gates::{DeterministicGates, DeterministicSource};
use crate::trace::RouteTrace;

/// How a turn was ultimately handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledBy {
    Deterministic,
    /// Empty content: the caller should run its legacy single-LLM flow.
    LlmSinglePassthrough,
    AgentPipeline,
    Error,
}

impl HandledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandledBy::Deterministic => "deterministic",
            HandledBy::LlmSinglePassthrough => "llm_single_passthrough",
            HandledBy::AgentPipeline => "agent_pipeline",
            HandledBy::Error => "error",
        }
    }
}

/// What a turn returns to the caller.
#[derive(Debug, Clone)]
pub struct RouterResult {
    /// Final processed text. Empty signals "use the legacy single-LLM flow".
    pub content: String,
    pub agent_outputs: Vec<AgentOutput>,
    pub citations: Vec<Citation>,
    pub trace: Option<RouteTrace>,
    pub handled_by: HandledBy,
    pub epistemic: Option<EpistemicMetadata>,
}

/// Process-wide warm-up latch: the classification model is warmed once per
/// process, on first router construction.
static MODEL_WARMED: AtomicBool = AtomicBool::new(false);

pub struct Router {
    gateway: Arc<LlmGateway>,
    memory: Arc<MemoryStore>,
    retrieval: RetrievalCoordinator,
    classifier: IntentClassifier,
    agents: HashMap<&'static str, Arc<dyn Agent>>,
    epistemic: EpistemicPipeline,
    overlay: Option<Arc<HermeneuticOverlay>>,
    gates: DeterministicGates,
    scholarly: ScholarlyDetector,
    project_refs: ProjectReferenceDetector,
    limits: ContextLimits,
    /// Overall per-turn budget; the anchor step is skipped when the turn is
    /// already close to it.
    turn_budget: Duration,
    anchor_reserve: Duration,
}

impl Router {
    pub fn new(
        gateway: Arc<LlmGateway>,
        memory: Arc<MemoryStore>,
        retrieval: RetrievalCoordinator,
        tasks: Arc<dyn TaskStore>,
        config: &AppConfig,
    ) -> Self {
        let mut agents: HashMap<&'static str, Arc<dyn Agent>> = HashMap::new();
        agents.insert(
            ResearcherAgent::NAME,
            Arc::new(ResearcherAgent::new(gateway.clone())),
        );
        agents.insert(
            WriterAgent::NAME,
            Arc::new(WriterAgent::new(gateway.clone())),
        );
        agents.insert(
            EngineerAgent::NAME,
            Arc::new(EngineerAgent::new(gateway.clone())),
        );
        agents.insert(
            PlannerAgent::NAME,
            Arc::new(PlannerAgent::new(gateway.clone(), tasks)),
        );
        agents.insert(
            ArchivistAgent::NAME,
            Arc::new(ArchivistAgent::new(gateway.clone(), memory.clone())),
        );

        let rules = Arc::new(EpistemicRules::load_or_default(&config.epistemic.rules_path));
        let classifier =
            IntentClassifier::new(Some(gateway.clone()), config.classifier.cache_capacity);

        let router = Self {
            classifier,
            agents,
            epistemic: EpistemicPipeline::new(rules.clone()),
            overlay: None,
            gates: DeterministicGates::new(None),
            scholarly: ScholarlyDetector::new(),
            project_refs: ProjectReferenceDetector::new(),
            limits: ContextLimits::from(&config.memory),
            turn_budget: Duration::from_secs(120),
            anchor_reserve: Duration::from_millis(rules.anchor_settings.deep_budget_ms),
            retrieval,
            memory,
            gateway,
        };
        router.warm_classifier();
        router
    }

    pub fn with_overlay(mut self, overlay: Arc<HermeneuticOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_deterministic_source(mut self, source: Arc<dyn DeterministicSource>) -> Self {
        self.gates = DeterministicGates::new(Some(source));
        self
    }

    pub fn with_turn_budget(mut self, budget: Duration) -> Self {
        self.turn_budget = budget;
        self
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Fire the one-shot classification warm-up in the background so the
    /// first real turn doesn't pay the model load.
    fn warm_classifier(&self) {
        if MODEL_WARMED.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.gateway.is_available() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let gateway = self.gateway.clone();
        handle.spawn(async move {
            let started = Instant::now();
            let result = gateway
                .chat(
                    LlmRole::Classifier,
                    &[ChatMessage::user("Classify: hello")],
                    &ChatOptions::default().with_temperature(0.1),
                )
                .await;
            match result {
                Ok(_) => info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "classification model warmed"
                ),
                Err(error) => warn!(%error, "failed to warm classification model"),
            }
        });
    }

    /// Handle one turn. Never returns an error to the caller; internal
    /// failures become `handled_by = Error` with a user-safe message.
    pub async fn handle_turn(&self, ctx: RequestContext, include_trace: bool) -> RouterResult {
        let started = Instant::now();
        let trace_id: String = Uuid::new_v4().to_string().chars().take(8).collect();
        let mut trace = RouteTrace::new(&trace_id);

        match self.route(ctx, started, &mut trace).await {
            Ok(mut result) => {
                trace.record_timing("total", started.elapsed().as_millis() as u64);
                result.trace = include_trace.then_some(trace);
                result
            }
            Err(err) => {
                error!(%trace_id, error = %err, "router error");
                trace.errors.push(err.to_string());
                trace.record_timing("total", started.elapsed().as_millis() as u64);
                RouterResult {
                    content: "I encountered an error processing your request. Please try again."
                        .to_string(),
                    agent_outputs: Vec::new(),
                    citations: Vec::new(),
                    trace: include_trace.then_some(trace),
                    handled_by: HandledBy::Error,
                    epistemic: None,
                }
            }
        }
    }

    async fn route(
        &self,
        mut ctx: RequestContext,
        started: Instant,
        trace: &mut RouteTrace,
    ) -> Result<RouterResult> {
        // Step 1: deterministic gates. No classification, no retrieval, no
        // LLM anywhere on this path.
        if let Some(gate) = self
            .gates
            .check(&ctx.user_message, ctx.user_id, ctx.project_id)
        {
            trace.route_type = "deterministic".to_string();
            let session = SessionContext {
                query_type: Some(gate.query_type),
                ..Default::default()
            };
            let processed = self.epistemic.process(&gate.content, &session).await;
            return Ok(RouterResult {
                content: processed.processed_text,
                agent_outputs: Vec::new(),
                citations: Vec::new(),
                trace: None,
                handled_by: HandledBy::Deterministic,
                epistemic: Some(processed.metadata),
            });
        }

        // Memory context. Failures are logged and the turn continues.
        match self
            .memory
            .memories_for_context(&ctx.user_message, ctx.user_id, &self.limits)
            .await
        {
            Ok(memories) => {
                ctx.memories = memories
                    .iter()
                    .map(|m| ContextMemory {
                        id: m.id,
                        category: m.category.clone(),
                        content: m.content.clone(),
                        tier: m.tier.slug().to_string(),
                    })
                    .collect();
            }
            Err(error) => warn!(trace_id = %trace.trace_id, %error, "memory context failed"),
        }

        // Step 2: classify intent.
        let classify_started = Instant::now();
        let classification = self.classifier.classify(&ctx.user_message).await;
        trace.intents_detected = classification
            .intents
            .iter()
            .map(|i| i.as_str().to_string())
            .collect();
        trace.intent_source = classification.source.as_str().to_string();
        trace.record_timing("classify", classify_started.elapsed().as_millis() as u64);

        let intents = classification.intents;

        // Step 3: select the agent sequence.
        let sequence = self.select_sequence(&intents, &ctx);
        trace.agent_sequence = sequence.iter().map(ToString::to_string).collect();

        if sequence.is_empty() {
            trace.route_type = "llm_single".to_string();
            // Empty content signals the caller to run its legacy flow.
            return Ok(RouterResult {
                content: String::new(),
                agent_outputs: Vec::new(),
                citations: Vec::new(),
                trace: None,
                handled_by: HandledBy::LlmSinglePassthrough,
                epistemic: None,
            });
        }

        // Step 4: retrieval.
        let research_intent = intents.iter().any(|i| {
            matches!(
                i,
                Intent::Research | Intent::Write | Intent::Summarize | Intent::Explain
            )
        });
        if ctx.project_id.is_some() || research_intent {
            ctx.retrieved_chunks = self
                .retrieval
                .retrieve(ctx.project_id, &ctx.user_message, &intents)
                .await;
            trace.retrieval_used = !ctx.retrieved_chunks.is_empty();
            trace.retrieval_count = ctx.retrieved_chunks.len();
        }

        // Overlay pre-pass: frame challenge + profile directives go into the
        // system prompts of the agents that will answer.
        if let (Some(overlay), Some(profile)) = (&self.overlay, &ctx.study_profile) {
            ctx.system_addition = overlay.prompt_addition(&ctx.user_message, profile);
        }

        // Step 5: execute the pipeline, continuing past agent errors.
        trace.route_type = "agent_pipeline".to_string();
        let mut outputs: Vec<AgentOutput> = Vec::new();
        for name in &sequence {
            let Some(agent) = self.agents.get(name) else {
                trace.errors.push(format!("Unknown agent: {name}"));
                continue;
            };
            let step_started = Instant::now();
            ctx.prior_outputs = outputs.clone();
            let output = agent.run(&ctx).await;
            trace.record_timing(name, step_started.elapsed().as_millis() as u64);
            if let Some(err) = &output.error {
                trace.errors.push(format!("{name}: {err}"));
            }
            outputs.push(output);
        }

        for output in outputs.iter().rev() {
            if let Some(provider) = &output.provider_used {
                trace.provider_used = provider.clone();
                trace.model_used = output.model_used.clone().unwrap_or_default();
                break;
            }
        }

        let Some(final_output) = outputs.last() else {
            return Ok(RouterResult {
                content: "No agent produced output.".to_string(),
                agent_outputs: outputs,
                citations: Vec::new(),
                trace: None,
                handled_by: HandledBy::AgentPipeline,
                epistemic: None,
            });
        };

        // Step 6: compose.
        let citations: Vec<Citation> = outputs
            .iter()
            .flat_map(|o| o.citations.iter().cloned())
            .collect();

        let content = match (&final_output.is_final, &final_output.content) {
            (true, AgentContent::Text(text)) => append_citations(text, &citations),
            (_, AgentContent::Research(notes)) => format_research(notes),
            (_, AgentContent::MemoryReport(report)) => format_memory_report(report),
            (_, AgentContent::Text(text)) => text.clone(),
            (_, other) => serde_json::to_string_pretty(other).unwrap_or_default(),
        };

        // Epistemic processing, always before return. Under deadline
        // pressure only the anchor search is skipped.
        let mut epistemic_metadata = None;
        let mut final_content = content;
        if !final_content.is_empty() {
            let mut sources: Vec<String> = citations
                .iter()
                .filter_map(|c| c.filename.clone())
                .collect();
            sources.dedup();
            sources.truncate(5);

            let skip_anchor =
                started.elapsed() + self.anchor_reserve >= self.turn_budget;
            let session = SessionContext {
                query_type: None,
                sources,
                chunks: ctx.retrieved_chunks.clone(),
                prefers_accuracy: false,
            };
            let epistemic_started = Instant::now();
            let processed = self
                .epistemic
                .process_with(&final_content, &session, skip_anchor)
                .await;
            trace.record_timing("epistemic", epistemic_started.elapsed().as_millis() as u64);
            final_content = processed.processed_text;
            epistemic_metadata = Some(processed.metadata);
        }

        // Overlay post-pass: disclosure appended, warnings surfaced.
        if self.overlay.is_some() && ctx.study_profile.is_some() && !final_content.is_empty() {
            let overlay = self.overlay.as_ref().unwrap();
            let (text, enforcement) = overlay.apply(&final_content);
            final_content = text;
            trace.warnings.extend(enforcement.warnings);
        }

        // Archivist tail: best-effort background memory pass for non-memory
        // turns. Its failure never affects this response.
        if intents.first() != Some(&Intent::Memory) {
            self.spawn_memory_tail(&ctx);
        }

        Ok(RouterResult {
            content: final_content,
            agent_outputs: outputs,
            citations,
            trace: None,
            handled_by: HandledBy::AgentPipeline,
            epistemic: epistemic_metadata,
        })
    }

    /// Agent sequence for a classified turn.
    fn select_sequence(&self, intents: &[Intent], ctx: &RequestContext) -> Vec<&'static str> {
        let Some(primary) = intents.first() else {
            return Vec::new();
        };
        let has_project = ctx.project_id.is_some();
        let scholarly = self.scholarly.is_scholarly(&ctx.user_message);

        match primary {
            Intent::Write => {
                if has_project || scholarly {
                    vec![ResearcherAgent::NAME, WriterAgent::NAME]
                } else {
                    vec![WriterAgent::NAME]
                }
            }
            Intent::Research => {
                if has_project || scholarly {
                    if intents.contains(&Intent::Summarize) || intents.contains(&Intent::Write) {
                        vec![ResearcherAgent::NAME, WriterAgent::NAME]
                    } else {
                        vec![ResearcherAgent::NAME]
                    }
                } else {
                    Vec::new()
                }
            }
            Intent::Summarize => {
                if has_project {
                    vec![ResearcherAgent::NAME, WriterAgent::NAME]
                } else {
                    Vec::new()
                }
            }
            Intent::Explain => {
                if has_project || scholarly {
                    vec![ResearcherAgent::NAME, WriterAgent::NAME]
                } else {
                    Vec::new()
                }
            }
            Intent::Code => {
                if has_project && self.project_refs.references_project(&ctx.user_message) {
                    vec![ResearcherAgent::NAME, EngineerAgent::NAME]
                } else {
                    vec![EngineerAgent::NAME]
                }
            }
            Intent::Memory => vec![ArchivistAgent::NAME],
            Intent::Plan => vec![PlannerAgent::NAME],
            Intent::General => Vec::new(),
        }
    }

    /// Background archivist pass on the turn's tail. Spawned only when an
    /// LLM is reachable and the turn belongs to a user.
    fn spawn_memory_tail(&self, ctx: &RequestContext) {
        if ctx.user_id.is_none() || !self.gateway.is_available() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let Some(archivist) = self.agents.get(ArchivistAgent::NAME).cloned() else {
            return;
        };
        let mut tail_ctx = ctx.clone();
        tail_ctx.prior_outputs = Vec::new();
        handle.spawn(async move {
            let output = archivist.run(&tail_ctx).await;
            debug!(error = ?output.error, "background memory pass finished");
        });
    }

    /// Classification cache counters, for the stats surface.
    pub fn cache_stats(&self) -> sage_intent::CacheStats {
        self.classifier.cache_stats()
    }
}
