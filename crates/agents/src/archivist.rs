//! Archivist: memory governance.
//!
//! Two paths. Explicit remember/forget commands execute immediately with no
//! LLM. Everything else goes to the archivist model, whose JSON reply is
//! applied as operation lists in a fixed order: stores → updates → forgets →
//! consolidations. Every path is best-effort; a failure here never affects
//! the user-visible response.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sage_core::{Agent, AgentContent, AgentOutput, Intent, MemoryReport, RequestContext};
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use sage_memory::{AddMemory, MemoryFilter, MemorySource, MemoryStore, MemoryTier, MemoryUpdate};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::prompt::extract_json;

const SYSTEM_PROMPT: &str = "You are the Archivist — the assistant's memory manager. You analyze conversations to decide what is worth remembering about the user.

## Memory Tiers

You assign memories to tiers:

- **core**: Who the user is as a person. Identity, deeply-held values, beliefs, personality traits, relationship dynamics. Changes rarely but deepens over time.
- **long_term**: Useful knowledge, preferences, project context, relationships, interests, opinions. Grows over time, subject to natural decay.
- **episodic**: Session-specific context, what was discussed or decided. Fades naturally.

## What to Remember

- Identity and self-description (\"My name is...\", \"I'm an engineer\")
- Values, convictions, and worldview
- Preferences (\"I prefer concise responses\")
- Project context and decisions made, including why
- People and relationships
- What was tried and didn't work
- Skills and confidence levels
- Goals, both short-term and long-term

## What NOT to Remember

- Trivial conversation filler (\"ok\", \"thanks\")
- Temporary instructions (\"run this command\")
- Information already in existing memories (don't duplicate)
- Raw LLM responses or code blocks
- Sensitive data (passwords, API keys, tokens)

## Memory Quality

Memories should be concise facts, not transcripts. Distill the essence.

## Consolidation

When memories overlap or repeat the same fact, merge them into a single
clearer memory, increase confidence on the merged version, and mark the
originals for deletion.

## Output Format

Respond with ONLY a JSON object (no markdown, no explanation):
{
    \"memories_to_store\": [
        {
            \"content\": \"Clear, concise fact to remember\",
            \"category\": \"identity|personality|values|preference|relationship|project|theology|engineering|interest|general\",
            \"tier\": \"core|long_term|episodic\",
            \"confidence\": 0.0,
            \"entities\": [{\"name\": \"entity name\", \"type\": \"person|project|tool|concept|organization\", \"relationship\": \"about|uses|teaches|created_by|studies_with\"}],
            \"reason\": \"Brief reason for remembering\"
        }
    ],
    \"memories_to_update\": [
        {\"id\": 123, \"new_content\": \"Updated content\", \"new_confidence\": 0.0, \"reason\": \"Why updating\"}
    ],
    \"memories_to_forget\": [
        {\"id\": 456, \"reason\": \"Why this should be removed\"}
    ],
    \"consolidations\": [
        {\"source_ids\": [1, 2, 3], \"merged_content\": \"Single clear memory combining all sources\", \"tier\": \"long_term\", \"confidence\": 0.8, \"reason\": \"These all say the same thing\"}
    ],
    \"analysis\": \"Brief explanation of memory decisions\"
}

If nothing is worth remembering, return empty arrays with an analysis explaining why.";

// ── LLM reply shape ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct StoreOp {
    #[serde(default)]
    content: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    entities: Vec<EntityOp>,
}

#[derive(Debug, Deserialize, Default)]
struct EntityOp {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    entity_type: String,
    #[serde(default)]
    relationship: String,
}

#[derive(Debug, Deserialize, Default)]
struct UpdateOp {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    new_content: Option<String>,
    #[serde(default)]
    new_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ForgetOp {
    #[serde(default)]
    id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct Consolidation {
    #[serde(default)]
    source_ids: Vec<i64>,
    #[serde(default)]
    merged_content: String,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ArchivistPlan {
    #[serde(default)]
    memories_to_store: Vec<StoreOp>,
    #[serde(default)]
    memories_to_update: Vec<UpdateOp>,
    #[serde(default)]
    memories_to_forget: Vec<ForgetOp>,
    #[serde(default)]
    consolidations: Vec<Consolidation>,
    #[serde(default)]
    analysis: String,
}

// ── Explicit command detection ────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum ExplicitAction {
    Remember,
    Forget,
}

fn detect_explicit(message: &str) -> Option<ExplicitAction> {
    let msg = message.to_lowercase();
    if ["remember that", "remember this", "please remember", "don't forget"]
        .iter()
        .any(|p| msg.contains(p))
    {
        return Some(ExplicitAction::Remember);
    }
    if ["forget that", "forget this", "please forget", "don't remember"]
        .iter()
        .any(|p| msg.contains(p))
    {
        return Some(ExplicitAction::Forget);
    }
    None
}

/// Strip the command prefix off an explicit remember, leaving the fact.
fn extract_memory_content(message: &str) -> String {
    const PREFIXES: &[&str] = &[
        "remember that",
        "remember this:",
        "remember this",
        "please remember that",
        "please remember",
        "don't forget that",
        "don't forget:",
        "don't forget",
    ];
    let lower = message.to_lowercase();
    for prefix in PREFIXES {
        if lower.starts_with(prefix) {
            return message[prefix.len()..].trim().to_string();
        }
    }
    message.trim().to_string()
}

/// Tier/category promotion rules for explicit memories.
fn classify_explicit(content: &str) -> (&'static str, MemoryTier, f32) {
    let lower = content.to_lowercase();
    if ["my name", "i am", "i'm a", "my role"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ("identity", MemoryTier::Core, 0.95)
    } else if ["i value", "i believe", "my faith", "i'm convicted"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ("values", MemoryTier::Core, 0.9)
    } else if ["my wife", "my husband", "my family"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ("relationship", MemoryTier::Core, 0.9)
    } else if ["my humor", "i find funny", "makes me laugh", "my personality"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ("personality", MemoryTier::Core, 0.85)
    } else if ["prefer", "like", "always", "never"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ("preference", MemoryTier::LongTerm, 0.85)
    } else {
        ("general", MemoryTier::LongTerm, 0.8)
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

pub struct ArchivistAgent {
    gateway: Arc<LlmGateway>,
    memory: Arc<MemoryStore>,
}

impl ArchivistAgent {
    pub const NAME: &'static str = "archivist";

    /// Forget matches must clear this decayed-score bar before deletion.
    const FORGET_SCORE_THRESHOLD: f32 = 0.5;

    pub fn new(gateway: Arc<LlmGateway>, memory: Arc<MemoryStore>) -> Self {
        Self { gateway, memory }
    }

    fn report(report: MemoryReport, started: Instant) -> AgentOutput {
        let mut output = AgentOutput::new(Self::NAME, AgentContent::MemoryReport(report));
        output.processing_ms = started.elapsed().as_millis() as u64;
        output
    }

    async fn handle_remember(&self, ctx: &RequestContext, started: Instant) -> AgentOutput {
        let content = extract_memory_content(&ctx.user_message);
        if content.is_empty() {
            return Self::report(
                MemoryReport::NoAction {
                    reason: "Could not process memory command".to_string(),
                },
                started,
            );
        }

        let (category, tier, confidence) = classify_explicit(&content);
        let mut add = AddMemory::new(content.clone())
            .category(category)
            .source(MemorySource::Manual)
            .tier(tier)
            .confidence(confidence);
        if let Some(user_id) = ctx.user_id {
            add = add.user(user_id);
        }

        match self.memory.add(add).await {
            Ok(id) => Self::report(
                MemoryReport::Stored {
                    id,
                    content,
                    category: category.to_string(),
                    tier: tier.slug().to_string(),
                },
                started,
            ),
            Err(error) => {
                warn!(%error, "failed to store explicit memory");
                Self::report(
                    MemoryReport::NoAction {
                        reason: "Could not process memory command".to_string(),
                    },
                    started,
                )
            }
        }
    }

    async fn handle_forget(&self, ctx: &RequestContext, started: Instant) -> AgentOutput {
        let matches = match self.memory.search(&ctx.user_message, ctx.user_id, 3).await {
            Ok(matches) => matches,
            Err(error) => {
                warn!(%error, "forget search failed");
                return Self::report(
                    MemoryReport::NoAction {
                        reason: "Could not process memory command".to_string(),
                    },
                    started,
                );
            }
        };

        let mut forgotten = Vec::new();
        for scored in matches {
            if scored.score <= Self::FORGET_SCORE_THRESHOLD {
                continue;
            }
            match self.memory.delete(scored.memory.id, ctx.user_id).await {
                Ok(true) => forgotten.push(scored.memory.id),
                Ok(false) => {}
                Err(error) => warn!(id = scored.memory.id, %error, "forget delete failed"),
            }
        }

        Self::report(MemoryReport::Forgotten { ids: forgotten }, started)
    }

    // ── LLM analysis ──────────────────────────────────────────────────────────

    fn summarize_existing(&self, ctx: &RequestContext) -> String {
        let existing = self.memory.list(&MemoryFilter {
            user_id: ctx.user_id,
            limit: 30,
            ..Default::default()
        });
        if existing.is_empty() {
            return "(No existing memories)".to_string();
        }
        existing
            .iter()
            .map(|m| {
                format!(
                    "[{}/{}] id={}: {}",
                    m.tier.slug(),
                    m.category,
                    m.id,
                    m.content.chars().take(120).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn conversation_excerpt(ctx: &RequestContext) -> String {
        if ctx.history.is_empty() {
            return "(No prior messages in this conversation)".to_string();
        }
        ctx.history
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|m| {
                format!(
                    "**{}**: {}",
                    m.role,
                    m.content.chars().take(300).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn llm_analyze(&self, ctx: &RequestContext, started: Instant) -> AgentOutput {
        let user_prompt = format!(
            "Analyze this conversation for memories worth storing.\n\n\
             ## Existing Memories (avoid duplicates)\n{}\n\n\
             ## Current Conversation\n{}\n\n\
             ## Current User Message\n{}\n\n\
             What should be remembered, updated, or forgotten? Return JSON only.",
            self.summarize_existing(ctx),
            Self::conversation_excerpt(ctx),
            ctx.user_message,
        );

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        let outcome = match self
            .gateway
            .chat(LlmRole::Archivist, &messages, &ChatOptions::default())
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "archivist LLM unavailable, falling back to heuristics");
                return self.heuristic_analyze(ctx, started).await;
            }
        };

        let Some(plan) = extract_json::<ArchivistPlan>(&outcome.text) else {
            warn!("could not parse archivist reply as JSON, falling back to heuristics");
            return self.heuristic_analyze(ctx, started).await;
        };

        let mut output = self.apply_plan(ctx, plan, started).await;
        output.tokens_used = outcome.tokens_used;
        output.provider_used = Some(outcome.provider);
        output.model_used = Some(outcome.model);
        output
    }

    /// Apply the LLM's operations in order: stores → updates → forgets →
    /// consolidations.
    async fn apply_plan(
        &self,
        ctx: &RequestContext,
        plan: ArchivistPlan,
        started: Instant,
    ) -> AgentOutput {
        let mut stored = Vec::new();
        let mut updated = Vec::new();
        let mut forgotten = Vec::new();
        let mut consolidations = 0;

        for op in plan.memories_to_store {
            let content = op.content.trim().to_string();
            if content.is_empty() {
                continue;
            }
            let category = if op.category.is_empty() {
                "general".to_string()
            } else {
                op.category
            };
            if !self.memory.should_auto_save(&category, ctx.user_id) {
                debug!(%category, "auto-save disallowed for category, skipping");
                continue;
            }
            let tier = MemoryTier::parse(&op.tier).unwrap_or(MemoryTier::LongTerm);

            let mut add = AddMemory::new(content)
                .category(category)
                .source(MemorySource::Auto)
                .tier(tier)
                .confidence(op.confidence.unwrap_or(0.5));
            if let Some(user_id) = ctx.user_id {
                add = add.user(user_id);
            }

            match self.memory.add(add).await {
                Ok(id) => {
                    stored.push(id);
                    for entity in op.entities {
                        let Some(entity_type) =
                            sage_memory::EntityType::parse(&entity.entity_type)
                        else {
                            continue;
                        };
                        match self.memory.add_entity(&entity.name, entity_type) {
                            Ok(entity_id) => {
                                let relationship = if entity.relationship.is_empty() {
                                    "about"
                                } else {
                                    &entity.relationship
                                };
                                if let Err(error) = self.memory.link(id, entity_id, relationship)
                                {
                                    warn!(%error, "entity link failed");
                                }
                            }
                            Err(error) => warn!(%error, "entity add failed"),
                        }
                    }
                }
                Err(error) => warn!(%error, "archivist store failed"),
            }
        }

        for op in plan.memories_to_update {
            let Some(id) = op.id else { continue };
            let update = MemoryUpdate {
                content: op.new_content,
                confidence: op.new_confidence,
                ..Default::default()
            };
            match self.memory.update(id, update, ctx.user_id).await {
                Ok(true) => updated.push(id),
                Ok(false) => debug!(id, "update skipped, memory missing or foreign"),
                Err(error) => warn!(id, %error, "archivist update failed"),
            }
        }

        for op in plan.memories_to_forget {
            let Some(id) = op.id else { continue };
            match self.memory.delete(id, ctx.user_id).await {
                Ok(true) => forgotten.push(id),
                Ok(false) => debug!(id, "forget skipped, memory missing or foreign"),
                Err(error) => warn!(id, %error, "archivist forget failed"),
            }
        }

        'groups: for consolidation in plan.consolidations {
            if consolidation.source_ids.is_empty() || consolidation.merged_content.is_empty() {
                continue;
            }
            // A group referencing a missing or foreign memory is skipped
            // whole, never partially applied.
            for source_id in &consolidation.source_ids {
                let visible = self.memory.get(*source_id).is_some_and(|m| {
                    m.user_id.is_none() || ctx.user_id.is_none() || m.user_id == ctx.user_id
                });
                if !visible {
                    warn!(
                        source_id,
                        "consolidation references unknown or foreign memory, skipping group"
                    );
                    continue 'groups;
                }
            }

            let tier = MemoryTier::parse(&consolidation.tier).unwrap_or(MemoryTier::LongTerm);
            let mut add = AddMemory::new(consolidation.merged_content)
                .source(MemorySource::Auto)
                .tier(tier)
                .confidence(consolidation.confidence.unwrap_or(0.8));
            if let Some(user_id) = ctx.user_id {
                add = add.user(user_id);
            }

            match self.memory.add(add).await {
                Ok(new_id) => {
                    for source_id in &consolidation.source_ids {
                        if let Err(error) = self.memory.delete(*source_id, ctx.user_id).await {
                            warn!(source_id, %error, "consolidation delete failed");
                        }
                    }
                    stored.push(new_id);
                    consolidations += 1;
                }
                Err(error) => warn!(%error, "consolidation merge failed"),
            }
        }

        info!(
            stored = stored.len(),
            updated = updated.len(),
            forgotten = forgotten.len(),
            consolidations,
            "archivist operations applied"
        );

        Self::report(
            MemoryReport::Analysis {
                stored,
                updated,
                forgotten,
                consolidations,
                analysis: plan.analysis,
            },
            started,
        )
    }

    /// Minimal regex-free fallback when no LLM is reachable: promote only
    /// the most obvious identity/preference statements.
    async fn heuristic_analyze(&self, ctx: &RequestContext, started: Instant) -> AgentOutput {
        let lower = ctx.user_message.to_lowercase();

        let candidate = if ["my name is", "i am a ", "i work at", "i'm the creator"]
            .iter()
            .any(|p| lower.contains(p))
        {
            Some(("identity", MemoryTier::Core, 0.8))
        } else if ["i prefer", "i like", "i always", "i never"]
            .iter()
            .any(|p| lower.contains(p))
        {
            Some(("preference", MemoryTier::LongTerm, 0.7))
        } else {
            None
        };

        let mut stored = Vec::new();
        if let Some((category, tier, confidence)) = candidate {
            if self.memory.should_auto_save(category, ctx.user_id) {
                let mut add = AddMemory::new(ctx.user_message.clone())
                    .category(category)
                    .source(MemorySource::Auto)
                    .tier(tier)
                    .confidence(confidence);
                if let Some(user_id) = ctx.user_id {
                    add = add.user(user_id);
                }
                match self.memory.add(add).await {
                    Ok(id) => stored.push(id),
                    Err(error) => warn!(%error, "heuristic store failed"),
                }
            }
        }

        let count = stored.len();
        Self::report(
            MemoryReport::Analysis {
                stored,
                updated: Vec::new(),
                forgotten: Vec::new(),
                consolidations: 0,
                analysis: format!("Heuristic fallback: found {count} potential memories"),
            },
            started,
        )
    }
}

#[async_trait]
impl Agent for ArchivistAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _ctx: &RequestContext, intent: Intent) -> bool {
        intent == Intent::Memory
    }

    async fn run(&self, ctx: &RequestContext) -> AgentOutput {
        let started = Instant::now();

        let settings = self.memory.get_settings(ctx.user_id);
        if !settings.auto_save_enabled {
            return Self::report(
                MemoryReport::Analysis {
                    stored: Vec::new(),
                    updated: Vec::new(),
                    forgotten: Vec::new(),
                    consolidations: 0,
                    analysis: "Auto-save disabled by user settings.".to_string(),
                },
                started,
            );
        }

        match detect_explicit(&ctx.user_message) {
            Some(ExplicitAction::Remember) => self.handle_remember(ctx, started).await,
            Some(ExplicitAction::Forget) => self.handle_forget(ctx, started).await,
            None => self.llm_analyze(ctx, started).await,
        }
    }
}
