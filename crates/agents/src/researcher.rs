//! Researcher: source gathering and structured analysis.
//!
//! Never writes final prose, always cites, cannot invent facts. Its output
//! is structured notes the writer (or the composer) formats.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sage_core::{
    Agent, AgentContent, AgentOutput, Artifact, Intent, KeyFinding, RequestContext, ResearchNotes,
};
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use tracing::{error, warn};

use crate::prompt::{citations_from_chunks, extract_json, format_memories, format_sources};

const SYSTEM_PROMPT: &str = "You are a Research Agent. Your role is to gather, analyze, and organize information from provided sources.

## Your Responsibilities
1. Extract relevant information from the provided sources
2. Identify key facts, claims, and evidence
3. Note contradictions or inconsistencies between sources
4. Flag gaps or missing information
5. Organize findings into structured notes

## Constraints
- ONLY use information from the provided sources
- NEVER invent or hallucinate facts
- NEVER write final prose or articles (that's the Writer's job)
- ALWAYS cite which source each piece of information comes from
- If sources don't contain relevant information, say so explicitly

## Output Format
Respond with a JSON object containing:
{
    \"summary\": \"Brief overview of what the sources contain\",
    \"key_findings\": [
        {\"finding\": \"...\", \"source\": \"[1]\", \"confidence\": \"high|medium|low\"}
    ],
    \"themes\": [\"theme1\", \"theme2\"],
    \"contradictions\": [
        {\"issue\": \"...\", \"sources\": [\"[1]\", \"[2]\"]}
    ],
    \"gaps\": [\"What's missing or unclear\"],
    \"open_questions\": [\"Questions that remain unanswered\"],
    \"recommended_structure\": [\"Suggested outline for writing\"]
}

Be thorough but concise. Focus on actionable insights.";

pub struct ResearcherAgent {
    gateway: Arc<LlmGateway>,
}

impl ResearcherAgent {
    pub const NAME: &'static str = "researcher";

    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    fn no_sources_output(started: Instant) -> AgentOutput {
        let notes = ResearchNotes {
            summary: "No sources available for research.".to_string(),
            gaps: vec!["No project files or retrieved content to analyze".to_string()],
            ..Default::default()
        };
        let mut output = AgentOutput::new(Self::NAME, AgentContent::Research(notes));
        output.error = Some("No sources available".to_string());
        output.processing_ms = started.elapsed().as_millis() as u64;
        output
    }

    /// Parse the model's JSON, or fall back to an unstructured single
    /// finding so downstream agents still have something to work with.
    fn parse_notes(raw: &str) -> ResearchNotes {
        if let Some(notes) = extract_json::<ResearchNotes>(raw) {
            return notes;
        }
        warn!("failed to parse researcher response as JSON");
        ResearchNotes {
            summary: raw.chars().take(500).collect(),
            key_findings: vec![KeyFinding {
                finding: raw.to_string(),
                source: "response".to_string(),
                confidence: "low".to_string(),
            }],
            gaps: vec!["Could not parse structured response".to_string()],
            ..Default::default()
        }
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _ctx: &RequestContext, intent: Intent) -> bool {
        matches!(
            intent,
            Intent::Research | Intent::Summarize | Intent::Explain
        )
    }

    async fn run(&self, ctx: &RequestContext) -> AgentOutput {
        let started = Instant::now();

        if ctx.retrieved_chunks.is_empty() && ctx.project_id.is_none() {
            return Self::no_sources_output(started);
        }

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if !ctx.memories.is_empty() {
            system_prompt.push_str("\n\n## User Context\n");
            system_prompt.push_str(&format_memories(&ctx.memories, 5));
        }
        if let Some(addition) = &ctx.system_addition {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(addition);
        }

        let user_message = format!(
            "## Research Request\n{}\n\n{}\n\nAnalyze these sources and provide structured research notes in JSON format.",
            ctx.user_message,
            format_sources(&ctx.retrieved_chunks),
        );

        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];

        match self
            .gateway
            .chat(LlmRole::Researcher, &messages, &ChatOptions::default())
            .await
        {
            Ok(outcome) => {
                let notes = Self::parse_notes(&outcome.text);
                let mut output =
                    AgentOutput::new(Self::NAME, AgentContent::Research(notes.clone()));
                output.citations = citations_from_chunks(&ctx.retrieved_chunks);
                output.artifacts = vec![Artifact::ResearchNotes(notes)];
                output.tokens_used = outcome.tokens_used;
                output.provider_used = Some(outcome.provider);
                output.model_used = Some(outcome.model);
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
            Err(err) => {
                error!(error = %err, "researcher agent failed");
                let mut output = AgentOutput::text(Self::NAME, format!("Research failed: {err}"));
                output.error = Some(err.to_string());
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sage_core::RequestContext;

    use super::*;

    #[test]
    fn parse_notes_reads_structured_json() {
        let raw = r#"{"summary": "two sources on covenant", "key_findings": [{"finding": "covenant renewed", "source": "[1]", "confidence": "high"}], "themes": ["covenant"], "contradictions": [], "gaps": [], "open_questions": [], "recommended_structure": ["intro"]}"#;
        let notes = ResearcherAgent::parse_notes(raw);
        assert_eq!(notes.summary, "two sources on covenant");
        assert_eq!(notes.key_findings.len(), 1);
        assert_eq!(notes.key_findings[0].confidence, "high");
    }

    #[test]
    fn parse_notes_falls_back_to_unstructured() {
        let notes = ResearcherAgent::parse_notes("The sources broadly discuss covenant themes.");
        assert!(notes.summary.starts_with("The sources"));
        assert_eq!(notes.key_findings.len(), 1);
        assert_eq!(notes.key_findings[0].confidence, "low");
        assert!(notes
            .gaps
            .contains(&"Could not parse structured response".to_string()));
    }

    #[test]
    fn handles_research_summarize_and_explain() {
        let gateway = Arc::new(LlmGateway::new(sage_llm::ProviderRegistry::with_providers(
            vec![],
            sage_config::RolesConfig::default(),
        )));
        let agent = ResearcherAgent::new(gateway);
        let ctx = RequestContext::new("test");
        assert!(agent.can_handle(&ctx, Intent::Research));
        assert!(agent.can_handle(&ctx, Intent::Summarize));
        assert!(agent.can_handle(&ctx, Intent::Explain));
        assert!(!agent.can_handle(&ctx, Intent::Code));
    }

    #[tokio::test]
    async fn no_sources_short_circuits_without_llm() {
        let gateway = Arc::new(LlmGateway::new(sage_llm::ProviderRegistry::with_providers(
            vec![],
            sage_config::RolesConfig::default(),
        )));
        let agent = ResearcherAgent::new(gateway);
        let ctx = RequestContext::new("research something");

        let output = agent.run(&ctx).await;
        assert!(output.error.is_some());
        assert!(!output.is_final);
        match output.content {
            AgentContent::Research(notes) => {
                assert!(!notes.gaps.is_empty());
            }
            other => panic!("expected research content, got {other:?}"),
        }
    }
}
