//! Writer: prose synthesis.
//!
//! Turns research notes into polished output. Cannot invent facts; it only
//! synthesizes material handed to it, either a prior researcher output or
//! raw retrieved chunks. Its output is user-facing.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sage_core::{
    Agent, AgentContent, AgentOutput, Artifact, Citation, Intent, KeyFinding, RequestContext,
    ResearchNotes,
};
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use tracing::error;

use crate::prompt::citations_from_chunks;
use crate::researcher::ResearcherAgent;

const SYSTEM_PROMPT: &str = "You are a Writer Agent. Your role is to transform research notes into polished, readable prose.

## Your Responsibilities
1. Take structured research notes and write clear, engaging content
2. Follow the recommended structure when provided
3. Maintain a consistent voice and tone
4. Include citations in the text (e.g., \"According to [1]...\" or \"The document states [2]...\")
5. Make the content accessible and well-organized

## Constraints
- ONLY use information from the research notes provided
- NEVER invent facts, quotes, or claims not in the research
- NEVER add information from your own knowledge
- If research is incomplete, note what's missing rather than filling gaps
- Keep citations inline so readers can trace claims

## Style Guidelines
- Clear, direct prose
- Active voice when possible
- Short paragraphs for readability
- Use headers to organize longer pieces
- Match the formality level to the request (article vs summary vs explanation)

## Output
Write the requested content directly. Do not wrap in JSON or markdown code blocks unless specifically asked.
Do NOT include a Sources section - the system will append properly formatted citations automatically.";

pub struct WriterAgent {
    gateway: Arc<LlmGateway>,
}

impl WriterAgent {
    pub const NAME: &'static str = "writer";

    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Research from the pipeline, or synthesized from raw chunks when no
    /// researcher ran this turn.
    fn research_input(ctx: &RequestContext) -> Option<ResearchNotes> {
        for output in &ctx.prior_outputs {
            if output.agent == ResearcherAgent::NAME {
                if let AgentContent::Research(notes) = &output.content {
                    return Some(notes.clone());
                }
            }
        }

        if !ctx.retrieved_chunks.is_empty() {
            return Some(ResearchNotes {
                summary: "Direct sources provided (no prior research analysis)".to_string(),
                key_findings: ctx
                    .retrieved_chunks
                    .iter()
                    .take(5)
                    .enumerate()
                    .map(|(i, chunk)| KeyFinding {
                        finding: chunk.content.chars().take(200).collect(),
                        source: format!("[{}]", i + 1),
                        confidence: "medium".to_string(),
                    })
                    .collect(),
                ..Default::default()
            });
        }

        None
    }

    /// What kind of output the user wants, detected from the message.
    fn detect_output_type(message: &str) -> &'static str {
        let msg = message.to_lowercase();
        if ["article", "blog", "post"].iter().any(|w| msg.contains(w)) {
            "Article (800-1200 words, engaging, with introduction and conclusion)"
        } else if ["summary", "summarize", "overview"]
            .iter()
            .any(|w| msg.contains(w))
        {
            "Summary (200-400 words, key points only)"
        } else if ["explain", "explanation"].iter().any(|w| msg.contains(w)) {
            "Explanation (clear, educational, step-by-step if needed)"
        } else if ["outline", "structure"].iter().any(|w| msg.contains(w)) {
            "Outline (hierarchical structure with brief descriptions)"
        } else if ["draft", "first draft"].iter().any(|w| msg.contains(w)) {
            "Draft (complete but may need revision)"
        } else if ["brief", "short", "quick"].iter().any(|w| msg.contains(w)) {
            "Brief (100-200 words, essential points only)"
        } else {
            "Standard response (appropriate length for the request)"
        }
    }

    /// Voice preferences live in `preference`-category memories that talk
    /// about style.
    fn style_preferences(ctx: &RequestContext) -> String {
        let vocab = ["style", "tone", "voice", "write", "formal", "casual"];
        ctx.memories
            .iter()
            .filter(|m| m.category == "preference")
            .filter(|m| {
                let content = m.content.to_lowercase();
                vocab.iter().any(|w| content.contains(w))
            })
            .map(|m| format!("- {}", m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_research(notes: &ResearchNotes) -> String {
        let mut lines = vec!["## Research Notes".to_string(), String::new()];

        if !notes.summary.is_empty() {
            lines.push(format!("### Summary\n{}\n", notes.summary));
        }
        if !notes.key_findings.is_empty() {
            lines.push("### Key Findings".to_string());
            for finding in &notes.key_findings {
                lines.push(format!(
                    "- {} {} ({})",
                    finding.finding, finding.source, finding.confidence
                ));
            }
            lines.push(String::new());
        }
        if !notes.themes.is_empty() {
            lines.push(format!("### Themes\n{}\n", notes.themes.join(", ")));
        }
        if !notes.contradictions.is_empty() {
            lines.push("### Contradictions/Tensions".to_string());
            for c in &notes.contradictions {
                lines.push(format!("- {} (sources: {})", c.issue, c.sources.join(", ")));
            }
            lines.push(String::new());
        }
        if !notes.gaps.is_empty() {
            lines.push("### Information Gaps".to_string());
            for gap in &notes.gaps {
                lines.push(format!("- {gap}"));
            }
            lines.push(String::new());
        }
        if !notes.recommended_structure.is_empty() {
            lines.push("### Recommended Structure".to_string());
            for (i, section) in notes.recommended_structure.iter().enumerate() {
                lines.push(format!("{}. {section}", i + 1));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Inherit the researcher's citations, or rebuild from chunks.
    fn collect_citations(ctx: &RequestContext) -> Vec<Citation> {
        let inherited: Vec<Citation> = ctx
            .prior_outputs
            .iter()
            .filter(|o| o.agent == ResearcherAgent::NAME)
            .flat_map(|o| o.citations.clone())
            .collect();
        if !inherited.is_empty() {
            return inherited;
        }
        citations_from_chunks(&ctx.retrieved_chunks)
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _ctx: &RequestContext, intent: Intent) -> bool {
        matches!(intent, Intent::Write | Intent::Explain)
    }

    async fn run(&self, ctx: &RequestContext) -> AgentOutput {
        let started = Instant::now();

        let Some(research) = Self::research_input(ctx) else {
            let mut output = AgentOutput::text(
                Self::NAME,
                "No research notes available. Please provide sources or run the Researcher first.",
            )
            .finalized();
            output.error = Some("No research data".to_string());
            output.processing_ms = started.elapsed().as_millis() as u64;
            return output;
        };

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        let style = Self::style_preferences(ctx);
        if !style.is_empty() {
            system_prompt.push_str("\n\n## User Style Preferences\n");
            system_prompt.push_str(&style);
        }
        if let Some(addition) = &ctx.system_addition {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(addition);
        }

        let output_type = Self::detect_output_type(&ctx.user_message);
        let user_message = format!(
            "## Writing Request\n{}\n\n## Output Type\n{}\n\n{}\n\nWrite the requested content based on these research notes. Include inline citations [1], [2], etc.",
            ctx.user_message,
            output_type,
            Self::format_research(&research),
        );

        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];

        match self
            .gateway
            .chat(LlmRole::Writer, &messages, &ChatOptions::default())
            .await
        {
            Ok(outcome) => {
                let word_count = outcome.text.split_whitespace().count();
                let mut output = AgentOutput::text(Self::NAME, outcome.text.clone()).finalized();
                output.citations = Self::collect_citations(ctx);
                output.artifacts = vec![Artifact::Draft {
                    content: outcome.text,
                    output_type: output_type.to_string(),
                    word_count,
                }];
                output.tokens_used = outcome.tokens_used;
                output.provider_used = Some(outcome.provider);
                output.model_used = Some(outcome.model);
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
            Err(err) => {
                error!(error = %err, "writer agent failed");
                let mut output =
                    AgentOutput::text(Self::NAME, format!("Error generating content: {err}"))
                        .finalized();
                output.error = Some(err.to_string());
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
        }
    }
}
