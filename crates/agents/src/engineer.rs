//! Engineer: code generation.
//!
//! Generates complete, drop-in artifacts, respecting patterns shown in the
//! retrieved code context. Never executes anything. Fenced blocks in the
//! reply are extracted post-hoc into typed artifacts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use sage_core::{
    Agent, AgentContent, AgentOutput, Artifact, Chunk, Intent, RequestContext, ResearchNotes,
};
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use tracing::error;

use crate::researcher::ResearcherAgent;

const SYSTEM_PROMPT: &str = "You are an Engineer Agent. Your role is to generate high-quality code, patches, and technical artifacts.

## Your Responsibilities
1. Generate clean, working code based on requirements
2. Follow existing patterns and conventions from the codebase
3. Produce complete, drop-in artifacts (not fragments)
4. Include necessary imports, error handling, and documentation
5. Respect the project's architecture and style

## Constraints
- Follow existing code patterns shown in the context
- Do NOT execute code - only generate it
- Do NOT make assumptions about undefined requirements - ask or note them
- Include all necessary imports and dependencies
- Add brief inline comments for complex logic only

## Output Format
For code generation, output the complete file or patch in a fenced block.
For multiple files, precede each block with a header line:
## File: path/to/file

If you need clarification on requirements, state what's unclear before providing code.";

pub struct EngineerAgent {
    gateway: Arc<LlmGateway>,
}

impl EngineerAgent {
    pub const NAME: &'static str = "engineer";

    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    fn language_for(filename: &str) -> &'static str {
        const EXT_MAP: &[(&str, &str)] = &[
            (".rs", "rust"),
            (".py", "python"),
            (".js", "javascript"),
            (".jsx", "jsx"),
            (".ts", "typescript"),
            (".tsx", "tsx"),
            (".html", "html"),
            (".css", "css"),
            (".sql", "sql"),
            (".sh", "bash"),
            (".json", "json"),
            (".yaml", "yaml"),
            (".yml", "yaml"),
            (".toml", "toml"),
            (".md", "markdown"),
        ];
        for (ext, lang) in EXT_MAP {
            if filename.ends_with(ext) {
                return lang;
            }
        }
        ""
    }

    /// Format retrieved code chunks, one block per file.
    fn format_code_context(chunks: &[Chunk]) -> String {
        if chunks.is_empty() {
            return "No existing code context available.".to_string();
        }

        let mut lines = Vec::new();
        let mut seen_files = HashSet::new();

        for chunk in chunks.iter().take(10) {
            if !seen_files.insert(chunk.filename.clone()) {
                continue;
            }
            let lang = Self::language_for(&chunk.filename);
            lines.push(format!("### {}", chunk.filename));
            lines.push(format!("```{lang}"));
            lines.push(chunk.content.chars().take(1500).collect());
            lines.push("```".to_string());
            lines.push(String::new());
        }
        lines.join("\n")
    }

    fn code_preferences(ctx: &RequestContext) -> String {
        let vocab = ["code", "style", "prefer", "always", "never", "use"];
        ctx.memories
            .iter()
            .filter(|m| m.category == "preference" || m.category == "engineering")
            .filter(|m| {
                let content = m.content.to_lowercase();
                vocab.iter().any(|w| content.contains(w))
            })
            .map(|m| format!("- {}", m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn specs_from_prior(ctx: &RequestContext) -> Option<String> {
        for output in &ctx.prior_outputs {
            if output.agent == ResearcherAgent::NAME {
                if let AgentContent::Research(notes) = &output.content {
                    return Some(Self::format_specs(notes));
                }
            }
        }
        None
    }

    fn format_specs(notes: &ResearchNotes) -> String {
        let mut lines = Vec::new();
        if !notes.summary.is_empty() {
            lines.push(format!("**Overview:** {}", notes.summary));
        }
        if !notes.key_findings.is_empty() {
            lines.push("\n**Requirements:**".to_string());
            for finding in &notes.key_findings {
                lines.push(format!("- {}", finding.finding));
            }
        }
        lines.join("\n")
    }

    /// Pull fenced code blocks out of the reply, pairing them with
    /// `## File:` headers when the counts line up.
    fn extract_artifacts(response: &str) -> Vec<Artifact> {
        let block_re = Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap();
        let file_re = Regex::new(r"##\s*File:\s*(.+)").unwrap();

        let mut artifacts: Vec<Artifact> = block_re
            .captures_iter(response)
            .map(|caps| Artifact::Code {
                language: {
                    let lang = caps.get(1).map_or("", |m| m.as_str());
                    if lang.is_empty() { "text" } else { lang }.to_string()
                },
                content: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
                filepath: None,
            })
            .collect();

        let filepaths: Vec<String> = file_re
            .captures_iter(response)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()).trim().to_string())
            .collect();

        if filepaths.len() == artifacts.len() {
            for (artifact, path) in artifacts.iter_mut().zip(filepaths) {
                if let Artifact::Code { filepath, .. } = artifact {
                    *filepath = Some(path);
                }
            }
        }

        artifacts
    }
}

#[async_trait]
impl Agent for EngineerAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_handle(&self, _ctx: &RequestContext, intent: Intent) -> bool {
        intent == Intent::Code
    }

    async fn run(&self, ctx: &RequestContext) -> AgentOutput {
        let started = Instant::now();

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if !ctx.retrieved_chunks.is_empty() {
            system_prompt.push_str("\n\n## Existing Code Context\n");
            system_prompt.push_str(&Self::format_code_context(&ctx.retrieved_chunks));
        }
        let preferences = Self::code_preferences(ctx);
        if !preferences.is_empty() {
            system_prompt.push_str("\n\n## User Preferences\n");
            system_prompt.push_str(&preferences);
        }

        let user_message = match Self::specs_from_prior(ctx) {
            Some(specs) => format!(
                "{}\n\n## Technical Specifications\n{specs}",
                ctx.user_message
            ),
            None => ctx.user_message.clone(),
        };

        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];

        match self
            .gateway
            .chat(LlmRole::Engineer, &messages, &ChatOptions::default())
            .await
        {
            Ok(outcome) => {
                let mut output = AgentOutput::text(Self::NAME, outcome.text.clone()).finalized();
                output.artifacts = Self::extract_artifacts(&outcome.text);
                output.tokens_used = outcome.tokens_used;
                output.provider_used = Some(outcome.provider);
                output.model_used = Some(outcome.model);
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
            Err(err) => {
                error!(error = %err, "engineer agent failed");
                let mut output =
                    AgentOutput::text(Self::NAME, format!("Error generating code: {err}"))
                        .finalized();
                output.error = Some(err.to_string());
                output.processing_ms = started.elapsed().as_millis() as u64;
                output
            }
        }
    }
}
