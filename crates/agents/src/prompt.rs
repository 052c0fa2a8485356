//! Prompt-building helpers shared by the agents.

use sage_core::{AgentContent, AgentOutput, Chunk, Citation, ContextMemory};
use serde::de::DeserializeOwned;

/// Format retrieved chunks as numbered sources for an agent prompt.
/// Long chunks are truncated so a single source can't swamp the context.
pub fn format_sources(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return "## Sources\nNo sources provided.".to_string();
    }

    let mut lines = vec!["## Sources".to_string(), String::new()];
    for (i, chunk) in chunks.iter().enumerate() {
        let mut header = format!("[{}] {}", i + 1, chunk.filename);
        if let Some(page) = chunk.page {
            header.push_str(&format!(" (page {page})"));
        }
        if chunk.score > 0.0 {
            header.push_str(&format!(" [relevance: {:.2}]", chunk.score));
        }

        let mut content: String = chunk.content.chars().take(2000).collect();
        if chunk.content.chars().count() > 2000 {
            content.push_str("...[truncated]");
        }

        lines.push(header);
        lines.push(content);
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Format injected memories for a system prompt, most relevant first.
pub fn format_memories(memories: &[ContextMemory], limit: usize) -> String {
    memories
        .iter()
        .take(limit)
        .map(|m| format!("- [{}] {}", m.category, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format outputs from earlier pipeline steps for a downstream agent.
pub fn format_prior_outputs(outputs: &[AgentOutput]) -> String {
    if outputs.is_empty() {
        return String::new();
    }

    let mut lines = vec!["## Previous Agent Outputs".to_string(), String::new()];
    for output in outputs {
        lines.push(format!("### From {}:", output.agent));
        match &output.content {
            AgentContent::Text(text) => lines.push(text.clone()),
            other => {
                lines.push(serde_json::to_string_pretty(other).unwrap_or_default());
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Build citations from retrieved chunks, one per chunk.
pub fn citations_from_chunks(chunks: &[Chunk]) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            file_id: chunk.file_id,
            filename: Some(chunk.filename.clone()),
            chunk_index: Some(chunk.chunk_index),
            page: chunk.page,
            relevance_score: Some(chunk.score),
            ..Citation::new(chunk.content.clone())
        })
        .collect()
}

/// Extract structured JSON from an LLM reply.
///
/// Strategy 1: the first fenced ```json block. Strategy 2: the outermost
/// bare object. Returns `None` when neither parses.
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Option<T> {
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(fence_end) = after_fence.find("```") {
            let body = after_fence[..fence_end].trim();
            if let Ok(value) = serde_json::from_str(body) {
                return Some(value);
            }
        }
    } else if let Some(fence_start) = response.find("```") {
        let after_fence = &response[fence_start + 3..];
        if let Some(fence_end) = after_fence.find("```") {
            let body = after_fence[..fence_end].trim();
            if let Ok(value) = serde_json::from_str(body) {
                return Some(value);
            }
        }
    }

    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use sage_core::{ChunkOrigin, ResearchNotes};

    use super::*;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            file_id: Some(1),
            filename: "notes.md".to_string(),
            chunk_index: 0,
            page: Some(3),
            content: content.to_string(),
            score: 0.82,
            origin: ChunkOrigin::Project,
        }
    }

    #[test]
    fn sources_are_numbered_with_page_and_relevance() {
        let formatted = format_sources(&[chunk("covenant text")]);
        assert!(formatted.contains("[1] notes.md (page 3) [relevance: 0.82]"));
        assert!(formatted.contains("covenant text"));
    }

    #[test]
    fn empty_sources_say_so() {
        assert!(format_sources(&[]).contains("No sources provided"));
    }

    #[test]
    fn long_chunks_are_truncated() {
        let formatted = format_sources(&[chunk(&"x".repeat(3000))]);
        assert!(formatted.contains("...[truncated]"));
    }

    #[test]
    fn citations_carry_chunk_metadata() {
        let citations = citations_from_chunks(&[chunk("some snippet text")]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_id, Some(1));
        assert_eq!(citations[0].page, Some(3));
        assert_eq!(citations[0].snippet, "some snippet text");
    }

    #[test]
    fn extract_json_prefers_fenced_block() {
        let raw = "prose {\"summary\": \"bare\"}\n```json\n{\"summary\": \"fenced\"}\n```";
        let notes: ResearchNotes = extract_json(raw).unwrap();
        assert_eq!(notes.summary, "fenced");
    }

    #[test]
    fn extract_json_falls_back_to_bare_object() {
        let raw = "Here you go: {\"summary\": \"bare\"} hope that helps";
        let notes: ResearchNotes = extract_json(raw).unwrap();
        assert_eq!(notes.summary, "bare");
    }

    #[test]
    fn extract_json_returns_none_for_prose() {
        assert!(extract_json::<ResearchNotes>("no json here at all").is_none());
    }
}
