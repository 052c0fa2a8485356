//! Heuristic intent patterns.
//!
//! Scanned in a fixed priority order: plan before write so complex writing
//! requests get planned first, memory first so explicit commands never leak
//! into other intents. The first matching pattern per intent wins; several
//! intents may fire for one message.

use regex::{Regex, RegexBuilder};
use sage_core::Intent;

/// Priority order for heuristic scanning.
pub const PRIORITY_ORDER: &[Intent] = &[
    Intent::Memory,
    Intent::Plan,
    Intent::Code,
    Intent::Write,
    Intent::Research,
    Intent::Summarize,
    Intent::Explain,
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid intent pattern '{p}': {e}"))
        })
        .collect()
}

pub struct IntentPatterns {
    memory: Vec<Regex>,
    plan: Vec<Regex>,
    code: Vec<Regex>,
    write: Vec<Regex>,
    research: Vec<Regex>,
    summarize: Vec<Regex>,
    explain: Vec<Regex>,
}

impl IntentPatterns {
    pub fn new() -> Self {
        Self {
            memory: compile(&[
                r"\bremember\s+(that|this|my)\b",
                r"\bdon'?t\s+forget\b",
                r"\bforget\s+(that|this|my)\b",
                r"\bi\s+prefer\b",
                r"\bmy\s+(name|preference|favorite)\b",
                r"\bstore\s+(this|that)\s+(in\s+)?memory\b",
            ]),
            plan: compile(&[
                r"\b(plan|organize|break\s*down)\s+(a\s+)?(project|writing|article|series)\b",
                r"\bcreate\s+(a\s+)?(project\s+)?plan\b",
                r"\bhelp\s+me\s+(plan|organize)\b",
                r"\b(multi-?step|complex)\s+(project|writing)\b",
                r"\bsteps\s+(to|for)\s+(write|create|produce)\b",
                r"\bi'?d?\s+like\s+to\s+(write|create|draft)\s+(an?\s+)?(article|essay|piece|series)\b",
                r"\b(write|create|draft)\s+(an?\s+)?(article|essay|piece)\s+(exploring|examining|investigating|connecting|comparing)\b",
                r"\bhow\s+.+\s+connects?\s+to\b.*\b(article|essay|piece|write)\b",
            ]),
            code: compile(&[
                r"\b(write|create|generate|fix|debug)\s+(\w+\s+)*(code|function|class|script|method)\b",
                r"\bimplement\b",
                r"\b(add|update|modify)\s+(a\s+)?(\w+\s+)*(feature|endpoint|component|function)\b",
                r"\b(code|patch|refactor)\b.*\b(for|to|that)\b",
                r"\bbuild\s+(a\s+)?(\w+\s+)*(component|feature|api|service)\b",
            ]),
            write: compile(&[
                r"^(write|draft|compose)\s+(me\s+)?(an?\s+)?(\w+\s+)?(article|essay|summary|document|post|outline|teaching|sermon|paragraph|piece|response|explanation|blog)",
                r"\b(write|draft|compose|create)\s+(an?\s+)?(\w+\s+)?(article|essay|summary|document|post|outline|teaching|sermon|paragraph|piece|response|explanation|blog)",
                r"\b(summarize|explain)\b.*\b(in|as)\s+(an?\s+)?(article|essay|paragraph)",
                r"\bwrite\s+(about|on)\b",
            ]),
            research: compile(&[
                r"\b(research|analyze|find|search|look up|investigate)\b",
                r"\bwhat (do|does|did|is|are|was|were)\b.*\b(say|mention|state|indicate)\b",
                r"\baccording to\b",
                r"\bin the (document|file|source|transcript)",
                r"\bcompare\b.*\b(and|with|to)\b",
                r"\b(matthew|mark|luke|john|genesis|exodus|leviticus|deuteronomy|psalm|proverb|isaiah|jeremiah|ezekiel|daniel|romans|corinthians|galatians|ephesians|hebrews|revelation)\s+\d",
                r"\b(torah|gospel|epistle|scripture|biblical|talmud|midrash)\b",
                r"\b(hebrew|greek)\s+(word|term|meaning|root)\b",
                r"\brelationship\s+between\b.*\b(and|teaching|doctrine)\b",
            ]),
            summarize: compile(&[
                r"\bsummarize\b",
                r"\bgive\s+(me\s+)?(a\s+)?summary\b",
                r"\bwhat('s| is) the (main|key|gist)\b",
                r"\btl;?dr\b",
            ]),
            explain: compile(&[
                r"\bexplain\b",
                r"\bwhat (is|are|does)\b",
                r"\bhow (do|does|did|to)\b",
                r"\bwhy (is|are|does|did)\b",
            ]),
        }
    }

    fn patterns_for(&self, intent: Intent) -> &[Regex] {
        match intent {
            Intent::Memory => &self.memory,
            Intent::Plan => &self.plan,
            Intent::Code => &self.code,
            Intent::Write => &self.write,
            Intent::Research => &self.research,
            Intent::Summarize => &self.summarize,
            Intent::Explain => &self.explain,
            _ => &[],
        }
    }

    /// Detected intents in priority order. Empty when nothing fires.
    pub fn classify(&self, message: &str) -> Vec<Intent> {
        let mut detected = Vec::new();
        for &intent in PRIORITY_ORDER {
            if self
                .patterns_for(intent)
                .iter()
                .any(|p| p.is_match(message))
            {
                detected.push(intent);
            }
        }
        detected
    }
}

impl Default for IntentPatterns {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_remember_is_memory_first() {
        let patterns = IntentPatterns::new();
        let intents = patterns.classify("Remember that I prefer three-paragraph responses.");
        assert_eq!(intents.first(), Some(&Intent::Memory));
    }

    #[test]
    fn complex_article_request_plans_before_writing() {
        let patterns = IntentPatterns::new();
        let intents = patterns.classify("I'd like to write an article connecting X to Y.");
        assert_eq!(intents.first(), Some(&Intent::Plan));
    }

    #[test]
    fn scripture_reference_fires_research() {
        let patterns = IntentPatterns::new();
        let intents = patterns.classify("What does Romans 8 say about the law?");
        assert!(intents.contains(&Intent::Research));
    }

    #[test]
    fn summarize_fires_for_tldr() {
        let patterns = IntentPatterns::new();
        assert!(patterns.classify("tl;dr of this file please").contains(&Intent::Summarize));
        assert!(patterns
            .classify("Summarize the project.")
            .contains(&Intent::Summarize));
    }

    #[test]
    fn code_request_fires_code_first() {
        let patterns = IntentPatterns::new();
        let intents = patterns.classify("implement a retry wrapper for the client");
        assert_eq!(intents.first(), Some(&Intent::Code));
    }

    #[test]
    fn chitchat_matches_nothing() {
        let patterns = IntentPatterns::new();
        assert!(patterns.classify("good morning!").is_empty());
    }

    #[test]
    fn multiple_intents_keep_priority_order() {
        let patterns = IntentPatterns::new();
        let intents = patterns.classify("summarize and explain what the document says");
        let positions: Vec<usize> = intents
            .iter()
            .map(|i| PRIORITY_ORDER.iter().position(|p| p == i).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }
}
