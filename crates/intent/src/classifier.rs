//! The two-tier classifier.

use std::sync::Arc;

use sage_core::Intent;
use sage_llm::{ChatMessage, ChatOptions, LlmGateway, LlmRole};
use tracing::{debug, warn};

use crate::cache::{CacheStats, ClassificationCache};
use crate::patterns::IntentPatterns;

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Heuristic,
    LocalLlm,
    LocalLlmCache,
    None,
}

impl IntentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentSource::Heuristic => "heuristic",
            IntentSource::LocalLlm => "local_llm",
            IntentSource::LocalLlmCache => "local_llm_cache",
            IntentSource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub intents: Vec<Intent>,
    pub source: IntentSource,
}

/// Intents the LLM fallback is allowed to return. Plan and general stay
/// heuristic-only; a hallucinated "plan" from a small model would hijack the
/// pipeline.
const LLM_ALLOWED: &[Intent] = &[
    Intent::Research,
    Intent::Write,
    Intent::Summarize,
    Intent::Explain,
    Intent::Code,
    Intent::Memory,
];

pub struct IntentClassifier {
    patterns: IntentPatterns,
    cache: ClassificationCache,
    gateway: Option<Arc<LlmGateway>>,
}

impl IntentClassifier {
    pub fn new(gateway: Option<Arc<LlmGateway>>, cache_capacity: usize) -> Self {
        Self {
            patterns: IntentPatterns::new(),
            cache: ClassificationCache::new(cache_capacity),
            gateway,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Classify one message. Deterministic for a fixed input and
    /// configuration: heuristics are pure, and LLM answers are cached.
    pub async fn classify(&self, message: &str) -> Classification {
        if message.trim().is_empty() {
            return Classification {
                intents: Vec::new(),
                source: IntentSource::None,
            };
        }

        let heuristic = self.patterns.classify(message);
        if !heuristic.is_empty() {
            debug!(intents = ?heuristic, "heuristic classification");
            return Classification {
                intents: heuristic,
                source: IntentSource::Heuristic,
            };
        }

        if let Some(cached) = self.cache.get(message) {
            return Classification {
                intents: cached,
                source: IntentSource::LocalLlmCache,
            };
        }

        let Some(gateway) = &self.gateway else {
            return Classification {
                intents: Vec::new(),
                source: IntentSource::None,
            };
        };

        match self.classify_llm(gateway, message).await {
            Some(intents) if !intents.is_empty() => {
                self.cache.set(message, intents.clone());
                Classification {
                    intents,
                    source: IntentSource::LocalLlm,
                }
            }
            _ => Classification {
                intents: Vec::new(),
                source: IntentSource::None,
            },
        }
    }

    async fn classify_llm(&self, gateway: &LlmGateway, message: &str) -> Option<Vec<Intent>> {
        let prompt = format!(
            "Classify the following user message into one or more intent categories.\n\n\
             Categories:\n\
             - research: Looking up information, analyzing sources, comparing documents\n\
             - write: Creating prose content, articles, summaries, essays\n\
             - summarize: Condensing content, getting the gist, TL;DR\n\
             - explain: Understanding concepts, how things work, why something is\n\
             - code: Writing, fixing, or modifying code, implementing features\n\
             - memory: Storing preferences, remembering information, forgetting things\n\
             - general: General conversation, greetings, chitchat\n\n\
             User message: \"{message}\"\n\n\
             Respond with ONLY a JSON array of intent strings, most specific first.\n\
             Example: [\"research\", \"summarize\"]\n\
             Example: [\"code\"]\n\
             Example: [\"general\"]\n\n\
             JSON array:"
        );

        let options = ChatOptions::default().with_temperature(0.1);
        let outcome = match gateway
            .chat(LlmRole::Classifier, &[ChatMessage::user(prompt)], &options)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                // Classifier failures are silent; the heuristic (empty)
                // result stands and the router falls through.
                warn!(%error, "local LLM classification failed");
                return None;
            }
        };

        parse_intent_array(&outcome.text)
    }
}

/// Parse the model's JSON array, tolerating fenced code blocks, and filter to
/// the allowed set.
fn parse_intent_array(raw: &str) -> Option<Vec<Intent>> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```") {
        let stripped = stripped.strip_prefix("json").unwrap_or(stripped);
        text = stripped.split("```").next().unwrap_or("").trim();
    }

    let labels: Vec<String> = serde_json::from_str(text).ok()?;
    let intents: Vec<Intent> = labels
        .iter()
        .filter_map(|label| Intent::parse(label))
        .filter(|intent| LLM_ALLOWED.contains(intent))
        .collect();
    Some(intents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_message_classifies_to_nothing() {
        let classifier = IntentClassifier::new(None, 10);
        let result = classifier.classify("   ").await;
        assert!(result.intents.is_empty());
        assert_eq!(result.source, IntentSource::None);
    }

    #[tokio::test]
    async fn heuristic_hit_skips_llm_entirely() {
        // No gateway configured; a heuristic match must still classify.
        let classifier = IntentClassifier::new(None, 10);
        let result = classifier.classify("summarize the document").await;
        assert_eq!(result.source, IntentSource::Heuristic);
        assert!(result.intents.contains(&Intent::Summarize));
    }

    #[tokio::test]
    async fn no_gateway_and_no_heuristic_returns_none() {
        let classifier = IntentClassifier::new(None, 10);
        let result = classifier.classify("hmm, interesting weather").await;
        assert!(result.intents.is_empty());
        assert_eq!(result.source, IntentSource::None);
    }

    #[test]
    fn parse_accepts_bare_array() {
        let intents = parse_intent_array(r#"["research", "summarize"]"#).unwrap();
        assert_eq!(intents, vec![Intent::Research, Intent::Summarize]);
    }

    #[test]
    fn parse_accepts_fenced_array() {
        let intents = parse_intent_array("```json\n[\"code\"]\n```").unwrap();
        assert_eq!(intents, vec![Intent::Code]);
    }

    #[test]
    fn parse_filters_disallowed_and_unknown_labels() {
        let intents = parse_intent_array(r#"["general", "plan", "banana", "write"]"#).unwrap();
        assert_eq!(intents, vec![Intent::Write]);
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_intent_array("I think this is research").is_none());
    }
}
