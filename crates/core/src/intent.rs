use serde::{Deserialize, Serialize};

/// Classified user intent.
///
/// The classifier returns a ranked list of these; the router keys its agent
/// sequence off the first entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Research,
    Write,
    Summarize,
    Explain,
    Code,
    Memory,
    Plan,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Research => "research",
            Intent::Write => "write",
            Intent::Summarize => "summarize",
            Intent::Explain => "explain",
            Intent::Code => "code",
            Intent::Memory => "memory",
            Intent::Plan => "plan",
            Intent::General => "general",
        }
    }

    /// Parse a lowercase intent label. Unknown labels return `None` so
    /// callers can filter LLM output down to the allowed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "research" => Some(Intent::Research),
            "write" => Some(Intent::Write),
            "summarize" => Some(Intent::Summarize),
            "explain" => Some(Intent::Explain),
            "code" => Some(Intent::Code),
            "memory" => Some(Intent::Memory),
            "plan" => Some(Intent::Plan),
            "general" => Some(Intent::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn parse_round_trips_all_variants() {
        for intent in [
            Intent::Research,
            Intent::Write,
            Intent::Summarize,
            Intent::Explain,
            Intent::Code,
            Intent::Memory,
            Intent::Plan,
            Intent::General,
        ] {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn parse_rejects_unknown_labels() {
        assert_eq!(Intent::parse("chitchat"), None);
        assert_eq!(Intent::parse(""), None);
    }
}
