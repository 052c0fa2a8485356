//! Message-level detectors used by sequence selection.

use regex::{Regex, RegexBuilder};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid detector pattern '{p}': {e}"))
        })
        .collect()
}

/// Detects scholarly/theological questions. These route to the researcher
/// even without project context.
pub struct ScholarlyDetector {
    patterns: Vec<Regex>,
}

impl ScholarlyDetector {
    pub fn new() -> Self {
        Self {
            patterns: compile(&[
                r"\b(matthew|mark|luke|john|acts|romans|corinthians|galatians|ephesians|philippians|colossians|thessalonians|timothy|titus|philemon|hebrews|james|peter|jude|revelation)\s+\d",
                r"\b(genesis|exodus|leviticus|numbers|deuteronomy|joshua|judges|ruth|samuel|kings|chronicles|ezra|nehemiah|esther|job|psalm|proverbs|ecclesiastes|song|isaiah|jeremiah|lamentations|ezekiel|daniel|hosea|joel|amos|obadiah|jonah|micah|nahum|habakkuk|zephaniah|haggai|zechariah|malachi)\b",
                r"\b(torah|tanakh|talmud|midrash|mishnah|gemara|targum)\b",
                r"\b(gospel|epistle|scripture|biblical|covenant|commandment|sabbath|passover|pentecost|tabernacle|temple)\b",
                r"\b(hebrew|greek|aramaic)\s+(word|term|meaning|root|text)\b",
                r"\b(law|grace|faith|works|righteousness|justification|sanctification|atonement|redemption|salvation)\b.*\b(bible|scripture|paul|jesus|moses|god)\b",
                r"\b(exegesis|hermeneutic|interpretation|context|original|meaning)\b.*\b(text|passage|verse|scripture)\b",
                r"\bwhat\s+(does|did)\s+(jesus|paul|moses|david|peter|james)\s+(say|teach|mean)\b",
                r"\b(christian|jewish|messianic)\s+(teaching|doctrine|tradition|interpretation)\b",
                r"\brelationship\s+between\b.*\b(law|grace|faith|works|old testament|new testament)\b",
                r"\b(fulfilled|abolish|fulfill)\b.*\b(law|commandment|torah)\b",
            ]),
        }
    }

    pub fn is_scholarly(&self, message: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(message))
    }
}

impl Default for ScholarlyDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Detects messages that reference project-specific code or files.
pub struct ProjectReferenceDetector {
    patterns: Vec<Regex>,
}

impl ProjectReferenceDetector {
    pub fn new() -> Self {
        Self {
            patterns: compile(&[
                r"\b(the|this|my|our)\s+(code|codebase|project|repo|file|function|class|module)\b",
                r"\b(fix|update|modify|refactor|change)\s+(the|this|my)\b",
                r"\bin\s+(the|this|my)\s+\w+\.(rs|py|js|ts|jsx|tsx|go)\b",
                r"\b(based on|following|using)\s+(the|this|our)\s+(pattern|style|convention)\b",
                r"\badd\s+(to|into)\s+(the|this|my)\b",
                r"\b(existing|current)\s+\w+",
            ]),
        }
    }

    pub fn references_project(&self, message: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(message))
    }
}

impl Default for ProjectReferenceDetector {
    fn default() -> Self {
        Self::new()
    }
}
