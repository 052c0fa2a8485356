//! Frame-assumption detection on user questions.
//!
//! When a question assumes a post-biblical framework ("is the sabbath moral
//! or ceremonial?"), the frame itself must be challenged before answering
//! within it. Each framework carries its own challenge text; multiple
//! detections combine into one block.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::config::OverlayRules;

/// A detected framework assumption in a question.
#[derive(Debug, Clone)]
pub struct FrameAssumption {
    pub framework_id: String,
    pub framework_name: String,
    pub origin: String,
    pub trigger_phrase: String,
    pub challenge: String,
}

struct FramePatterns {
    id: &'static str,
    patterns: Vec<Regex>,
    challenge: &'static str,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid frame pattern '{p}': {e}"))
        })
        .collect()
}

fn builtin_frames() -> Vec<FramePatterns> {
    vec![
        FramePatterns {
            id: "moral_ceremonial_civil",
            patterns: compile(&[
                r"moral\s+law",
                r"ceremonial\s+law",
                r"civil\s+law",
                r"moral[,\s]+ceremonial",
                r"ceremonial[,\s]+(?:vs?\.?|versus|or)\s+moral",
                r"which\s+laws?\s+(?:are|is)\s+(?:still\s+)?(?:binding|valid)",
                r"(?:is|are)\s+(?:the\s+)?(?:dietary|food|sabbath)\s+(?:laws?|rules?)\s+(?:moral|ceremonial)",
            ]),
            challenge: "This question assumes a distinction between 'moral' and 'ceremonial' law \
                        that the text itself doesn't make. The Torah doesn't categorize commands \
                        this way; that framework developed in medieval scholasticism.\n\n\
                        Let's examine what the biblical texts actually say:",
        },
        FramePatterns {
            id: "fulfilled_equals_ended",
            patterns: compile(&[
                r"fulfilled\s+(?:means?|=|equals?)\s+(?:ended|abolished|done)",
                r"(?:did|does|has)\s+(?:jesus|christ)\s+(?:end|abolish|fulfill)",
                r"law\s+(?:was\s+)?fulfilled\s+(?:so|therefore|and)",
                r"fulfilled\s+(?:and\s+)?(?:therefore\s+)?(?:no\s+longer|not\s+)",
                r"since\s+(?:christ|jesus)\s+fulfilled",
            ]),
            challenge: "This question assumes 'fulfilled' means 'ended', but that equivalence \
                        isn't established in the text. In Matthew 5:17 the speaker explicitly \
                        denies coming to abolish, using 'fulfill' in contrast to 'destroy.'\n\n\
                        Let's look at how the texts actually use these terms:",
        },
        FramePatterns {
            id: "under_law_vs_grace",
            patterns: compile(&[
                r"under\s+(?:the\s+)?law\s+(?:or|vs?\.?|versus)\s+(?:under\s+)?grace",
                r"(?:are\s+)?(?:we|christians?)\s+(?:still\s+)?under\s+(?:the\s+)?law",
                r"grace\s+(?:replaced|replaces|vs?\.?|versus)\s+(?:the\s+)?law",
                r"law\s+(?:or|vs?\.?|versus)\s+grace",
                r"not\s+under\s+law\s+but\s+under\s+grace",
            ]),
            challenge: "This framing assumes 'under law' and 'under grace' are opposites, but the \
                        usage is more specific. In context, 'under law' often refers to the law's \
                        condemning function for those seeking justification by works, not to \
                        observance itself.\n\n\
                        Let's examine how the phrases are actually used:",
        },
        FramePatterns {
            id: "covenant_replacement",
            patterns: compile(&[
                r"new\s+covenant\s+(?:replaced?|replaces?|superseded?)",
                r"old\s+covenant\s+(?:ended|obsolete|replaced)",
                r"(?:did|does)\s+(?:the\s+)?new\s+covenant\s+(?:replace|end|abolish)",
                r"(?:are\s+)?(?:we|christians?)\s+(?:under|in)\s+(?:the\s+)?new\s+covenant\s+(?:not|instead)",
            ]),
            challenge: "This question assumes the New Covenant replaces rather than renews. But \
                        Jeremiah 31 describes the New Covenant as writing the same Torah on \
                        hearts — internalization, not replacement.\n\n\
                        Let's look at the covenant texts directly:",
        },
        FramePatterns {
            id: "works_of_law",
            patterns: compile(&[
                r"works\s+of\s+(?:the\s+)?law\s+(?:means?|=|refers?\s+to)\s+(?:torah|obedience|keeping)",
                r"(?:paul|scripture)\s+(?:condemns?|rejects?)\s+(?:keeping|obeying)\s+(?:the\s+)?law",
                r"justified\s+by\s+(?:faith|grace)\s+not\s+(?:by\s+)?(?:works|law)",
            ]),
            challenge: "This framing may conflate 'works of the law' with Torah obedience \
                        generally. Recent scholarship reads the phrase as covenant boundary \
                        markers (circumcision, dietary laws, calendar), not faithful obedience \
                        itself.\n\n\
                        Let's examine the actual usage:",
        },
        FramePatterns {
            id: "sabbath_categorization",
            patterns: compile(&[
                r"(?:is|was)\s+(?:the\s+)?sabbath\s+(?:ceremonial|moral)",
                r"sabbath\s+(?:ended|abolished|fulfilled|transferred)",
                r"(?:do|should)\s+(?:we|christians?)\s+(?:keep|observe)\s+(?:the\s+)?sabbath",
            ]),
            challenge: "This question assumes the Sabbath can be filed as 'ceremonial' or \
                        'moral', but that framework isn't biblical. The Sabbath is grounded in \
                        creation (Genesis 2) and the Decalogue (Exodus 20), yet involves specific \
                        practices.\n\n\
                        Let's look at what the texts say about Sabbath directly:",
        },
    ]
}

pub struct FrameAnalyzer {
    rules: Arc<OverlayRules>,
    frames: Vec<FramePatterns>,
}

impl FrameAnalyzer {
    pub fn new(rules: Arc<OverlayRules>) -> Self {
        Self {
            rules,
            frames: builtin_frames(),
        }
    }

    /// Detect framework assumptions in a question; one hit per framework.
    pub fn analyze(&self, question: &str) -> Vec<FrameAssumption> {
        let mut assumptions = Vec::new();
        for frame in &self.frames {
            let Some(m) = frame.patterns.iter().find_map(|p| p.find(question)) else {
                continue;
            };
            let info = self.rules.framework(frame.id);
            assumptions.push(FrameAssumption {
                framework_id: frame.id.to_string(),
                framework_name: info
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| frame.id.to_string()),
                origin: info
                    .map(|f| f.origin.clone())
                    .unwrap_or_else(|| "Post-biblical".to_string()),
                trigger_phrase: m.as_str().to_string(),
                challenge: frame.challenge.to_string(),
            });
        }
        assumptions
    }

    /// Combined challenge text, or `None` when no frame fires.
    pub fn challenge(&self, question: &str) -> Option<String> {
        let assumptions = self.analyze(question);
        match assumptions.as_slice() {
            [] => None,
            [single] => Some(single.challenge.clone()),
            many => Some(format!(
                "This question assumes several post-biblical frameworks:\n\n{}",
                many.iter()
                    .map(|a| format!("**{}:** {}", a.framework_name, a.challenge))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            )),
        }
    }
}
