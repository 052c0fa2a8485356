//! Epistemic pipeline: classify → lint → anchor → repair.
//!
//! Runs after the pipeline produces user-facing text and before delivery.
//! Classification assigns a provenance tier, the linter flags overconfident
//! or over-hedged language, anchoring tries to attach evidence under a time
//! budget, and repair makes the smallest change that fixes the flagged
//! issue: attach evidence first, soften phrasing second, never rewrite
//! tone. A pipeline failure returns the unmodified text with no badge.

pub mod anchor;
pub mod classifier;
pub mod linter;
pub mod pipeline;
pub mod repair;
pub mod rules;

pub use anchor::{Anchor, AnchorResult, AnchorService, EvidenceSource, SessionEvidence};
pub use classifier::{
    AnswerClassifier, AnswerType, ClassificationResult, ClassifyContext, ContestationLevel,
};
pub use linter::{
    ConfidenceLinter, IssueCategory, LintIssue, LintResult, LintSeverity, RepairStrategy,
};
pub use pipeline::{Badge, EpistemicMetadata, EpistemicPipeline, EpistemicResult, SessionContext};
pub use repair::{RepairResult, RepairService};
pub use rules::EpistemicRules;
