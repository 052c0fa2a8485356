//! Relevance decay.
//!
//! ```text
//! score' = raw_cosine × recency_factor × confidence_factor
//! recency_factor   = 0.5 ^ (age_days / half_life)     (core: always 1)
//! confidence_factor = 0.4 + confidence × 1.2
//! ```
//!
//! Half-lives: 14 days episodic, 180 days long-term. Age is measured from
//! `last_accessed`, so memories the user keeps touching stay warm.

use chrono::{DateTime, Utc};

use crate::schema::MemoryTier;

#[derive(Debug, Clone, Copy)]
pub struct DecayParams {
    pub episodic_half_life_days: f32,
    pub long_term_half_life_days: f32,
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            episodic_half_life_days: 14.0,
            long_term_half_life_days: 180.0,
        }
    }
}

/// Apply the decay rule to a raw similarity score.
pub fn decayed_score(
    raw_score: f32,
    tier: MemoryTier,
    last_accessed: DateTime<Utc>,
    confidence: f32,
    now: DateTime<Utc>,
    params: &DecayParams,
) -> f32 {
    if tier == MemoryTier::Core {
        return raw_score;
    }

    let age_days = (now - last_accessed).num_seconds().max(0) as f32 / 86_400.0;
    let half_life = match tier {
        MemoryTier::Episodic => params.episodic_half_life_days,
        _ => params.long_term_half_life_days,
    };
    let recency_factor = 0.5_f32.powf(age_days / half_life);
    let confidence_factor = 0.4 + confidence.clamp(0.0, 1.0) * 1.2;

    raw_score * recency_factor * confidence_factor
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn core_tier_bypasses_decay() {
        let now = Utc::now();
        let old = now - Duration::days(365);
        let score = decayed_score(0.8, MemoryTier::Core, old, 0.1, now, &DecayParams::default());
        assert_eq!(score, 0.8);
    }

    #[test]
    fn episodic_halves_after_its_half_life() {
        let now = Utc::now();
        let aged = now - Duration::days(14);
        // Confidence 0.5 → factor exactly 1.0, isolating the recency term.
        let score = decayed_score(
            1.0,
            MemoryTier::Episodic,
            aged,
            0.5,
            now,
            &DecayParams::default(),
        );
        assert!((score - 0.5).abs() < 0.01, "got {score}");
    }

    #[test]
    fn long_term_decays_much_slower_than_episodic() {
        let now = Utc::now();
        let aged = now - Duration::days(30);
        let params = DecayParams::default();
        let long_term = decayed_score(1.0, MemoryTier::LongTerm, aged, 0.5, now, &params);
        let episodic = decayed_score(1.0, MemoryTier::Episodic, aged, 0.5, now, &params);
        assert!(long_term > episodic);
    }

    #[test]
    fn confidence_factor_spans_documented_range() {
        let now = Utc::now();
        // Fresh memory: recency ≈ 1, so the score is raw × confidence factor.
        let low = decayed_score(1.0, MemoryTier::LongTerm, now, 0.0, now, &DecayParams::default());
        let high = decayed_score(1.0, MemoryTier::LongTerm, now, 1.0, now, &DecayParams::default());
        assert!((low - 0.4).abs() < 0.01, "got {low}");
        assert!((high - 1.6).abs() < 0.01, "got {high}");
    }

    #[test]
    fn future_last_accessed_does_not_boost() {
        let now = Utc::now();
        let future = now + Duration::days(5);
        let score = decayed_score(
            1.0,
            MemoryTier::Episodic,
            future,
            0.5,
            now,
            &DecayParams::default(),
        );
        assert!(score <= 1.0);
    }
}
