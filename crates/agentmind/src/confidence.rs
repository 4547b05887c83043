//! Three-dimensional composite confidence: scoring, tiering, and decay.
//!
//! All functions here are pure. Scores are rounded to two decimals so that
//! values read back from disk compare equal to freshly computed ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::CompositeConfidence;

/// Relative weight of each dimension in the composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub frequency: f64,
    pub effectiveness: f64,
    pub human: f64,
}

pub const DEFAULT_WEIGHTS: ConfidenceWeights = ConfidenceWeights {
    frequency: 0.35,
    effectiveness: 0.40,
    human: 0.25,
};

/// Any dimension below this discounts the whole composite.
pub const DEGRADATION_THRESHOLD: f64 = 0.2;

/// Multiplier applied when a dimension falls below the threshold.
pub const DEGRADATION_PENALTY: f64 = 0.9;

/// z-score for a ~95% Wilson lower bound.
pub const DEFAULT_Z: f64 = 1.96;

/// Weekly multiplicative loss applied to the frequency dimension.
pub const DEFAULT_DECAY_RATE: f64 = 0.02;

/// Default step for a single human review.
pub const DEFAULT_HUMAN_STRENGTH: f64 = 0.3;

/// Accepted range for the human review step.
pub const HUMAN_STRENGTH_RANGE: (f64, f64) = (0.1, 0.5);

/// Observation count at which the frequency curve saturates.
const FREQUENCY_SATURATION: f64 = 100.0;

const BAR_WIDTH: usize = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Composite score using the default weights.
pub fn calculate_composite(frequency: f64, effectiveness: f64, human: f64) -> f64 {
    calculate_composite_weighted(frequency, effectiveness, human, &DEFAULT_WEIGHTS)
}

/// Composite score with explicit weights.
pub fn calculate_composite_weighted(
    frequency: f64,
    effectiveness: f64,
    human: f64,
    weights: &ConfidenceWeights,
) -> f64 {
    let raw = frequency * weights.frequency
        + effectiveness * weights.effectiveness
        + human * weights.human;

    let min_dim = frequency.min(effectiveness).min(human);
    let penalty = if min_dim < DEGRADATION_THRESHOLD {
        DEGRADATION_PENALTY
    } else {
        1.0
    };

    round2(raw * penalty).clamp(0.0, 1.0)
}

/// Confidence band that drives how strongly an instinct is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Deprecated,
    Tentative,
    Moderate,
    Strong,
    Core,
}

impl ConfidenceTier {
    /// Bands are inclusive at their lower edge.
    pub fn from_score(composite: f64) -> Self {
        if composite >= 0.8 {
            ConfidenceTier::Core
        } else if composite >= 0.6 {
            ConfidenceTier::Strong
        } else if composite >= 0.4 {
            ConfidenceTier::Moderate
        } else if composite >= 0.2 {
            ConfidenceTier::Tentative
        } else {
            ConfidenceTier::Deprecated
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceTier::Core => "core",
            ConfidenceTier::Strong => "strong",
            ConfidenceTier::Moderate => "moderate",
            ConfidenceTier::Tentative => "tentative",
            ConfidenceTier::Deprecated => "deprecated",
        }
    }

    /// The application policy for this tier.
    pub fn description(self) -> &'static str {
        match self {
            ConfidenceTier::Core => "Auto-apply (very high confidence)",
            ConfidenceTier::Strong => "Suggest strongly when relevant",
            ConfidenceTier::Moderate => "Mention when context matches",
            ConfidenceTier::Tentative => "Only if specifically asked",
            ConfidenceTier::Deprecated => "Scheduled for removal",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logarithmic frequency score: early observations count the most.
///
/// 1 obs → 0.15, 10 obs → 0.52, 100 obs → 1.0.
///
/// Signed on purpose: callers may pass a raw difference, and zero or negative
/// counts score 0.
pub fn frequency_score(observation_count: i64) -> f64 {
    if observation_count <= 0 {
        return 0.0;
    }
    let score = ((observation_count as f64) + 1.0).log10() / (FREQUENCY_SATURATION + 1.0).log10();
    round2(score.min(1.0))
}

/// Wilson score interval lower bound for `successes / total`.
///
/// Returns the neutral 0.5 when there is no evidence at all.
pub fn effectiveness_score(successes: u64, total: u64, z: f64) -> f64 {
    if total == 0 {
        return 0.5;
    }

    let n = total as f64;
    let phat = (successes.min(total) as f64) / n;
    let z2 = z * z;

    let denominator = 1.0 + z2 / n;
    let center = phat + z2 / (2.0 * n);
    let spread = z * ((phat * (1.0 - phat) + z2 / (4.0 * n)) / n).sqrt();

    let lower_bound = (center - spread) / denominator;
    round2(lower_bound.clamp(0.0, 1.0))
}

/// Additive human approval update, clamped to [0, 1].
///
/// `strength` is held to [`HUMAN_STRENGTH_RANGE`].
pub fn update_human_score(current: f64, approved: bool, strength: f64) -> f64 {
    let (lo, hi) = HUMAN_STRENGTH_RANGE;
    let step = strength.clamp(lo, hi);
    let adjustment = if approved { step } else { -step };
    round2((current + adjustment).clamp(0.0, 1.0))
}

/// Weekly decay of the frequency dimension. Effectiveness and human scores
/// are untouched; the composite is recomputed.
pub fn apply_decay(
    confidence: &CompositeConfidence,
    weeks_since_last_seen: f64,
    decay_rate: f64,
) -> CompositeConfidence {
    if weeks_since_last_seen <= 0.0 {
        return *confidence;
    }

    let factor = (1.0 - decay_rate.clamp(0.0, 1.0)).powf(weeks_since_last_seen);
    CompositeConfidence::new(
        confidence.frequency() * factor,
        confidence.effectiveness(),
        confidence.human(),
    )
}

/// Display-ready summary of a confidence value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfidenceSummary {
    pub bar: String,
    pub percent: u32,
    pub tier: ConfidenceTier,
    pub frequency_pct: u32,
    pub effectiveness_pct: u32,
    pub human_pct: u32,
}

fn percent(value: f64) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}

pub fn summarize(confidence: &CompositeConfidence) -> ConfidenceSummary {
    let filled = ((confidence.composite() * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

    ConfidenceSummary {
        bar,
        percent: percent(confidence.composite()),
        tier: confidence.tier(),
        frequency_pct: percent(confidence.frequency()),
        effectiveness_pct: percent(confidence.effectiveness()),
        human_pct: percent(confidence.human()),
    }
}

impl fmt::Display for ConfidenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}% [{}] (F:{} E:{} H:{})",
            self.bar,
            self.percent,
            self.tier,
            self.frequency_pct,
            self.effectiveness_pct,
            self.human_pct
        )
    }
}

/// One-line rendering: bar, percentage, tier, and raw dimensions.
pub fn format_confidence(confidence: &CompositeConfidence) -> String {
    summarize(confidence).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_extremes() {
        assert_eq!(calculate_composite(1.0, 1.0, 1.0), 1.0);
        assert_eq!(calculate_composite(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_composite_weighting() {
        // 0.8*0.35 + 0.9*0.40 + 0.7*0.25 = 0.815
        let composite = calculate_composite(0.8, 0.9, 0.7);
        assert!((composite - 0.815).abs() <= 0.005 + f64::EPSILON);
    }

    #[test]
    fn test_degradation_penalty() {
        let degraded = calculate_composite(0.1, 0.5, 0.5);
        let neutral = calculate_composite(0.5, 0.5, 0.5);
        assert!(degraded < neutral);
        // raw 0.36 * 0.9
        assert_eq!(degraded, 0.32);
    }

    #[test]
    fn test_no_penalty_at_threshold() {
        // 0.2*0.35 + 1.0*0.40 + 1.0*0.25 = 0.72, undiscounted
        assert_eq!(calculate_composite(0.2, 1.0, 1.0), 0.72);
    }

    #[test]
    fn test_custom_weights() {
        let weights = ConfidenceWeights {
            frequency: 1.0,
            effectiveness: 0.0,
            human: 0.0,
        };
        assert_eq!(calculate_composite_weighted(0.7, 0.3, 0.3, &weights), 0.7);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_score(0.8), ConfidenceTier::Core);
        assert_eq!(ConfidenceTier::from_score(0.79999), ConfidenceTier::Strong);
        assert_eq!(ConfidenceTier::from_score(0.6), ConfidenceTier::Strong);
        assert_eq!(ConfidenceTier::from_score(0.4), ConfidenceTier::Moderate);
        assert_eq!(ConfidenceTier::from_score(0.2), ConfidenceTier::Tentative);
        assert_eq!(ConfidenceTier::from_score(0.0), ConfidenceTier::Deprecated);
        assert_eq!(ConfidenceTier::from_score(1.0), ConfidenceTier::Core);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ConfidenceTier::Core > ConfidenceTier::Strong);
        assert!(ConfidenceTier::Tentative > ConfidenceTier::Deprecated);
    }

    #[test]
    fn test_frequency_score_bounds() {
        assert_eq!(frequency_score(0), 0.0);
        assert_eq!(frequency_score(-5), 0.0);
        assert_eq!(frequency_score(100), 1.0);
        assert_eq!(frequency_score(1_000_000), 1.0);
    }

    #[test]
    fn test_frequency_score_monotone() {
        let mut previous = 0.0;
        for n in 0..500 {
            let score = frequency_score(n);
            assert!(score >= previous, "score dropped at n={n}");
            assert!(score <= 1.0);
            previous = score;
        }
    }

    #[test]
    fn test_frequency_score_curve() {
        assert_eq!(frequency_score(1), 0.15);
        assert_eq!(frequency_score(10), 0.52);
    }

    #[test]
    fn test_effectiveness_neutral_without_data() {
        assert_eq!(effectiveness_score(0, 0, DEFAULT_Z), 0.5);
    }

    #[test]
    fn test_effectiveness_wilson_conservatism() {
        let large = effectiveness_score(100, 100, DEFAULT_Z);
        let small = effectiveness_score(2, 2, DEFAULT_Z);
        assert!(large > small);
        assert!(small < 1.0);
        assert!(large <= 1.0);
    }

    #[test]
    fn test_effectiveness_all_failures() {
        assert_eq!(effectiveness_score(0, 50, DEFAULT_Z), 0.0);
    }

    #[test]
    fn test_effectiveness_excess_successes_clamped() {
        assert_eq!(
            effectiveness_score(20, 10, DEFAULT_Z),
            effectiveness_score(10, 10, DEFAULT_Z)
        );
    }

    #[test]
    fn test_human_score_updates() {
        assert_eq!(update_human_score(0.5, true, 0.3), 0.8);
        assert_eq!(update_human_score(0.5, false, 0.3), 0.2);
    }

    #[test]
    fn test_human_score_saturates() {
        let mut score = 0.5;
        for _ in 0..5 {
            score = update_human_score(score, true, DEFAULT_HUMAN_STRENGTH);
        }
        assert_eq!(score, 1.0);
        for _ in 0..10 {
            score = update_human_score(score, false, DEFAULT_HUMAN_STRENGTH);
        }
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_human_strength_clamped() {
        assert_eq!(update_human_score(0.5, true, 0.9), 1.0);
        assert_eq!(update_human_score(0.5, true, 0.01), 0.6);
    }

    #[test]
    fn test_decay_noop_for_zero_weeks() {
        let c = CompositeConfidence::new(0.6, 0.7, 0.8);
        assert_eq!(apply_decay(&c, 0.0, DEFAULT_DECAY_RATE), c);
        assert_eq!(apply_decay(&c, -3.0, DEFAULT_DECAY_RATE), c);
    }

    #[test]
    fn test_decay_only_touches_frequency() {
        let c = CompositeConfidence::new(0.6, 0.7, 0.8);
        let decayed = apply_decay(&c, 10.0, DEFAULT_DECAY_RATE);
        assert!(decayed.frequency() < c.frequency());
        assert_eq!(decayed.effectiveness(), c.effectiveness());
        assert_eq!(decayed.human(), c.human());
        assert!(decayed.composite() <= c.composite());
    }

    #[test]
    fn test_decay_small_interval_still_reduces() {
        let c = CompositeConfidence::new(0.5, 0.5, 0.5);
        let decayed = apply_decay(&c, 0.1, DEFAULT_DECAY_RATE);
        assert!(decayed.frequency() < c.frequency());
    }

    #[test]
    fn test_format_confidence() {
        let c = CompositeConfidence::new(1.0, 1.0, 1.0);
        assert_eq!(
            format_confidence(&c),
            "██████████ 100% [core] (F:100 E:100 H:100)"
        );

        let neutral = CompositeConfidence::seeded(0.5);
        let summary = summarize(&neutral);
        assert_eq!(summary.percent, 50);
        assert_eq!(summary.tier, ConfidenceTier::Moderate);
        assert_eq!(summary.bar.chars().count(), BAR_WIDTH);
    }
}
