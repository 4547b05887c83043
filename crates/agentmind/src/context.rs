//! Selecting which instincts are worth surfacing at session start.

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceTier;
use crate::storage::{InstinctFilter, LocalStorage};
use crate::types::{Instinct, InstinctStatus};

/// Instincts below this composite are never surfaced.
pub const CONTEXT_MIN_CONFIDENCE: f64 = 0.4;

pub const CORE_LIMIT: usize = 10;
pub const STRONG_LIMIT: usize = 8;
pub const MODERATE_LIMIT: usize = 5;

/// Active instincts bucketed by tier, each bucket highest-confidence first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSelection {
    pub core: Vec<Instinct>,
    pub strong: Vec<Instinct>,
    pub moderate: Vec<Instinct>,
}

impl ContextSelection {
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.strong.is_empty() && self.moderate.is_empty()
    }

    pub fn len(&self) -> usize {
        self.core.len() + self.strong.len() + self.moderate.len()
    }
}

/// Bucket already-sorted instincts, applying the per-tier caps.
pub fn bucket_by_tier(instincts: Vec<Instinct>) -> ContextSelection {
    let mut selection = ContextSelection::default();
    for instinct in instincts {
        let (bucket, limit) = match instinct.confidence.tier() {
            ConfidenceTier::Core => (&mut selection.core, CORE_LIMIT),
            ConfidenceTier::Strong => (&mut selection.strong, STRONG_LIMIT),
            ConfidenceTier::Moderate => (&mut selection.moderate, MODERATE_LIMIT),
            ConfidenceTier::Tentative | ConfidenceTier::Deprecated => continue,
        };
        if bucket.len() < limit {
            bucket.push(instinct);
        }
    }
    selection
}

pub fn select_context(storage: &LocalStorage) -> ContextSelection {
    let instincts = storage.get_instincts(
        &InstinctFilter::default()
            .status(InstinctStatus::Active)
            .min_confidence(CONTEXT_MIN_CONFIDENCE),
    );
    bucket_by_tier(instincts)
}
