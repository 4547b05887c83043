//! Finding instincts that are ready to be grouped into higher-level patterns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Instinct, InstinctStatus, InstinctsStore};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MIN_CLUSTER: usize = 3;

/// A domain with enough confident instincts to form a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionCandidate {
    pub domain: String,
    pub instinct_ids: Vec<String>,
    pub avg_confidence: f64,
}

/// Group active instincts at or above `min_confidence` by domain, keeping
/// domains with at least `min_cluster` members. Domains come out in the
/// order they are first seen.
pub fn evolution_candidates(
    instincts: &[Instinct],
    min_confidence: f64,
    min_cluster: usize,
) -> Vec<EvolutionCandidate> {
    let mut groups: Vec<(&str, Vec<&Instinct>)> = Vec::new();

    for instinct in instincts.iter().filter(|i| {
        i.status == InstinctStatus::Active && i.confidence.composite() >= min_confidence
    }) {
        match groups.iter_mut().find(|(d, _)| *d == instinct.domain) {
            Some((_, members)) => members.push(instinct),
            None => groups.push((instinct.domain.as_str(), vec![instinct])),
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= min_cluster)
        .map(|(domain, members)| {
            let total: f64 = members.iter().map(|i| i.confidence.composite()).sum();
            let avg = total / members.len() as f64;
            EvolutionCandidate {
                domain: domain.to_string(),
                instinct_ids: members.iter().map(|i| i.id.clone()).collect(),
                avg_confidence: (avg * 100.0).round() / 100.0,
            }
        })
        .collect()
}

/// Active instincts that no pattern references yet.
pub fn ungrouped_instincts(store: &InstinctsStore) -> Vec<&Instinct> {
    let grouped: HashSet<&str> = store
        .patterns
        .iter()
        .flat_map(|p| p.instinct_ids.iter().map(String::as_str))
        .collect();

    store
        .instincts
        .iter()
        .filter(|i| i.status == InstinctStatus::Active && !grouped.contains(i.id.as_str()))
        .collect()
}
