//! Analysis runs and the lifecycle operations that mutate scored instincts.
//!
//! Each operation is one load → mutate → save cycle against [`LocalStorage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidates::{generate_candidates, InstinctCandidate};
use crate::confidence::{
    apply_decay, effectiveness_score, update_human_score, ConfidenceTier, DEFAULT_DECAY_RATE,
    DEFAULT_HUMAN_STRENGTH, DEFAULT_Z,
};
use crate::detector::{
    detect_corrections, detect_error_patterns, detect_sequences, CorrectionPattern, ErrorPattern,
    SequenceOptions, SequencePattern,
};
use crate::storage::LocalStorage;
use crate::types::{Instinct, InstinctStatus, MindResult, Observation, SessionSummary};

const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// Tunables for analysis and the lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub sequence: SequenceOptions,
    pub decay_rate: f64,
    pub feedback_strength: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sequence: SequenceOptions::default(),
            decay_rate: DEFAULT_DECAY_RATE,
            feedback_strength: DEFAULT_HUMAN_STRENGTH,
        }
    }
}

/// Outcome of one [`analyze`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub session_id: String,
    pub observation_count: usize,
    pub sequences: Vec<SequencePattern>,
    pub corrections: Vec<CorrectionPattern>,
    pub errors: Vec<ErrorPattern>,
    /// Ids of instincts added by this run.
    pub created: Vec<String>,
    /// Ids of existing instincts that were re-detected.
    pub reinforced: Vec<String>,
    pub summary: SessionSummary,
}

/// Run the detectors over a batch and merge the resulting candidates into
/// the store.
///
/// New candidates land as tentative instincts. A candidate whose id already
/// exists reinforces that instinct instead: evidence accumulates, frequency
/// keeps the higher of the two values, and the review state is left alone.
pub fn analyze(
    storage: &LocalStorage,
    session_id: &str,
    observations: &[Observation],
    options: &AnalysisOptions,
    is_final: bool,
) -> MindResult<AnalysisReport> {
    let sequences = detect_sequences(observations, &options.sequence);
    let corrections = detect_corrections(observations);
    let errors = detect_error_patterns(observations);
    let candidates = generate_candidates(&sequences, &corrections, &errors);
    let now = Utc::now();
    let batch_size = observations.len() as u64;

    let (created, reinforced) = storage.update(|store| {
        let mut created = Vec::new();
        let mut reinforced = Vec::new();

        for candidate in candidates {
            let id = candidate.stable_id();
            match store.instinct_mut(&id) {
                Some(existing) => {
                    reinforce(existing, candidate, now);
                    reinforced.push(id);
                }
                None => {
                    store.instincts.push(candidate.into_instinct(id.clone(), now));
                    created.push(id);
                }
            }
        }

        store.metadata.last_analysis = now;
        store.metadata.total_sessions_analyzed += 1;
        store.metadata.total_observations += batch_size;
        ((created, reinforced), true)
    })?;

    let summary = SessionSummary {
        session_id: session_id.to_string(),
        timestamp: now,
        observation_count: batch_size,
        patterns_detected: (sequences.len() + corrections.len() + errors.len()) as u64,
        corrections: corrections.iter().map(|c| c.count).sum(),
        errors: observations.iter().filter(|o| o.is_tool_failure()).count() as u64,
        is_final,
    };
    storage.append_session(&summary)?;

    tracing::info!(
        "Analyzed session {session_id}: {} observations, {} new, {} reinforced",
        batch_size,
        created.len(),
        reinforced.len()
    );

    Ok(AnalysisReport {
        session_id: session_id.to_string(),
        observation_count: observations.len(),
        sequences,
        corrections,
        errors,
        created,
        reinforced,
        summary,
    })
}

fn reinforce(existing: &mut Instinct, candidate: InstinctCandidate, now: DateTime<Utc>) {
    existing.evidence_count += candidate.evidence_count;
    let frequency = existing
        .confidence
        .frequency()
        .max(candidate.confidence.frequency());
    existing.confidence.set_frequency(frequency);
    existing.action = candidate.action;
    existing.last_seen = now;
}

/// Apply one human review. Returns the updated instinct, or `None` if the id
/// is unknown.
pub fn record_feedback(
    storage: &LocalStorage,
    id: &str,
    approved: bool,
    strength: f64,
) -> MindResult<Option<Instinct>> {
    storage.update(|store| match store.instinct_mut(id) {
        Some(instinct) => {
            let human = update_human_score(instinct.confidence.human(), approved, strength);
            instinct.confidence.set_human(human);
            instinct.last_verified = Some(Utc::now());
            tracing::debug!("Feedback on {id}: approved={approved}, human={human}");
            (Some(instinct.clone()), true)
        }
        None => (None, false),
    })
}

/// Record that an instinct was applied, and whether it helped.
pub fn record_application(
    storage: &LocalStorage,
    id: &str,
    success: bool,
) -> MindResult<Option<Instinct>> {
    storage.update(|store| match store.instinct_mut(id) {
        Some(instinct) => {
            let prior = instinct.application_count;
            let prior_successes = (instinct.success_rate * prior as f64).round() as u64;
            let total = prior + 1;
            let successes = prior_successes.min(prior) + u64::from(success);

            instinct.application_count = total;
            instinct.success_rate = successes as f64 / total as f64;
            instinct
                .confidence
                .set_effectiveness(effectiveness_score(successes, total, DEFAULT_Z));
            instinct.last_applied = Some(Utc::now());
            (Some(instinct.clone()), true)
        }
        None => (None, false),
    })
}

/// Decay every instinct by the weeks elapsed since it was last seen or last
/// decayed, whichever is later. Instincts that fall into the deprecated tier
/// are marked deprecated. Returns the ids that changed.
pub fn decay_sweep(
    storage: &LocalStorage,
    now: DateTime<Utc>,
    rate: f64,
) -> MindResult<Vec<String>> {
    let touched = storage.update(|store| {
        let mut touched = Vec::new();

        for instinct in store.instincts.iter_mut() {
            let anchor = match instinct.last_decayed {
                Some(decayed) => decayed.max(instinct.last_seen),
                None => instinct.last_seen,
            };
            let weeks = (now - anchor).num_seconds() as f64 / SECONDS_PER_WEEK;
            if weeks <= 0.0 {
                continue;
            }

            instinct.confidence = apply_decay(&instinct.confidence, weeks, rate);
            instinct.last_decayed = Some(now);
            if instinct.confidence.tier() == ConfidenceTier::Deprecated
                && instinct.status != InstinctStatus::Deprecated
            {
                tracing::info!("Instinct {} decayed below the deprecation floor", instinct.id);
                instinct.status = InstinctStatus::Deprecated;
            }
            touched.push(instinct.id.clone());
        }

        let changed = !touched.is_empty();
        (touched, changed)
    })?;

    tracing::debug!("Decay sweep touched {} instinct(s)", touched.len());
    Ok(touched)
}
