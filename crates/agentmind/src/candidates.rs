//! Turn detected patterns into tentative instincts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detector::{CorrectionPattern, ErrorPattern, SequencePattern};
use crate::types::{CompositeConfidence, Instinct, InstinctSource, InstinctStatus};

pub const WORKFLOW_DOMAIN: &str = "workflow";
pub const PREFERENCE_DOMAIN: &str = "preference";
pub const ERROR_HANDLING_DOMAIN: &str = "error-handling";

/// A proto-instinct: everything except identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstinctCandidate {
    /// What was detected, independent of counts: the tool sequence, the
    /// correction type, or the `tool:error` pair.
    pub signature: String,
    pub trigger: String,
    pub action: String,
    pub domain: String,
    pub status: InstinctStatus,
    pub confidence: CompositeConfidence,
    pub evidence_count: u64,
    pub source: InstinctSource,
    pub application_count: u64,
    pub success_rate: f64,
}

impl InstinctCandidate {
    fn new(
        signature: String,
        trigger: String,
        action: String,
        domain: &str,
        frequency: f64,
        evidence_count: u64,
        source: InstinctSource,
    ) -> Self {
        Self {
            signature,
            trigger,
            action,
            domain: domain.to_string(),
            status: InstinctStatus::Tentative,
            confidence: CompositeConfidence::seeded(frequency),
            evidence_count,
            source,
            application_count: 0,
            success_rate: 0.0,
        }
    }

    /// Stable identity: the same source and signature always map to the same
    /// id, so re-detecting a pattern reinforces it instead of duplicating it.
    pub fn stable_id(&self) -> String {
        let key = format!("{}\u{1f}{}", self.source.as_str(), self.signature);
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
        format!("inst_{}", &uuid.simple().to_string()[..12])
    }

    pub fn into_instinct(self, id: String, now: DateTime<Utc>) -> Instinct {
        Instinct {
            id,
            trigger: self.trigger,
            action: self.action,
            domain: self.domain,
            status: self.status,
            confidence: self.confidence,
            evidence_count: self.evidence_count,
            source: self.source,
            created_at: now,
            last_seen: now,
            last_applied: None,
            last_verified: None,
            last_decayed: None,
            application_count: self.application_count,
            success_rate: self.success_rate,
            tags: None,
            evolution_parent: None,
        }
    }
}

/// Generate instinct candidates from detector output, in input order:
/// sequences, then corrections, then error patterns.
pub fn generate_candidates(
    sequences: &[SequencePattern],
    corrections: &[CorrectionPattern],
    errors: &[ErrorPattern],
) -> Vec<InstinctCandidate> {
    let mut candidates = Vec::with_capacity(sequences.len() + corrections.len() + errors.len());

    for seq in sequences {
        let Some(first) = seq.sequence.first() else {
            continue;
        };
        candidates.push(InstinctCandidate::new(
            seq.sequence.join(","),
            format!("When performing a {} operation", first.to_lowercase()),
            format!("Follow the workflow: {}", seq.sequence.join(" → ")),
            WORKFLOW_DOMAIN,
            (seq.count as f64 / 10.0).min(0.6),
            seq.count,
            InstinctSource::SequenceDetection,
        ));
    }

    for corr in corrections {
        candidates.push(InstinctCandidate::new(
            corr.correction_type.clone(),
            format!(
                "When user provides {} feedback",
                corr.correction_type.replace('_', " ")
            ),
            format!(
                "Adjust approach: user has corrected this {} time(s) across {} session(s)",
                corr.count,
                corr.sessions.len()
            ),
            PREFERENCE_DOMAIN,
            (corr.count as f64 / 6.0).min(0.5),
            corr.count,
            InstinctSource::CorrectionDetection,
        ));
    }

    for err in errors {
        candidates.push(InstinctCandidate::new(
            format!("{}:{}", err.tool_name, err.error_type),
            format!("When using {}", err.tool_name),
            format!(
                "Be cautious of {} errors (occurred {} times)",
                err.error_type, err.count
            ),
            ERROR_HANDLING_DOMAIN,
            (err.count as f64 / 8.0).min(0.4),
            err.count,
            InstinctSource::ErrorResolution,
        ));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::calculate_composite;

    fn sequence(tools: &[&str], count: u64) -> SequencePattern {
        SequencePattern {
            sequence: tools.iter().map(|t| t.to_string()).collect(),
            count,
            contexts: vec!["s1".to_string()],
        }
    }

    #[test]
    fn test_sequence_candidate() {
        let candidates = generate_candidates(&[sequence(&["Grep", "Read", "Edit"], 5)], &[], &[]);
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.trigger, "When performing a grep operation");
        assert_eq!(c.action, "Follow the workflow: Grep → Read → Edit");
        assert_eq!(c.domain, WORKFLOW_DOMAIN);
        assert_eq!(c.source, InstinctSource::SequenceDetection);
        assert_eq!(c.status, InstinctStatus::Tentative);
        assert_eq!(c.confidence.frequency(), 0.5);
        assert_eq!(c.confidence.effectiveness(), 0.5);
        assert_eq!(c.confidence.human(), 0.5);
        assert_eq!(c.evidence_count, 5);
        assert_eq!(c.application_count, 0);
        assert_eq!(c.success_rate, 0.0);
    }

    #[test]
    fn test_frequency_caps() {
        let corrections = vec![CorrectionPattern {
            correction_type: "explicit_rejection".to_string(),
            count: 60,
            sessions: vec!["a".to_string(), "b".to_string()],
        }];
        let errors = vec![ErrorPattern {
            tool_name: "Bash".to_string(),
            error_type: "timeout".to_string(),
            count: 80,
            sessions: vec!["a".to_string()],
        }];
        let candidates =
            generate_candidates(&[sequence(&["Read", "Edit"], 100)], &corrections, &errors);

        assert_eq!(candidates[0].confidence.frequency(), 0.6);
        assert_eq!(candidates[1].confidence.frequency(), 0.5);
        assert_eq!(candidates[2].confidence.frequency(), 0.4);
    }

    #[test]
    fn test_correction_and_error_text() {
        let corrections = vec![CorrectionPattern {
            correction_type: "retry_request".to_string(),
            count: 3,
            sessions: vec!["a".to_string(), "b".to_string()],
        }];
        let errors = vec![ErrorPattern {
            tool_name: "Bash".to_string(),
            error_type: "timeout".to_string(),
            count: 2,
            sessions: vec!["a".to_string()],
        }];
        let candidates = generate_candidates(&[], &corrections, &errors);

        assert_eq!(candidates[0].trigger, "When user provides retry request feedback");
        assert!(candidates[0].action.contains("3 time(s) across 2 session(s)"));
        assert_eq!(candidates[0].domain, PREFERENCE_DOMAIN);
        assert_eq!(candidates[1].trigger, "When using Bash");
        assert_eq!(
            candidates[1].action,
            "Be cautious of timeout errors (occurred 2 times)"
        );
        assert_eq!(candidates[1].domain, ERROR_HANDLING_DOMAIN);
        assert_eq!(candidates[1].source, InstinctSource::ErrorResolution);
    }

    #[test]
    fn test_candidate_composite_matches_engine() {
        let candidates = generate_candidates(&[sequence(&["Read"], 1)], &[], &[]);
        let c = candidates[0].confidence;
        // frequency 0.1 is below the degradation threshold
        assert_eq!(c.composite(), calculate_composite(0.1, 0.5, 0.5));
        assert!(c.composite() < calculate_composite(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_stable_id() {
        let a = generate_candidates(&[sequence(&["Grep", "Read"], 3)], &[], &[]);
        let b = generate_candidates(&[sequence(&["Grep", "Read"], 9)], &[], &[]);
        // Counts change, identity does not.
        assert_eq!(a[0].stable_id(), b[0].stable_id());
        assert!(a[0].stable_id().starts_with("inst_"));

        let other = generate_candidates(&[sequence(&["Grep", "Edit"], 3)], &[], &[]);
        assert_ne!(a[0].stable_id(), other[0].stable_id());
    }

    #[test]
    fn test_into_instinct() {
        let now = Utc::now();
        let candidate = generate_candidates(&[sequence(&["Grep"], 4)], &[], &[]).remove(0);
        let instinct = candidate.into_instinct("inst_x".to_string(), now);
        assert_eq!(instinct.id, "inst_x");
        assert_eq!(instinct.created_at, now);
        assert_eq!(instinct.last_seen, now);
        assert!(instinct.tags.is_none());
    }
}
