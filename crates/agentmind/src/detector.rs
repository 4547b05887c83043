//! Pattern detection over observation batches.
//!
//! Three independent, stateless detectors: repeated tool sequences (n-grams),
//! user corrections, and recurring tool failures. Grouping preserves
//! first-seen order so that equal counts always come out in the same order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Observation, ObservationLayer, ToolPhase};

/// Minimum occurrences before a tool failure is treated as a pattern.
pub const MIN_ERROR_COUNT: u64 = 2;

/// Used when a correction or failure observation omits its type.
const UNKNOWN_TYPE: &str = "unknown";

/// A repeated fixed-length run of tool invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePattern {
    pub sequence: Vec<String>,
    pub count: u64,
    /// Session ids the sequence was observed in.
    pub contexts: Vec<String>,
}

/// Repeated user corrections of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPattern {
    pub correction_type: String,
    pub count: u64,
    pub sessions: Vec<String>,
}

/// Recurring failures of one tool with one error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub tool_name: String,
    pub error_type: String,
    pub count: u64,
    pub sessions: Vec<String>,
}

/// Tuning for [`detect_sequences`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOptions {
    pub min_count: u64,
    pub ngram_size: usize,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            min_count: 3,
            ngram_size: 3,
        }
    }
}

/// Insertion-ordered grouping: a key index over a vector of entries.
struct OrderedGroups<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K: std::hash::Hash + Eq + Clone, V> OrderedGroups<K, V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, init()));
                slot
            }
        };
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

struct Tally {
    count: u64,
    sessions: Vec<String>,
}

impl Tally {
    fn new() -> Self {
        Self {
            count: 0,
            sessions: Vec::new(),
        }
    }

    fn add_session(&mut self, session: &str) {
        if !self.sessions.iter().any(|s| s == session) {
            self.sessions.push(session.to_string());
        }
    }
}

/// Detect repeated tool-use sequences (n-grams) of pre-execution events.
///
/// Returns sequences seen at least `min_count` times, most frequent first.
pub fn detect_sequences(
    observations: &[Observation],
    options: &SequenceOptions,
) -> Vec<SequencePattern> {
    let mut events: Vec<(&Observation, &str)> = observations
        .iter()
        .filter(|o| o.layer == ObservationLayer::Execution && o.phase() == Some(ToolPhase::Pre))
        .filter_map(|o| o.tool_name().map(|tool| (o, tool)))
        .collect();

    let size = options.ngram_size;
    if size == 0 || events.len() < size {
        return Vec::new();
    }

    // Stable: same-instant events keep their batch order.
    events.sort_by_key(|(o, _)| o.timestamp);

    let mut groups: OrderedGroups<Vec<&str>, Tally> = OrderedGroups::new();
    for window in events.windows(size) {
        let key: Vec<&str> = window.iter().map(|(_, tool)| *tool).collect();
        let tally = groups.entry(key, Tally::new);
        tally.count += 1;
        for (obs, _) in window {
            tally.add_session(&obs.session_id);
        }
    }

    let mut patterns: Vec<SequencePattern> = groups
        .into_entries()
        .into_iter()
        .filter(|(_, tally)| tally.count >= options.min_count)
        .map(|(key, tally)| SequencePattern {
            sequence: key.into_iter().map(String::from).collect(),
            count: tally.count,
            contexts: tally.sessions,
        })
        .collect();

    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}

/// Detect user correction signals from intent observations.
pub fn detect_corrections(observations: &[Observation]) -> Vec<CorrectionPattern> {
    let mut groups: OrderedGroups<&str, Tally> = OrderedGroups::new();

    for obs in observations
        .iter()
        .filter(|o| o.layer == ObservationLayer::Intent && o.has_correction())
    {
        let kind = obs.correction_type().unwrap_or(UNKNOWN_TYPE);
        let tally = groups.entry(kind, Tally::new);
        tally.count += 1;
        tally.add_session(&obs.session_id);
    }

    let mut patterns: Vec<CorrectionPattern> = groups
        .into_entries()
        .into_iter()
        .map(|(kind, tally)| CorrectionPattern {
            correction_type: kind.to_string(),
            count: tally.count,
            sessions: tally.sessions,
        })
        .collect();

    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}

/// Detect recurring `(tool, error type)` failures.
///
/// Single failures are noise; only pairs seen at least [`MIN_ERROR_COUNT`]
/// times are reported.
pub fn detect_error_patterns(observations: &[Observation]) -> Vec<ErrorPattern> {
    let mut groups: OrderedGroups<(&str, &str), Tally> = OrderedGroups::new();

    for obs in observations.iter().filter(|o| o.is_tool_failure()) {
        let Some(tool) = obs.tool_name() else {
            continue;
        };
        let error = obs.error_type().unwrap_or(UNKNOWN_TYPE);
        let tally = groups.entry((tool, error), Tally::new);
        tally.count += 1;
        tally.add_session(&obs.session_id);
    }

    let mut patterns: Vec<ErrorPattern> = groups
        .into_entries()
        .into_iter()
        .filter(|(_, tally)| tally.count >= MIN_ERROR_COUNT)
        .map(|((tool, error), tally)| ErrorPattern {
            tool_name: tool.to_string(),
            error_type: error.to_string(),
            count: tally.count,
            sessions: tally.sessions,
        })
        .collect();

    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}
