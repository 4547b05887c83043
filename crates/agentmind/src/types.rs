//! Core data types for observations, instincts, and the evolution hierarchy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::confidence::{calculate_composite, ConfidenceTier};

/// Event name carried by evaluation observations that record a failed tool call.
pub const TOOL_FAILURE_EVENT: &str = "tool_failure";

/// Which layer of agent behavior an observation was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationLayer {
    Intent,
    Decision,
    Execution,
    Evaluation,
}

/// Phase of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Pre,
    Post,
}

impl ToolPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolPhase::Pre => "pre",
            ToolPhase::Post => "post",
        }
    }
}

/// A single timestamped behavioral observation.
///
/// `data` is layer-specific and kept as an open JSON object so that fields
/// written by newer hook versions survive a read/write cycle. Use the typed
/// accessors to read the fields the detectors care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub layer: ObservationLayer,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Observation {
    /// A user prompt, optionally flagged as a correction of prior behavior.
    pub fn intent(session_id: &str, correction_type: Option<&str>) -> Self {
        let mut data = Map::new();
        data.insert(
            "has_correction".to_string(),
            Value::Bool(correction_type.is_some()),
        );
        data.insert(
            "correction_type".to_string(),
            Value::String(correction_type.unwrap_or("none").to_string()),
        );
        Self {
            layer: ObservationLayer::Intent,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            event: "user_prompt".to_string(),
            data,
        }
    }

    /// A tool invocation seen before or after execution.
    pub fn execution(session_id: &str, tool_name: &str, phase: ToolPhase) -> Self {
        let mut data = Map::new();
        data.insert("tool_name".to_string(), Value::String(tool_name.to_string()));
        data.insert(
            "phase".to_string(),
            Value::String(phase.as_str().to_string()),
        );
        Self {
            layer: ObservationLayer::Execution,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            event: format!("tool_{}", phase.as_str()),
            data,
        }
    }

    /// A failed tool call.
    pub fn tool_failure(session_id: &str, tool_name: &str, error_type: &str) -> Self {
        let mut data = Map::new();
        data.insert("tool_name".to_string(), Value::String(tool_name.to_string()));
        data.insert(
            "error_type".to_string(),
            Value::String(error_type.to_string()),
        );
        Self {
            layer: ObservationLayer::Evaluation,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            event: TOOL_FAILURE_EVENT.to_string(),
            data,
        }
    }

    /// Override the capture time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.str_field("tool_name")
    }

    pub fn phase(&self) -> Option<ToolPhase> {
        match self.str_field("phase")? {
            "pre" => Some(ToolPhase::Pre),
            "post" => Some(ToolPhase::Post),
            _ => None,
        }
    }

    pub fn has_correction(&self) -> bool {
        self.data
            .get("has_correction")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn correction_type(&self) -> Option<&str> {
        self.str_field("correction_type")
    }

    pub fn error_type(&self) -> Option<&str> {
        self.str_field("error_type")
    }

    pub fn is_tool_failure(&self) -> bool {
        self.layer == ObservationLayer::Evaluation && self.event == TOOL_FAILURE_EVENT
    }
}

/// Three-dimensional confidence with a derived composite.
///
/// The composite is never stored independently of its inputs: every
/// constructor and setter recomputes it, and deserialization discards the
/// persisted value in favor of a fresh calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfidenceRecord")]
pub struct CompositeConfidence {
    frequency: f64,
    effectiveness: f64,
    human: f64,
    composite: f64,
}

#[derive(Deserialize)]
struct ConfidenceRecord {
    #[serde(default)]
    frequency: f64,
    #[serde(default)]
    effectiveness: f64,
    #[serde(default)]
    human: f64,
}

impl From<ConfidenceRecord> for CompositeConfidence {
    fn from(r: ConfidenceRecord) -> Self {
        Self::new(r.frequency, r.effectiveness, r.human)
    }
}

impl CompositeConfidence {
    pub fn new(frequency: f64, effectiveness: f64, human: f64) -> Self {
        let mut c = Self {
            frequency,
            effectiveness,
            human,
            composite: 0.0,
        };
        c.recompute();
        c
    }

    /// Neutral effectiveness and human scores, with the given frequency.
    pub fn seeded(frequency: f64) -> Self {
        Self::new(frequency, 0.5, 0.5)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn effectiveness(&self) -> f64 {
        self.effectiveness
    }

    pub fn human(&self) -> f64 {
        self.human
    }

    pub fn composite(&self) -> f64 {
        self.composite
    }

    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.composite)
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.recompute();
    }

    pub fn set_effectiveness(&mut self, effectiveness: f64) {
        self.effectiveness = effectiveness;
        self.recompute();
    }

    pub fn set_human(&mut self, human: f64) {
        self.human = human;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.composite = calculate_composite(self.frequency, self.effectiveness, self.human);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstinctStatus {
    Active,
    Tentative,
    Deprecated,
}

impl InstinctStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstinctStatus::Active => "active",
            InstinctStatus::Tentative => "tentative",
            InstinctStatus::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for InstinctStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstinctStatus {
    type Err = MindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(InstinctStatus::Active),
            "tentative" => Ok(InstinctStatus::Tentative),
            "deprecated" => Ok(InstinctStatus::Deprecated),
            other => Err(MindError::InvalidInput(format!(
                "unknown instinct status: {other}"
            ))),
        }
    }
}

/// Where an instinct came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstinctSource {
    SequenceDetection,
    CorrectionDetection,
    ErrorResolution,
    PreferenceDetection,
    HumanCreated,
    Evolved,
    Imported,
}

impl InstinctSource {
    pub fn as_str(self) -> &'static str {
        match self {
            InstinctSource::SequenceDetection => "sequence_detection",
            InstinctSource::CorrectionDetection => "correction_detection",
            InstinctSource::ErrorResolution => "error_resolution",
            InstinctSource::PreferenceDetection => "preference_detection",
            InstinctSource::HumanCreated => "human_created",
            InstinctSource::Evolved => "evolved",
            InstinctSource::Imported => "imported",
        }
    }
}

/// A scored, triggerable behavioral rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instinct {
    pub id: String,
    pub trigger: String,
    pub action: String,
    pub domain: String,
    pub status: InstinctStatus,
    pub confidence: CompositeConfidence,
    pub evidence_count: u64,
    pub source: InstinctSource,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decayed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub application_count: u64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolution_parent: Option<String>,
}

/// How the instincts of a pattern relate to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Sequential,
    Parallel,
    Conditional,
}

pub const PATTERN_LEVEL: u8 = 1;
pub const STRATEGY_LEVEL: u8 = 2;
pub const EXPERT_LEVEL: u8 = 3;

fn pattern_level() -> u8 {
    PATTERN_LEVEL
}

fn strategy_level() -> u8 {
    STRATEGY_LEVEL
}

fn expert_level() -> u8 {
    EXPERT_LEVEL
}

/// Level 1: a cohesive group of instincts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    #[serde(default = "pattern_level")]
    pub level: u8,
    pub instinct_ids: Vec<String>,
    pub cohesion: f64,
    pub domain: String,
    pub confidence: CompositeConfidence,
    pub created_at: DateTime<Utc>,
}

/// Level 2: an abstract principle distilled from one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub principle: String,
    #[serde(default = "strategy_level")]
    pub level: u8,
    pub source_pattern_id: String,
    #[serde(default)]
    pub transferable_contexts: Vec<String>,
    pub domain: String,
    pub confidence: CompositeConfidence,
    pub created_at: DateTime<Utc>,
}

/// Level 3: domain-wide aggregation of strategies, patterns, and instincts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertSystem {
    pub id: String,
    pub name: String,
    #[serde(default = "expert_level")]
    pub level: u8,
    pub domain: String,
    #[serde(default)]
    pub strategy_ids: Vec<String>,
    #[serde(default)]
    pub pattern_ids: Vec<String>,
    #[serde(default)]
    pub instinct_ids: Vec<String>,
    pub total_confidence: f64,
    #[serde(default)]
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Anything stored in an id-keyed collection of the aggregate.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Instinct {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Pattern {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Strategy {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for ExpertSystem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Bookkeeping for the persisted aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: String,
    pub last_analysis: DateTime<Utc>,
    #[serde(default)]
    pub total_sessions_analyzed: u64,
    #[serde(default)]
    pub total_observations: u64,
    pub created_at: DateTime<Utc>,
}

/// The persisted unit: everything the engine has learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstinctsStore {
    #[serde(default)]
    pub instincts: Vec<Instinct>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
    #[serde(default)]
    pub experts: Vec<ExpertSystem>,
    pub metadata: StoreMetadata,
}

impl InstinctsStore {
    /// Create a new empty aggregate stamped with the current time.
    pub fn new(version: &str) -> Self {
        let now = Utc::now();
        Self {
            instincts: Vec::new(),
            patterns: Vec::new(),
            strategies: Vec::new(),
            experts: Vec::new(),
            metadata: StoreMetadata {
                version: version.to_string(),
                last_analysis: now,
                total_sessions_analyzed: 0,
                total_observations: 0,
                created_at: now,
            },
        }
    }

    pub fn instinct(&self, id: &str) -> Option<&Instinct> {
        self.instincts.iter().find(|i| i.id == id)
    }

    pub fn instinct_mut(&mut self, id: &str) -> Option<&mut Instinct> {
        self.instincts.iter_mut().find(|i| i.id == id)
    }

    /// Drop later duplicates of any id, keeping the first. Returns how many
    /// entries were removed across all collections.
    pub fn dedupe(&mut self) -> usize {
        dedupe_by_id(&mut self.instincts)
            + dedupe_by_id(&mut self.patterns)
            + dedupe_by_id(&mut self.strategies)
            + dedupe_by_id(&mut self.experts)
    }
}

/// Replace the item with the same id in place, or append it. Returns `true`
/// when an existing item was replaced.
pub fn upsert_by_id<T: Identified>(items: &mut Vec<T>, item: T) -> bool {
    match items.iter().position(|existing| existing.id() == item.id()) {
        Some(index) => {
            items[index] = item;
            true
        }
        None => {
            items.push(item);
            false
        }
    }
}

/// Remove the item with the given id. Returns `true` if something was removed.
pub fn remove_by_id<T: Identified>(items: &mut Vec<T>, id: &str) -> bool {
    let before = items.len();
    items.retain(|item| item.id() != id);
    items.len() < before
}

fn dedupe_by_id<T: Identified>(items: &mut Vec<T>) -> usize {
    let before = items.len();
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id().to_string()));
    before - items.len()
}

/// One analysis run, appended to the session log and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub observation_count: u64,
    pub patterns_detected: u64,
    pub corrections: u64,
    pub errors: u64,
    pub is_final: bool,
}

/// Errors that can occur in the learning engine.
#[derive(thiserror::Error, Debug)]
pub enum MindError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type MindResult<T> = Result<T, MindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_recomputed_on_deserialize() {
        let json = r#"{"frequency":1.0,"effectiveness":1.0,"human":1.0,"composite":0.1}"#;
        let c: CompositeConfidence = serde_json::from_str(json).unwrap();
        assert_eq!(c.composite(), 1.0);
    }

    #[test]
    fn test_setters_keep_composite_fresh() {
        let mut c = CompositeConfidence::seeded(0.5);
        assert_eq!(c.composite(), 0.5);
        c.set_human(1.0);
        assert!(c.composite() > 0.5);
        c.set_frequency(0.0);
        assert_eq!(
            c.composite(),
            calculate_composite(0.0, c.effectiveness(), c.human())
        );
    }

    #[test]
    fn test_observation_accessors() {
        let obs = Observation::execution("s1", "Grep", ToolPhase::Pre);
        assert_eq!(obs.tool_name(), Some("Grep"));
        assert_eq!(obs.phase(), Some(ToolPhase::Pre));
        assert!(!obs.has_correction());

        let intent = Observation::intent("s1", Some("redirection"));
        assert!(intent.has_correction());
        assert_eq!(intent.correction_type(), Some("redirection"));

        let plain = Observation::intent("s1", None);
        assert!(!plain.has_correction());
        assert_eq!(plain.correction_type(), Some("none"));

        let failure = Observation::tool_failure("s1", "Bash", "timeout");
        assert!(failure.is_tool_failure());
        assert_eq!(failure.error_type(), Some("timeout"));
    }

    #[test]
    fn test_observation_preserves_unknown_data() {
        let line = r#"{"layer":"execution","session_id":"s","timestamp":"2025-01-02T03:04:05Z","event":"tool_pre","data":{"tool_name":"Read","phase":"pre","tool_use_id":"tu_1","success":null}}"#;
        let obs: Observation = serde_json::from_str(line).unwrap();
        assert_eq!(obs.tool_name(), Some("Read"));
        assert!(obs.data.contains_key("tool_use_id"));
    }

    #[test]
    fn test_upsert_and_remove_by_id() {
        let now = Utc::now();
        let make = |id: &str, name: &str| ExpertSystem {
            id: id.to_string(),
            name: name.to_string(),
            level: EXPERT_LEVEL,
            domain: "workflow".to_string(),
            strategy_ids: vec![],
            pattern_ids: vec![],
            instinct_ids: vec![],
            total_confidence: 0.7,
            system_prompt: String::new(),
            created_at: now,
        };

        let mut items = Vec::new();
        assert!(!upsert_by_id(&mut items, make("a", "first")));
        assert!(upsert_by_id(&mut items, make("a", "second")));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "second");

        assert!(remove_by_id(&mut items, "a"));
        assert!(!remove_by_id(&mut items, "a"));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "Active".parse::<InstinctStatus>().unwrap(),
            InstinctStatus::Active
        );
        assert!("bogus".parse::<InstinctStatus>().is_err());
    }
}
