//! AgentMind: learns scored instincts from observed agent behavior.

pub mod analysis;
pub mod candidates;
pub mod confidence;
pub mod context;
pub mod detector;
pub mod evolution;
pub mod journal;
pub mod storage;
pub mod transfer;
pub mod types;

pub use analysis::{
    analyze, decay_sweep, record_application, record_feedback, AnalysisOptions, AnalysisReport,
};
pub use candidates::{generate_candidates, InstinctCandidate};
pub use confidence::{
    apply_decay, calculate_composite, effectiveness_score, format_confidence, frequency_score,
    update_human_score, ConfidenceTier,
};
pub use context::{select_context, ContextSelection};
pub use detector::{detect_corrections, detect_error_patterns, detect_sequences, SequenceOptions};
pub use evolution::{evolution_candidates, ungrouped_instincts, EvolutionCandidate};
pub use storage::{InstinctFilter, LocalStorage, StoreStats, STORE_VERSION};
pub use transfer::{ExportBundle, ImportReport};
pub use types::*;
