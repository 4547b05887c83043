//! File-backed storage: the instinct aggregate plus the append-only journals.
//!
//! Layout under the root passed to [`LocalStorage::open`]:
//!
//! ```text
//! data/instincts.json               aggregate, rewritten whole on every mutation
//! data/sessions.jsonl               session summaries, append-only
//! data/observations/YYYY-MM-DD.jsonl  observations, one file per UTC day
//! ```
//!
//! Every mutation is a full load → modify → save cycle. Saves go through a
//! temp file and a rename so readers never see a half-written aggregate, but
//! there is no locking: two processes writing at once can lose an update.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::journal::{append_record, read_records};
use crate::types::{
    remove_by_id, upsert_by_id, ExpertSystem, Instinct, InstinctStatus, InstinctsStore,
    MindResult, Observation, Pattern, SessionSummary, Strategy,
};

/// Format version stamped on every save.
pub const STORE_VERSION: &str = "0.1.0";

const DATA_DIR: &str = "data";
const INSTINCTS_FILE: &str = "instincts.json";
const SESSIONS_FILE: &str = "sessions.jsonl";
const OBSERVATIONS_DIR: &str = "observations";

/// Filters for [`LocalStorage::get_instincts`]. All are optional and combine
/// with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstinctFilter {
    pub status: Option<InstinctStatus>,
    pub domain: Option<String>,
    pub min_confidence: Option<f64>,
}

impl InstinctFilter {
    pub fn status(mut self, status: InstinctStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn matches(&self, instinct: &Instinct) -> bool {
        self.status.map_or(true, |s| instinct.status == s)
            && self.domain.as_deref().map_or(true, |d| instinct.domain == d)
            && self
                .min_confidence
                .map_or(true, |min| instinct.confidence.composite() >= min)
    }
}

/// Aggregate statistics, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_instincts: usize,
    pub active_instincts: usize,
    pub tentative_instincts: usize,
    pub deprecated_instincts: usize,
    /// Mean composite over active instincts only; 0 when none are active.
    pub avg_confidence: f64,
    pub domains: BTreeMap<String, usize>,
    pub total_sessions: u64,
    pub total_observations: u64,
}

/// Sort instincts by composite confidence, highest first. Stable, so equal
/// scores keep their storage order.
pub fn sort_by_confidence(instincts: &mut [Instinct]) {
    instincts.sort_by(|a, b| {
        b.confidence
            .composite()
            .total_cmp(&a.confidence.composite())
    });
}

/// Local JSON storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    data_dir: PathBuf,
    instincts_path: PathBuf,
    sessions_path: PathBuf,
    observations_dir: PathBuf,
}

impl LocalStorage {
    /// Open storage under `root`, creating the data directories if needed.
    pub fn open(root: impl AsRef<Path>) -> MindResult<Self> {
        let data_dir = root.as_ref().join(DATA_DIR);
        let observations_dir = data_dir.join(OBSERVATIONS_DIR);
        std::fs::create_dir_all(&observations_dir)?;

        Ok(Self {
            instincts_path: data_dir.join(INSTINCTS_FILE),
            sessions_path: data_dir.join(SESSIONS_FILE),
            observations_dir,
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn instincts_path(&self) -> &Path {
        &self.instincts_path
    }

    // --- Aggregate ---

    /// Load the aggregate. A missing or unparseable file yields a fresh
    /// empty aggregate rather than an error.
    pub fn load(&self) -> InstinctsStore {
        let raw = match std::fs::read_to_string(&self.instincts_path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        "Failed to read {}: {e}; starting empty",
                        self.instincts_path.display()
                    );
                }
                return InstinctsStore::new(STORE_VERSION);
            }
        };

        match serde_json::from_str::<InstinctsStore>(&raw) {
            Ok(mut store) => {
                let removed = store.dedupe();
                if removed > 0 {
                    tracing::warn!("Dropped {removed} duplicate id(s) while loading the store");
                }
                store
            }
            Err(e) => {
                tracing::warn!(
                    "Corrupt store at {}: {e}; starting empty",
                    self.instincts_path.display()
                );
                InstinctsStore::new(STORE_VERSION)
            }
        }
    }

    /// Stamp the current version and replace the persisted aggregate.
    pub fn save(&self, store: &mut InstinctsStore) -> MindResult<()> {
        store.metadata.version = STORE_VERSION.to_string();

        let payload = serde_json::to_vec_pretty(store)?;
        let tmp = self.instincts_path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.instincts_path)?;

        tracing::debug!(
            "Saved store: {} instincts, {} patterns, {} strategies, {} experts",
            store.instincts.len(),
            store.patterns.len(),
            store.strategies.len(),
            store.experts.len()
        );
        Ok(())
    }

    /// Load, apply `f`, and save only if `f` reports a change.
    pub fn update<R>(&self, f: impl FnOnce(&mut InstinctsStore) -> (R, bool)) -> MindResult<R> {
        let mut store = self.load();
        let (result, changed) = f(&mut store);
        if changed {
            self.save(&mut store)?;
        }
        Ok(result)
    }

    // --- Instincts ---

    /// Instincts matching `filter`, highest composite first.
    pub fn get_instincts(&self, filter: &InstinctFilter) -> Vec<Instinct> {
        let mut instincts: Vec<Instinct> = self
            .load()
            .instincts
            .into_iter()
            .filter(|i| filter.matches(i))
            .collect();
        sort_by_confidence(&mut instincts);
        instincts
    }

    pub fn get_instinct(&self, id: &str) -> Option<Instinct> {
        self.load().instincts.into_iter().find(|i| i.id == id)
    }

    /// Replace the instinct with the same id, or append it.
    pub fn upsert_instinct(&self, instinct: Instinct) -> MindResult<()> {
        self.update(|store| {
            let replaced = upsert_by_id(&mut store.instincts, instinct);
            tracing::debug!("Upserted instinct (replaced: {replaced})");
            ((), true)
        })
    }

    /// Remove an instinct. Returns whether it existed.
    pub fn delete_instinct(&self, id: &str) -> MindResult<bool> {
        self.update(|store| {
            let removed = remove_by_id(&mut store.instincts, id);
            (removed, removed)
        })
    }

    // --- Evolution hierarchy ---

    pub fn get_patterns(&self) -> Vec<Pattern> {
        self.load().patterns
    }

    pub fn upsert_pattern(&self, pattern: Pattern) -> MindResult<()> {
        self.update(|store| {
            upsert_by_id(&mut store.patterns, pattern);
            ((), true)
        })
    }

    pub fn delete_pattern(&self, id: &str) -> MindResult<bool> {
        self.update(|store| {
            let removed = remove_by_id(&mut store.patterns, id);
            (removed, removed)
        })
    }

    pub fn get_strategies(&self) -> Vec<Strategy> {
        self.load().strategies
    }

    pub fn upsert_strategy(&self, strategy: Strategy) -> MindResult<()> {
        self.update(|store| {
            upsert_by_id(&mut store.strategies, strategy);
            ((), true)
        })
    }

    pub fn delete_strategy(&self, id: &str) -> MindResult<bool> {
        self.update(|store| {
            let removed = remove_by_id(&mut store.strategies, id);
            (removed, removed)
        })
    }

    pub fn get_experts(&self) -> Vec<ExpertSystem> {
        self.load().experts
    }

    pub fn upsert_expert(&self, expert: ExpertSystem) -> MindResult<()> {
        self.update(|store| {
            upsert_by_id(&mut store.experts, expert);
            ((), true)
        })
    }

    pub fn delete_expert(&self, id: &str) -> MindResult<bool> {
        self.update(|store| {
            let removed = remove_by_id(&mut store.experts, id);
            (removed, removed)
        })
    }

    // --- Statistics ---

    pub fn get_stats(&self) -> StoreStats {
        let store = self.load();
        let instincts = &store.instincts;

        let mut domains = BTreeMap::new();
        for instinct in instincts {
            *domains.entry(instinct.domain.clone()).or_insert(0) += 1;
        }

        let count = |status: InstinctStatus| instincts.iter().filter(|i| i.status == status).count();
        let active: Vec<f64> = instincts
            .iter()
            .filter(|i| i.status == InstinctStatus::Active)
            .map(|i| i.confidence.composite())
            .collect();

        let avg_confidence = if active.is_empty() {
            0.0
        } else {
            let mean = active.iter().sum::<f64>() / active.len() as f64;
            (mean * 100.0).round() / 100.0
        };

        StoreStats {
            total_instincts: instincts.len(),
            active_instincts: active.len(),
            tentative_instincts: count(InstinctStatus::Tentative),
            deprecated_instincts: count(InstinctStatus::Deprecated),
            avg_confidence,
            domains,
            total_sessions: store.metadata.total_sessions_analyzed,
            total_observations: store.metadata.total_observations,
        }
    }

    // --- Observations ---

    fn observation_path(&self, date: NaiveDate) -> PathBuf {
        self.observations_dir
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append to today's (UTC) observation partition.
    pub fn append_observation(&self, observation: &Observation) -> MindResult<()> {
        append_record(&self.observation_path(Utc::now().date_naive()), observation)
    }

    /// Observations recorded on `date` (today when `None`), in write order.
    pub fn get_observations(&self, date: Option<NaiveDate>) -> Vec<Observation> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        read_records(&self.observation_path(date))
    }

    /// Days that have an observation partition, oldest first.
    pub fn observation_days(&self) -> Vec<NaiveDate> {
        let Ok(entries) = std::fs::read_dir(&self.observations_dir) else {
            return Vec::new();
        };

        let mut days: Vec<NaiveDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let stem = name.to_str()?.strip_suffix(".jsonl")?.to_string();
                NaiveDate::parse_from_str(&stem, "%Y-%m-%d").ok()
            })
            .collect();
        days.sort();
        days
    }

    // --- Sessions ---

    pub fn append_session(&self, summary: &SessionSummary) -> MindResult<()> {
        append_record(&self.sessions_path, summary)
    }

    /// Up to `limit` session summaries, most recent first.
    pub fn get_sessions(&self, limit: usize) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = read_records(&self.sessions_path);
        let start = sessions.len().saturating_sub(limit);
        let mut recent = sessions.split_off(start);
        recent.reverse();
        recent
    }
}
