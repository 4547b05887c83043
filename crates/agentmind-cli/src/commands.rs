//! Command implementations. Each returns the JSON document printed on stdout.

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use agentmind::confidence::summarize;
use agentmind::evolution::{DEFAULT_MIN_CLUSTER, DEFAULT_MIN_CONFIDENCE};
use agentmind::storage::sort_by_confidence;
use agentmind::{
    AnalysisOptions, ExportBundle, Instinct, InstinctFilter, LocalStorage, Observation,
};

/// Session id recorded when a batch spans no identifiable session.
const UNKNOWN_SESSION: &str = "unknown";

fn instinct_view(instinct: &Instinct) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(instinct)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "tier".to_string(),
            json!(instinct.confidence.tier().as_str()),
        );
        map.insert(
            "summary".to_string(),
            json!(summarize(&instinct.confidence).to_string()),
        );
    }
    Ok(value)
}

fn instinct_views<'a>(instincts: impl IntoIterator<Item = &'a Instinct>) -> anyhow::Result<Vec<Value>> {
    instincts.into_iter().map(instinct_view).collect()
}

/// Analyze one day of observations, optionally restricted to one session.
pub fn analyze(
    storage: &LocalStorage,
    date: Option<NaiveDate>,
    session: Option<&str>,
    is_final: bool,
    options: &AnalysisOptions,
) -> anyhow::Result<Value> {
    let mut observations = storage.get_observations(date);
    if let Some(session) = session {
        observations.retain(|o| o.session_id == session);
    }

    let session_id = session
        .map(str::to_string)
        .or_else(|| observations.last().map(|o| o.session_id.clone()))
        .unwrap_or_else(|| UNKNOWN_SESSION.to_string());

    let report = agentmind::analyze(storage, &session_id, &observations, options, is_final)
        .context("analysis failed")?;
    Ok(serde_json::to_value(report)?)
}

/// Append observation JSON lines read from `input`.
pub fn observe(storage: &LocalStorage, input: impl BufRead) -> anyhow::Result<Value> {
    let mut appended = 0usize;
    let mut rejected = 0usize;

    // Lines that are not UTF-8 fail to parse like any other malformed line.
    for line in input.split(b'\n') {
        let line = line.context("failed to read observations")?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Observation>(&line) {
            Ok(observation) => {
                storage.append_observation(&observation)?;
                appended += 1;
            }
            Err(e) => {
                tracing::warn!("Rejected observation: {e}");
                rejected += 1;
            }
        }
    }

    Ok(json!({ "appended": appended, "rejected": rejected }))
}

pub fn stats(storage: &LocalStorage) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(storage.get_stats())?)
}

pub fn list(storage: &LocalStorage, filter: &InstinctFilter) -> anyhow::Result<Value> {
    let instincts = storage.get_instincts(filter);
    Ok(json!({
        "count": instincts.len(),
        "instincts": instinct_views(&instincts)?,
    }))
}

pub fn sessions(storage: &LocalStorage, limit: usize) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(storage.get_sessions(limit))?)
}

pub fn feedback(
    storage: &LocalStorage,
    id: &str,
    approved: bool,
    strength: f64,
) -> anyhow::Result<Value> {
    match agentmind::record_feedback(storage, id, approved, strength)? {
        Some(instinct) => instinct_view(&instinct),
        None => bail!("instinct not found: {id}"),
    }
}

pub fn apply(storage: &LocalStorage, id: &str, success: bool) -> anyhow::Result<Value> {
    match agentmind::record_application(storage, id, success)? {
        Some(instinct) => instinct_view(&instinct),
        None => bail!("instinct not found: {id}"),
    }
}

pub fn decay(storage: &LocalStorage, rate: f64) -> anyhow::Result<Value> {
    let touched = agentmind::decay_sweep(storage, Utc::now(), rate)?;
    Ok(json!({ "decayed": touched.len(), "instinct_ids": touched }))
}

pub fn context(storage: &LocalStorage) -> anyhow::Result<Value> {
    let selection = agentmind::select_context(storage);
    Ok(json!({
        "core": instinct_views(&selection.core)?,
        "strong": instinct_views(&selection.strong)?,
        "moderate": instinct_views(&selection.moderate)?,
    }))
}

pub fn evolve(storage: &LocalStorage) -> anyhow::Result<Value> {
    let store = storage.load();
    let mut ranked = store.instincts.clone();
    sort_by_confidence(&mut ranked);
    let candidates =
        agentmind::evolution_candidates(&ranked, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_CLUSTER);
    let ungrouped: Vec<&str> = agentmind::ungrouped_instincts(&store)
        .into_iter()
        .map(|i| i.id.as_str())
        .collect();

    Ok(json!({
        "candidates": candidates,
        "ungrouped": ungrouped,
        "patterns": store.patterns.len(),
        "strategies": store.strategies.len(),
        "experts": store.experts.len(),
    }))
}

/// Export the store. With `output`, the bundle goes to that file and a short
/// receipt is returned instead.
pub fn export(storage: &LocalStorage, output: Option<&Path>) -> anyhow::Result<Value> {
    let bundle = storage.export_bundle();
    let Some(path) = output else {
        return Ok(serde_json::to_value(bundle)?);
    };

    let payload = serde_json::to_string_pretty(&bundle)?;
    std::fs::write(path, payload)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(json!({
        "exported": bundle.instincts.len(),
        "path": path.display().to_string(),
    }))
}

pub fn import(storage: &LocalStorage, path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let bundle: ExportBundle = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid export bundle", path.display()))?;
    let report = storage.import_bundle(bundle)?;
    Ok(serde_json::to_value(report)?)
}
