//! Configuration loading and resolution.

use std::path::PathBuf;

use agentmind::{AnalysisOptions, SequenceOptions};

pub const ROOT_ENV: &str = "AGENTMIND_ROOT";
pub const PLUGIN_ROOT_ENV: &str = "CLAUDE_PLUGIN_ROOT";
pub const MIN_COUNT_ENV: &str = "AGENTMIND_MIN_COUNT";
pub const NGRAM_SIZE_ENV: &str = "AGENTMIND_NGRAM_SIZE";
pub const DECAY_RATE_ENV: &str = "AGENTMIND_DECAY_RATE";
pub const FEEDBACK_STRENGTH_ENV: &str = "AGENTMIND_FEEDBACK_STRENGTH";

/// Resolve the store root: explicit flag, then `AGENTMIND_ROOT`, then
/// `CLAUDE_PLUGIN_ROOT`, then the current directory.
pub fn resolve_root(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    for name in [ROOT_ENV, PLUGIN_ROOT_ENV] {
        if let Some(path) = read_env_string(name).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Analysis tunables from the process environment.
pub fn options_from_env() -> AnalysisOptions {
    options_from_lookup(|name| std::env::var(name).ok())
}

/// Analysis tunables from an arbitrary variable source. Unset or malformed
/// values fall back to the defaults.
pub fn options_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnalysisOptions {
    let defaults = AnalysisOptions::default();
    AnalysisOptions {
        sequence: SequenceOptions {
            min_count: parse_or(&lookup, MIN_COUNT_ENV, defaults.sequence.min_count),
            ngram_size: parse_or(&lookup, NGRAM_SIZE_ENV, defaults.sequence.ngram_size),
        },
        decay_rate: parse_or(&lookup, DECAY_RATE_ENV, defaults.decay_rate),
        feedback_strength: parse_or(&lookup, FEEDBACK_STRENGTH_ENV, defaults.feedback_strength),
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default_value: T,
) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_explicit_root_wins() {
        assert_eq!(resolve_root(Some("/tmp/mind")), PathBuf::from("/tmp/mind"));
    }

    #[test]
    fn test_options_defaults() {
        assert_eq!(options_from_lookup(|_| None), AnalysisOptions::default());
    }

    #[test]
    fn test_options_overrides_and_garbage() {
        let vars: HashMap<&str, &str> = [
            (MIN_COUNT_ENV, "5"),
            (NGRAM_SIZE_ENV, " 2 "),
            (DECAY_RATE_ENV, "fast"),
            (FEEDBACK_STRENGTH_ENV, "0.4"),
        ]
        .into_iter()
        .collect();
        let options = options_from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(options.sequence.min_count, 5);
        assert_eq!(options.sequence.ngram_size, 2);
        assert_eq!(options.decay_rate, AnalysisOptions::default().decay_rate);
        assert_eq!(options.feedback_strength, 0.4);
    }
}
