//! AgentMind CLI: JSON command surface over the instinct store.

pub mod commands;
pub mod config;

pub use config::{options_from_env, resolve_root};
