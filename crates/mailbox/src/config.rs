//! Engine configuration
//!
//! Loaded in the following order, later sources winning:
//! 1. Built-in defaults
//! 2. JSON file (~/.config/mailstate/mailstate.json)
//! 3. Environment overrides (`MAILSTATE_PAGE_SIZE`, `MAILSTATE_BATCH_STRATEGY`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config filename in the mailstate config directory
const CONFIG_FILE: &str = "mailstate.json";

const PAGE_SIZE_VAR: &str = "MAILSTATE_PAGE_SIZE";
const BATCH_STRATEGY_VAR: &str = "MAILSTATE_BATCH_STRATEGY";

/// How a multi-item mutation is dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// One batch call for all targets
    #[default]
    Batched,
    /// One call per target, succeeding only if every call succeeds
    PerItem,
}

impl fmt::Display for BatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batched => f.write_str("batched"),
            Self::PerItem => f.write_str("per_item"),
        }
    }
}

impl FromStr for BatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "batched" | "batch" => Ok(Self::Batched),
            "per_item" | "peritem" => Ok(Self::PerItem),
            other => Err(format!("unknown batch strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub page_size: usize,
    pub row_height: f64,
    pub compact_row_height: f64,
    pub compact: bool,
    /// Remaining distance, in rows, that triggers the next page
    pub load_threshold_rows: f64,
    pub batch_strategy: BatchStrategy,
    /// Restore the unread flag locally when mark-read on open fails
    pub rollback_failed_mark_read: bool,
    /// Reconcile the succeeded subset when some per-item calls fail
    pub reconcile_partial_success: bool,
    /// Close the open item when a mutation removes it
    pub close_selected_on_mutation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            row_height: 96.0,
            compact_row_height: 64.0,
            compact: false,
            load_threshold_rows: 2.0,
            batch_strategy: BatchStrategy::Batched,
            rollback_failed_mark_read: false,
            reconcile_partial_success: false,
            close_selected_on_mutation: true,
        }
    }
}

impl EngineConfig {
    /// Load from the config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let file: Self = config::load_json_or_default(CONFIG_FILE)?;
        file.with_env_overrides()
    }

    /// Load from a specific JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: Self = config::load_json_file(path)?;
        file.with_env_overrides()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    /// Get the default config file path (~/.config/mailstate/mailstate.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(page_size) = config::env_override::<usize>(PAGE_SIZE_VAR)? {
            self.page_size = page_size;
        }
        if let Some(strategy) = config::env_override::<BatchStrategy>(BATCH_STRATEGY_VAR)? {
            self.batch_strategy = strategy;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        if self.row_height <= 0.0 || self.compact_row_height <= 0.0 {
            anyhow::bail!("row heights must be positive");
        }
        Ok(self)
    }

    /// Row height for the active density
    pub fn effective_row_height(&self) -> f64 {
        if self.compact {
            self.compact_row_height
        } else {
            self.row_height
        }
    }
}
