//! Viewing configuration
//!
//! Tunables for the windowing protocol and the lifecycle controller, loadable
//! from TOML. Every field has a default so a partial (or absent) config file
//! is fine.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INITIAL_VISIBLE, DEFAULT_MIN_TEXT_FILTER_LEN, DEFAULT_READ_AHEAD_AFTER,
    DEFAULT_READ_AHEAD_BEFORE, DEFAULT_UNIT_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingConfig {
    /// Minimum free-text length before filter changes issue search queries.
    #[serde(default = "default_min_text_filter_len")]
    pub min_text_filter_len: usize,
    /// Quantized unit size of one item in the windowed coordinate space.
    #[serde(default = "default_unit_size")]
    pub unit_size: u32,
    /// Read-ahead above the visible region, in units.
    #[serde(default = "default_read_ahead_before")]
    pub read_ahead_before: u32,
    /// Read-ahead below the visible region, in units.
    #[serde(default = "default_read_ahead_after")]
    pub read_ahead_after: u32,
    /// Units materialized by the implicit top seek on view acquisition.
    #[serde(default = "default_initial_visible")]
    pub initial_visible: u32,
}

fn default_min_text_filter_len() -> usize {
    DEFAULT_MIN_TEXT_FILTER_LEN
}

fn default_unit_size() -> u32 {
    DEFAULT_UNIT_SIZE
}

fn default_read_ahead_before() -> u32 {
    DEFAULT_READ_AHEAD_BEFORE
}

fn default_read_ahead_after() -> u32 {
    DEFAULT_READ_AHEAD_AFTER
}

fn default_initial_visible() -> u32 {
    DEFAULT_INITIAL_VISIBLE
}

impl Default for ViewingConfig {
    fn default() -> Self {
        Self {
            min_text_filter_len: default_min_text_filter_len(),
            unit_size: default_unit_size(),
            read_ahead_before: default_read_ahead_before(),
            read_ahead_after: default_read_ahead_after(),
            initial_visible: default_initial_visible(),
        }
    }
}

impl ViewingConfig {
    /// Parse a TOML document. Missing fields fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse viewing config")
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}
