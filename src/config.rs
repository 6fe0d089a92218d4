use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use xdg::BaseDirectories;

use crate::gap::expand::ExpansionLimits;
use crate::gap::ANNOTATION_CONTEXT_RADIUS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expansion: ExpansionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Context lines revealed around an annotation target.
    pub context_radius: u32,
    /// Lines revealed per directional expansion step.
    pub directional_step: u32,
    /// A range reveal covering at least this share of a gap degrades to a
    /// full reveal.
    pub full_reveal_ratio: f64,
    /// Gaps at or below this many lines always reveal fully.
    pub small_gap_lines: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expansion: ExpansionConfig::default(),
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            context_radius: ANNOTATION_CONTEXT_RADIUS,
            directional_step: 20,
            full_reveal_ratio: 0.7,
            small_gap_lines: 10,
        }
    }
}

impl ExpansionConfig {
    pub fn limits(&self) -> ExpansionLimits {
        ExpansionLimits {
            full_reveal_ratio: self.full_reveal_ratio,
            small_gap_lines: self.small_gap_lines,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(config_path) if config_path.exists() => {
                let content =
                    fs::read_to_string(&config_path).context("Failed to read config file")?;
                toml::from_str(&content).context("Failed to parse config file")
            }
            _ => Ok(Self::default()),
        }
    }

    fn config_path() -> Option<PathBuf> {
        let base = BaseDirectories::with_prefix("gapfold").ok()?;
        Some(base.get_config_home().join("config.toml"))
    }
}
