//! Reducer settings persistence.
//!
//! Settings are stored in a JSON file in the user's config directory:
//! - macOS: ~/Library/Application Support/cell-state/settings.json
//! - Linux: ~/.config/cell-state/settings.json
//! - Windows: C:\Users\<User>\AppData\Roaming\cell-state\settings.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::outline::DEFAULT_MAX_OUTLINE_LEVEL;

/// Tuning for the default console coalescer and outline extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReducerSettings {
    /// Keep only this many trailing lines of each merged console fragment
    #[serde(default)]
    pub max_console_lines: Option<usize>,

    /// Deepest heading level included in a cell outline (1-6)
    #[serde(default = "default_max_outline_level")]
    pub max_outline_level: u8,
}

fn default_max_outline_level() -> u8 {
    DEFAULT_MAX_OUTLINE_LEVEL
}

impl Default for ReducerSettings {
    fn default() -> Self {
        Self {
            max_console_lines: None,
            max_outline_level: DEFAULT_MAX_OUTLINE_LEVEL,
        }
    }
}

/// Get the path to the settings file
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cell-state")
        .join("settings.json")
}

/// Load settings from disk, returning defaults if the file is missing or invalid
pub fn load_settings() -> ReducerSettings {
    let path = settings_path();
    if !path.exists() {
        return ReducerSettings::default();
    }
    load_settings_from(&path).unwrap_or_else(|e| {
        warn!("Ignoring settings at {:?}: {:#}", path, e);
        ReducerSettings::default()
    })
}

/// Load settings from a specific file
pub fn load_settings_from(path: &Path) -> Result<ReducerSettings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(settings)
}

/// Save settings to a specific file, creating parent directories
pub fn save_settings_to(path: &Path, settings: &ReducerSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

/// JSON schema for the settings file
pub fn settings_schema() -> schemars::Schema {
    schemars::schema_for!(ReducerSettings)
}
