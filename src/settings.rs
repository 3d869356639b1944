use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::IngestOptions;

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "wiz_settings.json";

// ---------------------------------------------------------------------------
// Program settings
// ---------------------------------------------------------------------------

/// User-tunable engine settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lines per chunk for chunked text reads.
    #[serde(rename = "Load Chunk Size")]
    pub load_chunk_size: usize,

    /// Upper bound on samples handed to a display.
    #[serde(rename = "Max Preview Points")]
    pub max_preview_points: usize,

    #[serde(rename = "Clean By Default")]
    pub clean_by_default: bool,

    /// Treat NaN/∞ step results as replay failures.
    #[serde(rename = "Strict Replay")]
    pub strict_replay: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            load_chunk_size: 100_000,
            max_preview_points: 100_000,
            clean_by_default: true,
            strict_replay: false,
        }
    }
}

impl Settings {
    /// Read settings from `path`, or write the defaults there if the file
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.is_file() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            let settings: Settings = serde_json::from_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?;
            log::debug!("Loaded settings from {}", path.display());
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save(path)?;
            log::info!("Wrote default settings to {}", path.display());
            Ok(settings)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing settings")?;
        std::fs::write(path, text).with_context(|| format!("writing settings {}", path.display()))
    }

    /// Ingest options for the given columns using the configured chunk size
    /// and cleaning default.
    pub fn ingest_options(&self, x_column: usize, y_column: usize, has_header: bool) -> IngestOptions {
        IngestOptions {
            x_column,
            y_column,
            has_header,
            clean: self.clean_by_default,
            chunk_size: Some(self.load_chunk_size.max(1)),
            ..IngestOptions::default()
        }
    }
}
