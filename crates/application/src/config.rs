//! Analyzer configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Rule module thresholds sit at the top level next to the
//! analyzer's own settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use repcoach_exercise::{Exercise, ExerciseSettings};
use repcoach_pose::Side;
use serde::{Deserialize, Serialize};

use crate::constants::{APP_DIR_NAME, CONFIG_FILE_NAME, FEEDBACK_COOLDOWN_MS, FRAME_INTERVAL_MS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum gap between non-priority spoken cues.
    pub cooldown_ms: u64,
    /// Frame loop tick period.
    pub frame_interval_ms: u64,
    /// Exercise selected when the analyzer starts.
    pub initial_exercise: Exercise,
    /// Body side tracked for single-side joints.
    pub side: Side,
    #[serde(flatten)]
    pub rules: ExerciseSettings,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: FEEDBACK_COOLDOWN_MS,
            frame_interval_ms: FRAME_INTERVAL_MS,
            initial_exercise: Exercise::default(),
            side: Side::default(),
            rules: ExerciseSettings::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Platform config location, e.g. `~/.config/repcoach/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), "Loaded analyzer config");
        Ok(config)
    }

    /// Load `path` if given, else the platform file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rules.defect_frame_threshold == 0 {
            return Err(ConfigError::Invalid(
                "defect_frame_threshold must be at least 1".into(),
            ));
        }
        if self.rules.encouragement_interval == 0 {
            return Err(ConfigError::Invalid(
                "encouragement_interval must be at least 1".into(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rules.min_visibility) {
            return Err(ConfigError::Invalid(
                "min_visibility must be within 0..=1".into(),
            ));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
