//! TOML-based autopilot configuration.
//!
//! Stores engine tuning including:
//! - Batch size, batch deadline and the daily auto-apply limit
//! - The consent threshold
//! - Learned-confidence weighting and sample requirements
//! - Per-prayer window buffers
//!
//! Configuration is stored at `~/.config/oryxa/autopilot.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::prayer::BufferTable;

/// Batch processing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Items not started before this many milliseconds are deferred.
    #[serde(default = "default_batch_deadline_ms")]
    pub batch_deadline_ms: u64,
    /// Auto-applies allowed per owner per UTC day; 0 disables auto-apply.
    #[serde(default = "default_daily_auto_apply_limit")]
    pub daily_auto_apply_limit: u32,
}

/// Consent gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Decisions below this confidence need the owner's consent.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// Learned confidence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Share of the final confidence taken from learned feedback.
    #[serde(default = "default_learned_weight")]
    pub learned_weight: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// Trailing window in days; 0 uses all history.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

/// Autopilot configuration.
///
/// Serialized to/from TOML at `~/.config/oryxa/autopilot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutopilotConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub buffers: BufferTable,
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_deadline_ms() -> u64 {
    5_000
}
fn default_daily_auto_apply_limit() -> u32 {
    20
}
fn default_threshold() -> f64 {
    70.0
}
fn default_learned_weight() -> f64 {
    0.7
}
fn default_min_samples() -> u64 {
    5
}
fn default_lookback_days() -> u32 {
    90
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_deadline_ms: default_batch_deadline_ms(),
            daily_auto_apply_limit: default_daily_auto_apply_limit(),
        }
    }
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learned_weight: default_learned_weight(),
            min_samples: default_min_samples(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl AutopilotConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(n) => {
                        if n.is_f64() {
                            let f = value.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                            serde_json::Number::from_f64(f)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            let u = value.parse::<u64>().map_err(|e| invalid(e.to_string()))?;
                            serde_json::Value::Number(u.into())
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config path: `~/.config/oryxa/autopilot.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("autopilot.toml"))
    }

    /// Load from the default path, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Same as [`AutopilotConfig::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: AutopilotConfig =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default path.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default autopilot config");
            Self::default()
        })
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    /// `InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if self.engine.batch_size == 0 {
            return invalid("engine.batch_size", "must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.consent.threshold) {
            return invalid("consent.threshold", "must be within 0..=100");
        }
        if !(0.0..=1.0).contains(&self.learning.learned_weight) {
            return invalid("learning.learned_weight", "must be within 0..=1");
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key in memory. Call `save` to persist.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: AutopilotConfig =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
