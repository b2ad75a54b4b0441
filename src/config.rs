//! Configuration structures for the trainctl system
//!
//! A configuration file carries a `model` section naming the model type, a
//! `train` section driving the control loop, an optional `cfg` path to a
//! model-definition file, and any number of free-form sections consumed by
//! concrete epoch hooks. Free-form sections are preserved verbatim when the
//! configuration is written back to disk or embedded in a checkpoint.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::training::monitor::MonitorSpec;

/// Free-form configuration sections keyed by name
pub type Sections = serde_json::Map<String, serde_json::Value>;

/// Full configuration of a training run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    /// Run name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Model section
    pub model: ModelConfig,

    /// Control loop section
    pub train: TrainConfig,

    /// Optional model-definition file copied into the run directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<PathBuf>,

    /// Every other top-level section
    #[serde(flatten)]
    pub extra: Sections,
}

/// Model section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Model type, used to name the run directory
    #[serde(rename = "type")]
    pub model_type: String,

    /// Model arguments, passed through to the epoch hook
    #[serde(flatten)]
    pub extra: Sections,
}

/// Control loop section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainConfig {
    /// Last epoch to run (inclusive, epochs are numbered from 1)
    pub epochs: usize,

    /// Save a checkpoint every `save_period` epochs
    #[serde(rename = "save_p", alias = "save_period", default = "default_save_period")]
    pub save_period: usize,

    /// 0 = warnings only, 1 = info, 2 = debug
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// `"off"` or `"<min|max> <metric>"`
    #[serde(default)]
    pub monitor: MonitorSpec,

    /// Consecutive non-improving epochs tolerated; absent means never stop early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stop: Option<usize>,

    /// Root directory for run directories
    pub save_dir: PathBuf,

    /// Enable the scalar writer
    #[serde(rename = "tbX", alias = "tensorboard", default)]
    pub tensorboard: bool,
}

fn default_save_period() -> usize {
    1
}

fn default_verbosity() -> u8 {
    1
}

impl TrainerConfig {
    /// Create a configuration with default loop settings
    pub fn new(model_type: impl Into<String>, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            model: ModelConfig {
                model_type: model_type.into(),
                extra: Sections::new(),
            },
            train: TrainConfig {
                epochs: 100,
                save_period: default_save_period(),
                verbosity: default_verbosity(),
                monitor: MonitorSpec::Off,
                early_stop: None,
                save_dir: save_dir.into(),
                tensorboard: false,
            },
            cfg: None,
            extra: Sections::new(),
        }
    }

    /// Load configuration from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON or YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.model_type.trim().is_empty() {
            return Err(Error::config("model type must not be empty"));
        }

        if self.train.epochs == 0 {
            return Err(Error::config("number of epochs must be greater than 0"));
        }

        if self.train.save_period == 0 {
            return Err(Error::config("save period must be greater than 0"));
        }

        if self.train.verbosity > 2 {
            return Err(Error::config(format!(
                "verbosity must be 0, 1 or 2, got {}",
                self.train.verbosity
            )));
        }

        Ok(())
    }

    /// Deserialize a free-form section, falling back to its default when absent
    pub fn section<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.extra.get(key) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                Error::config(format!("invalid `{}` section: {}", key, e))
            }),
            None => Ok(T::default()),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}
