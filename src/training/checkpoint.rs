//! Checkpoint records and their on-disk format
//!
//! A checkpoint file starts with the magic bytes `TCKP` and a little-endian
//! `u32` format version, followed by a gzip stream holding the bincode
//! encoding of the record. The configuration travels as JSON text inside the
//! record so that free-form configuration sections survive the binary
//! encoding.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainerConfig;
use crate::error::{Error, Result};
use crate::training::history::TrainingHistory;
use crate::training::model::StateDict;
use crate::training::optimizer::OptimizerStateDict;
use crate::utils::io::{ensure_dir_exists, write_file_atomic};

/// File name of the rolling checkpoint
pub const CURRENT_CHECKPOINT: &str = "checkpoint-current.ckpt";

/// File name of the best-model checkpoint
pub const BEST_CHECKPOINT: &str = "model_best.ckpt";

const MAGIC: &[u8; 4] = b"TCKP";
const FORMAT_VERSION: u32 = 1;

/// Everything needed to resume a training run
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Model architecture name
    pub arch: String,

    /// Epoch at which the checkpoint was taken
    pub epoch: usize,

    /// Training-history logger, if the run had one
    pub history: Option<TrainingHistory>,

    /// Model parameters
    pub state_dict: StateDict,

    /// Optimizer state
    pub optimizer: OptimizerStateDict,

    /// Best monitored value so far
    pub monitor_best: f64,

    /// Full run configuration
    pub config: TrainerConfig,

    /// Class labels of the model
    pub classes: Vec<String>,
}

/// Wire form of [`Checkpoint`]
#[derive(Serialize, Deserialize)]
struct CheckpointRecord {
    arch: String,
    epoch: usize,
    history: Option<TrainingHistory>,
    state_dict: StateDict,
    optimizer: OptimizerStateDict,
    monitor_best: f64,
    config: String,
    classes: Vec<String>,
}

impl Checkpoint {
    /// Encode the checkpoint into its file representation
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let record = CheckpointRecord {
            arch: self.arch.clone(),
            epoch: self.epoch,
            history: self.history.clone(),
            state_dict: self.state_dict.clone(),
            optimizer: self.optimizer.clone(),
            monitor_best: self.monitor_best,
            config: serde_json::to_string(&self.config)?,
            classes: self.classes.clone(),
        };

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

        let mut encoder = GzEncoder::new(bytes, Compression::default());
        bincode::serialize_into(&mut encoder, &record)
            .map_err(|e| Error::checkpoint(format!("failed to encode checkpoint: {}", e)))?;
        Ok(encoder.finish()?)
    }

    /// Decode a checkpoint from its file representation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || &bytes[..4] != MAGIC {
            return Err(Error::checkpoint("not a checkpoint file (bad magic)"));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(Error::checkpoint(format!(
                "unsupported checkpoint format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let mut payload = Vec::new();
        GzDecoder::new(&bytes[8..])
            .read_to_end(&mut payload)
            .map_err(|e| Error::checkpoint(format!("corrupt checkpoint payload: {}", e)))?;

        let record: CheckpointRecord = bincode::deserialize(&payload)
            .map_err(|e| Error::checkpoint(format!("incompatible checkpoint record: {}", e)))?;

        let config = serde_json::from_str(&record.config).map_err(|e| {
            Error::checkpoint(format!("invalid configuration in checkpoint: {}", e))
        })?;

        Ok(Self {
            arch: record.arch,
            epoch: record.epoch,
            history: record.history,
            state_dict: record.state_dict,
            optimizer: record.optimizer,
            monitor_best: record.monitor_best,
            config,
            classes: record.classes,
        })
    }

    /// Write the checkpoint to `path`, replacing any existing file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file_atomic(path, &self.to_bytes()?)
    }

    /// Read a checkpoint from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::checkpoint(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }
}

/// Paths written by one save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCheckpoint {
    /// The rolling checkpoint
    pub current: PathBuf,

    /// The best-model copy, when the epoch improved
    pub best: Option<PathBuf>,
}

/// Writes the current/best checkpoint pair into a directory
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager, creating `dir` if needed
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        ensure_dir_exists(&dir)?;
        Ok(Self { dir })
    }

    /// Save the rolling checkpoint, and the best copy when `save_best`
    pub fn save(&self, checkpoint: &Checkpoint, save_best: bool) -> Result<SavedCheckpoint> {
        let bytes = checkpoint.to_bytes()?;

        let current = self.current_path();
        write_file_atomic(&current, &bytes)?;
        info!("Saving checkpoint: {} ...", current.display());

        let best = if save_best {
            let best = self.best_path();
            write_file_atomic(&best, &bytes)?;
            info!("Saving current best: {} ...", BEST_CHECKPOINT);
            Some(best)
        } else {
            None
        };

        Ok(SavedCheckpoint { current, best })
    }

    /// Path of the rolling checkpoint
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_CHECKPOINT)
    }

    /// Path of the best-model checkpoint
    pub fn best_path(&self) -> PathBuf {
        self.dir.join(BEST_CHECKPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::history::{EpochLog, EpochResult};
    use crate::training::model::TensorState;
    use crate::training::optimizer::ParamGroup;
    use tempfile::TempDir;

    fn sample_checkpoint(epoch: usize) -> Checkpoint {
        let mut state_dict = StateDict::new();
        state_dict.insert(
            "linear.weight",
            TensorState {
                shape: vec![1, 2],
                dtype: "f32".to_string(),
                data: vec![0.25, -0.5],
            },
        );

        let mut history = TrainingHistory::new();
        history.add_entry(EpochLog::new(
            epoch,
            EpochResult::from([("loss".to_string(), 0.125)]),
        ));

        let mut config = TrainerConfig::new("LinearRegression", "saved");
        config
            .extra
            .insert("data_loader".to_string(), serde_json::json!({ "batch_size": 8 }));

        Checkpoint {
            arch: "LinearRegression".to_string(),
            epoch,
            history: Some(history),
            state_dict,
            optimizer: OptimizerStateDict {
                optimizer_type: "SGD".to_string(),
                step_count: 40,
                param_groups: vec![ParamGroup::new(0.01)],
                state: StateDict::new(),
            },
            monitor_best: 0.125,
            config,
            classes: vec!["calm".to_string(), "aggressive".to_string()],
        }
    }

    #[test]
    fn test_checkpoint_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ckpt.ckpt");
        let checkpoint = sample_checkpoint(3);

        checkpoint.save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.config.extra["data_loader"]["batch_size"], 8);
    }

    #[test]
    fn test_infinite_best_survives() {
        let mut checkpoint = sample_checkpoint(1);
        checkpoint.monitor_best = f64::INFINITY;
        let loaded = Checkpoint::from_bytes(&checkpoint.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.monitor_best, f64::INFINITY);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Checkpoint::load(dir.path().join("absent.ckpt")).unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        assert!(Checkpoint::from_bytes(b"PK\x03\x04garbage").is_err());
        assert!(Checkpoint::from_bytes(b"TC").is_err());

        let mut bytes = sample_checkpoint(1).to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = Checkpoint::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }

    #[test]
    fn test_rejects_corrupt_payload() {
        let mut bytes = sample_checkpoint(1).to_bytes().unwrap();
        let len = bytes.len();
        bytes.truncate(len / 2);
        assert!(matches!(
            Checkpoint::from_bytes(&bytes),
            Err(Error::Checkpoint(_))
        ));
    }

    #[test]
    fn test_manager_writes_best_only_when_asked() {
        let dir = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path().join("checkpoints")).unwrap();

        let saved = manager.save(&sample_checkpoint(1), false).unwrap();
        assert!(saved.current.exists());
        assert!(saved.best.is_none());
        assert!(!manager.best_path().exists());

        let saved = manager.save(&sample_checkpoint(2), true).unwrap();
        assert_eq!(saved.best.as_deref(), Some(manager.best_path().as_path()));

        let current = Checkpoint::load(manager.current_path()).unwrap();
        let best = Checkpoint::load(manager.best_path()).unwrap();
        assert_eq!(current, best);
        assert_eq!(best.epoch, 2);
    }
}
