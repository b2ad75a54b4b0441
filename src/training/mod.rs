//! Training infrastructure
//!
//! This module provides the epoch-loop controller and the pieces it drives:
//! metric monitoring with early stopping, checkpoint persistence, the
//! per-epoch history logger, and the scalar writer.
//!
//! # Main Components
//!
//! - **Trainer**: Epoch loop delegating per-epoch work to a [`TrainEpoch`] hook
//! - **Monitor**: Best-value tracking and the early-stop counter
//! - **Checkpoints**: Current/best checkpoint files and resume support
//! - **Model / Optimizer**: State-dict contracts of trainable components
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trainctl::training::Trainer;
//! use trainctl::TrainerConfig;
//!
//! let config = TrainerConfig::from_file("config.yaml")?;
//! let mut trainer = Trainer::new(hook, config, None, None)?;
//! let summary = trainer.train()?;
//! ```

pub mod checkpoint;
pub mod history;
pub mod model;
pub mod monitor;
pub mod optimizer;
pub mod run_dir;
pub mod trainer;
pub mod writer;

pub use checkpoint::{
    Checkpoint, CheckpointManager, SavedCheckpoint, BEST_CHECKPOINT, CURRENT_CHECKPOINT,
};
pub use history::{EpochLog, EpochResult, TrainingHistory};
pub use model::{Model, StateDict, TensorState};
pub use monitor::{Monitor, MonitorMode, MonitorSpec, Observation};
pub use optimizer::{CandleOptimizer, Optimizer, OptimizerStateDict, ParamGroup};
pub use run_dir::RunDirs;
pub use trainer::{TrainEpoch, Trainer, TrainingStatus, TrainingSummary};
pub use writer::ScalarWriter;

// Tests module
#[cfg(test)]
mod tests;
