//! trainctl - supervised training control loop
//!
//! This crate drives a user-supplied per-epoch training step through a full
//! run: run-directory setup, per-epoch metric logging, best-model tracking
//! against a monitored metric, early stopping, periodic checkpointing and
//! resumption from a checkpoint.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod regression;
pub mod training;
pub mod utils;

// Re-exports
pub use config::{ModelConfig, TrainConfig, TrainerConfig};
pub use error::{Error, Result};
pub use regression::{LinearRegression, RegressionConfig, RegressionTrainer};
pub use training::{
    Checkpoint, EpochLog, EpochResult, Model, Monitor, MonitorSpec, Optimizer, TrainEpoch,
    Trainer, TrainingHistory, TrainingStatus, TrainingSummary,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
