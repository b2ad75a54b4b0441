//! Shared helpers for the end-to-end tests

use approx::assert_relative_eq;
use candle_core::Device;
use tempfile::TempDir;

use crate::config::TrainerConfig;
use crate::regression::{self, RegressionConfig, RegressionTrainer};
use crate::training::model::StateDict;

/// Fresh temporary directory
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

/// Small, fast regression problem
pub fn small_regression() -> RegressionConfig {
    RegressionConfig {
        input_dim: 3,
        train_samples: 96,
        val_samples: 32,
        batch_size: 16,
        ..RegressionConfig::default()
    }
}

/// Run configuration for the regression hook saving under `dir`
pub fn create_test_config(dir: &TempDir, epochs: usize) -> TrainerConfig {
    let mut config = TrainerConfig::new(regression::ARCH, dir.path());
    config.train.epochs = epochs;
    config.train.verbosity = 0;
    config.extra.insert(
        regression::SECTION.to_string(),
        serde_json::to_value(small_regression()).expect("section serializes"),
    );
    config
}

/// Regression hook on the CPU
pub fn create_test_hook(config: &TrainerConfig) -> RegressionTrainer {
    RegressionTrainer::from_trainer_config(config, &Device::Cpu).expect("hook builds")
}

/// Assert two parameter snapshots hold the same tensors
pub fn assert_state_close(left: &StateDict, right: &StateDict) {
    assert_eq!(left.len(), right.len());
    for (name, tensor) in left.iter() {
        let other = right.get(name).unwrap_or_else(|| panic!("missing `{}`", name));
        assert_eq!(tensor.shape, other.shape, "shape of `{}`", name);
        for (a, b) in tensor.data.iter().zip(&other.data) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
