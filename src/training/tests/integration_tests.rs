//! Full training runs with the regression hook

use approx::assert_relative_eq;

use crate::config::TrainerConfig;
use crate::training::checkpoint::{Checkpoint, BEST_CHECKPOINT, CURRENT_CHECKPOINT};
use crate::training::history::TrainingHistory;
use crate::training::model::Model;
use crate::training::trainer::{TrainEpoch, Trainer, TrainingStatus, CONFIG_FILE};
use crate::training::writer::SCALARS_FILE;

use super::test_utils::{create_temp_dir, create_test_config, create_test_hook};

#[test]
fn test_full_training_loop() {
    let dir = create_temp_dir();
    let mut config = create_test_config(&dir, 10);
    config.train.monitor = "min val_loss".parse().unwrap();
    config.train.save_period = 5;
    config.train.tensorboard = true;

    let hook = create_test_hook(&config);
    let mut trainer = Trainer::new(hook, config, None, Some(TrainingHistory::new())).unwrap();
    let summary = trainer.train().unwrap();

    assert_eq!(summary.status, TrainingStatus::Completed);
    assert_eq!(summary.last_epoch, Some(10));

    let history = trainer.history().unwrap();
    assert_eq!(history.len(), 10);
    let first = history.entries()[0].get("val_loss").unwrap();
    let last = history.latest().unwrap().get("val_loss").unwrap();
    assert!(last < first);

    let best_log = summary.best_log.unwrap();
    assert_relative_eq!(best_log.get("val_loss").unwrap(), summary.best);

    let current = Checkpoint::load(summary.checkpoint_dir.join(CURRENT_CHECKPOINT)).unwrap();
    assert_eq!(current.epoch, 10);
    assert_eq!(current.arch, "LinearRegression");
    assert_eq!(current.optimizer.optimizer_type, "SGD");
    assert_eq!(current.optimizer.step_count, 10 * 6);
    assert_eq!(
        current.state_dict,
        trainer.hook().model().state_dict().unwrap()
    );

    assert!(trainer.run_dirs().log_dir.join(SCALARS_FILE).is_file());
    assert!(summary.checkpoint_dir.join(CONFIG_FILE).is_file());
}

#[test]
fn test_yaml_config_run() {
    let dir = create_temp_dir();
    let config_path = dir.path().join("config.yaml");
    let yaml = format!(
        r#"
name: yaml-run
model:
  type: LinearRegression
train:
  epochs: 3
  save_p: 1
  verbosity: 0
  monitor: max epoch
  save_dir: {}
regression:
  input_dim: 2
  train_samples: 32
  val_samples: 8
  batch_size: 8
"#,
        dir.path().join("saved").display()
    );
    std::fs::write(&config_path, yaml).unwrap();

    let config = TrainerConfig::from_file(&config_path).unwrap();
    let hook = create_test_hook(&config);
    assert_eq!(hook.config().input_dim, 2);

    let mut trainer = Trainer::new(hook, config, None, None).unwrap();
    let summary = trainer.train().unwrap();

    // "epoch" resolves to the epoch number, so every epoch improves
    assert_eq!(summary.best, 3.0);
    let best = Checkpoint::load(summary.checkpoint_dir.join(BEST_CHECKPOINT)).unwrap();
    assert_eq!(best.epoch, 3);
    assert_eq!(best.config.name.as_deref(), Some("yaml-run"));
    assert!(summary.checkpoint_dir.starts_with(dir.path().join("saved")));
}

#[test]
fn test_hook_drives_epochs_directly() {
    let dir = create_temp_dir();
    let config = create_test_config(&dir, 1);
    let mut hook = create_test_hook(&config);

    let result = hook.train_epoch(1).unwrap();
    assert!(result.contains_key("loss"));
    assert!(result.contains_key("val_loss"));
}
