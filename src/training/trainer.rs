//! Base trainer: the epoch loop, best-model tracking and checkpointing
//!
//! [`Trainer`] owns the control loop and delegates the actual work of each
//! epoch to a [`TrainEpoch`] hook. After every epoch it records the epoch
//! log, reports the learning rate, feeds the monitor, stops early when the
//! monitor says so, and saves checkpoints on the configured period.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::TrainerConfig;
use crate::error::{Error, Result};
use crate::training::checkpoint::{Checkpoint, CheckpointManager, SavedCheckpoint};
use crate::training::history::{EpochLog, EpochResult, TrainingHistory};
use crate::training::model::Model;
use crate::training::monitor::Monitor;
use crate::training::optimizer::Optimizer;
use crate::training::run_dir::RunDirs;
use crate::training::writer::{ScalarWriter, SCALARS_FILE};

/// File name of the saved configuration
pub const CONFIG_FILE: &str = "config.json";

/// File name of the copied model-definition file
pub const MODEL_DEFINITION_FILE: &str = "model.cfg";

/// Model-specific training logic for one epoch
pub trait TrainEpoch {
    /// Model being trained
    type Model: Model;

    /// Optimizer updating the model
    type Optimizer: Optimizer;

    /// Run one epoch and report its metrics
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochResult>;

    /// Model being trained
    fn model(&self) -> &Self::Model;

    /// Mutable access to the model, used when resuming
    fn model_mut(&mut self) -> &mut Self::Model;

    /// Optimizer in use
    fn optimizer(&self) -> &Self::Optimizer;

    /// Mutable access to the optimizer, used when resuming
    fn optimizer_mut(&mut self) -> &mut Self::Optimizer;
}

/// How a training run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    /// Every configured epoch ran
    Completed,
    /// The monitored metric stopped improving
    EarlyStopped,
}

/// Training result information
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// How the run ended
    pub status: TrainingStatus,

    /// Last epoch processed; `None` when the start epoch was past the end
    pub last_epoch: Option<usize>,

    /// Best monitored value
    pub best: f64,

    /// Log of the epoch that set the best value during this run
    pub best_log: Option<EpochLog>,

    /// Paths written by the last checkpoint save
    pub last_checkpoint: Option<SavedCheckpoint>,

    /// Checkpoint directory of the run
    pub checkpoint_dir: PathBuf,

    /// Wall-clock duration of the loop
    pub duration: Duration,
}

/// Training-loop controller
pub struct Trainer<H: TrainEpoch> {
    hook: H,
    config: TrainerConfig,
    monitor: Monitor,
    history: Option<TrainingHistory>,
    writer: ScalarWriter,
    checkpoints: CheckpointManager,
    run_dirs: RunDirs,
    start_epoch: usize,
}

impl<H: TrainEpoch> Trainer<H> {
    /// Set up the run directory and, when `resume` is given, restore its state
    pub fn new(
        hook: H,
        mut config: TrainerConfig,
        resume: Option<&Path>,
        history: Option<TrainingHistory>,
    ) -> Result<Self> {
        config.validate()?;

        let run_dirs = RunDirs::create(&config.train.save_dir, &config.model.model_type)?;
        let writer = ScalarWriter::new(&run_dirs.log_dir, config.train.tensorboard)?;

        if let Some(source) = config.cfg.take() {
            let dest = run_dirs.checkpoint_dir.join(MODEL_DEFINITION_FILE);
            std::fs::copy(&source, &dest).map_err(|e| {
                Error::config(format!(
                    "cannot copy model definition {}: {}",
                    source.display(),
                    e
                ))
            })?;
            config.cfg = Some(dest);
        }

        let config_path = run_dirs.checkpoint_dir.join(CONFIG_FILE);
        config.to_file(&config_path)?;
        debug!("Configuration saved to {}", config_path.display());

        let monitor = Monitor::new(&config.train.monitor, config.train.early_stop);
        let checkpoints = CheckpointManager::new(&run_dirs.checkpoint_dir)?;

        let mut trainer = Self {
            hook,
            config,
            monitor,
            history,
            writer,
            checkpoints,
            run_dirs,
            start_epoch: 1,
        };

        if let Some(path) = resume {
            trainer.resume_checkpoint(path)?;
        }

        Ok(trainer)
    }

    /// Run the epoch loop
    pub fn train(&mut self) -> Result<TrainingSummary> {
        let started = Instant::now();
        let epochs = self.config.train.epochs;
        let save_period = self.config.train.save_period;
        let verbose = self.config.train.verbosity >= 1;

        let mut status = TrainingStatus::Completed;
        let mut last_epoch = None;
        let mut best_log: Option<EpochLog> = None;
        let mut last_checkpoint = None;

        info!(
            "Training epochs {}..={} (monitor: {})",
            self.start_epoch, epochs, self.config.train.monitor
        );

        for epoch in self.start_epoch..=epochs {
            let result = self.hook.train_epoch(epoch)?;
            let log = EpochLog::new(epoch, result);
            last_epoch = Some(epoch);

            let lr = self.hook.optimizer().learning_rate();
            if let Some(history) = self.history.as_mut() {
                history.add_entry(log.clone());
                if verbose {
                    info!("Epoch {}/{}\n{}", epoch, epochs, log);
                    if let Some(lr) = lr {
                        info!("lr_0: {}", lr);
                    }
                }
            }

            self.writer.set_step(epoch);
            if let Some(lr) = lr {
                self.writer.add_scalar("lr", lr)?;
            }
            for (name, value) in &log.metrics {
                self.writer.add_scalar(name, *value)?;
            }
            self.writer.flush()?;

            let observation = self.monitor.observe(&log);
            if observation.improved {
                best_log = Some(log.clone());
            }
            debug!(
                "Epoch {}: improved={} not_improved_count={}",
                epoch,
                observation.improved,
                self.monitor.not_improved_count()
            );

            if observation.stop {
                info!(
                    "Validation performance didn't improve for {} epochs. Training stops.",
                    self.monitor.early_stop().unwrap_or_default()
                );
                if let Some(best) = &best_log {
                    info!("Final (epoch {}):\n{}", best.epoch, best);
                }
                status = TrainingStatus::EarlyStopped;
                break;
            }

            if !self.writer.is_empty() {
                info!(
                    "Scalar logs: {}",
                    self.writer.log_dir().join(SCALARS_FILE).display()
                );
            }

            if epoch % save_period == 0 {
                last_checkpoint = Some(self.save_checkpoint(epoch, observation.improved)?);
            }
        }

        let duration = started.elapsed();
        info!("Training finished in {:?} ({:?})", duration, status);

        Ok(TrainingSummary {
            status,
            last_epoch,
            best: self.monitor.best(),
            best_log,
            last_checkpoint,
            checkpoint_dir: self.run_dirs.checkpoint_dir.clone(),
            duration,
        })
    }

    /// Save the current checkpoint, and the best copy when `save_best`
    pub fn save_checkpoint(&mut self, epoch: usize, save_best: bool) -> Result<SavedCheckpoint> {
        let model = self.hook.model();
        let checkpoint = Checkpoint {
            arch: model.arch().to_string(),
            epoch,
            history: self.history.clone(),
            state_dict: model.state_dict()?,
            optimizer: self.hook.optimizer().state_dict()?,
            monitor_best: self.monitor.best(),
            config: self.config.clone(),
            classes: model.classes(),
        };

        let saved = self.checkpoints.save(&checkpoint, save_best)?;
        if saved.best.is_some() {
            info!("[IMPROVED]");
        }
        Ok(saved)
    }

    /// Restore model, optimizer, monitor and history from a checkpoint
    pub fn resume_checkpoint(&mut self, path: &Path) -> Result<()> {
        info!("Loading checkpoint: {} ...", path.display());
        let checkpoint = Checkpoint::load(path)?;

        if checkpoint.arch != self.hook.model().arch() {
            warn!(
                "Checkpoint architecture `{}` differs from model architecture `{}`",
                checkpoint.arch,
                self.hook.model().arch()
            );
        }

        let start_epoch = checkpoint.epoch.checked_add(1).ok_or_else(|| {
            Error::checkpoint(format!("epoch {} is out of range", checkpoint.epoch))
        })?;

        self.hook.model_mut().load_state_dict(&checkpoint.state_dict)?;
        self.hook
            .optimizer_mut()
            .load_state_dict(&checkpoint.optimizer)?;

        self.start_epoch = start_epoch;
        self.monitor.restore_best(checkpoint.monitor_best);
        self.history = checkpoint.history;

        info!(
            "Checkpoint '{}' (epoch {}) loaded",
            path.display(),
            checkpoint.epoch
        );
        Ok(())
    }

    /// First epoch the next call to [`train`](Self::train) runs
    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    /// Monitor state
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Training-history logger
    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    /// Run configuration as written to `config.json`
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run directories
    pub fn run_dirs(&self) -> &RunDirs {
        &self.run_dirs
    }

    /// Checkpoint directory
    pub fn checkpoint_dir(&self) -> &Path {
        &self.run_dirs.checkpoint_dir
    }

    /// Epoch hook
    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Give back the epoch hook
    pub fn into_hook(self) -> H {
        self.hook
    }
}
