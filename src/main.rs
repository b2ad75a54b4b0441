use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use trainctl::device::{device_name, select_device};
use trainctl::logging::init_logging;
use trainctl::regression::{self, RegressionTrainer};
use trainctl::utils::io::is_file_readable;
use trainctl::{Checkpoint, Trainer, TrainerConfig, TrainingHistory, TrainingStatus};

#[derive(Parser)]
#[command(name = "trainctl")]
#[command(about = "Supervised training control loop with checkpointing and early stopping", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TRAINCTL_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from a configuration file
    Train {
        /// Configuration file path (JSON or YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Checkpoint to resume from
        #[arg(short, long)]
        resume: Option<PathBuf>,
    },

    /// Validate configuration file
    Config {
        /// Configuration file to validate
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the contents of a checkpoint
    Inspect {
        /// Checkpoint file
        checkpoint: PathBuf,
    },

    /// Show system information
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { config, resume } => {
            train(config, resume, cli.json_logs)?;
        }

        Commands::Config { file } => {
            init_logging(1, cli.json_logs)?;
            validate_config(file)?;
        }

        Commands::Inspect { checkpoint } => {
            init_logging(1, cli.json_logs)?;
            inspect_checkpoint(checkpoint)?;
        }

        Commands::Info => {
            show_system_info();
        }
    }

    Ok(())
}

fn train(config_path: PathBuf, resume: Option<PathBuf>, json_logs: bool) -> Result<()> {
    let config = TrainerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration file {}", config_path.display()))?;
    init_logging(config.train.verbosity, json_logs)?;
    info!("Configuration loaded from {}", config_path.display());

    if config.model.model_type != regression::ARCH {
        bail!(
            "Unknown model type `{}` (available: {})",
            config.model.model_type,
            regression::ARCH
        );
    }

    if let Some(path) = &resume {
        if !is_file_readable(path) {
            bail!("Checkpoint {} is not a readable file", path.display());
        }
    }

    let device = select_device();
    let hook = RegressionTrainer::from_trainer_config(&config, &device)
        .context("Failed to build the regression model")?;

    let mut trainer = Trainer::new(hook, config, resume.as_deref(), Some(TrainingHistory::new()))
        .context("Failed to initialize trainer")?;
    let summary = trainer.train().context("Training failed")?;

    match summary.status {
        TrainingStatus::Completed => info!("Training complete"),
        TrainingStatus::EarlyStopped => info!("Training stopped early"),
    }
    if let Some(epoch) = summary.last_epoch {
        info!("Last epoch: {}", epoch);
    }
    if let Some(best) = &summary.best_log {
        info!("Best epoch {}:\n{}", best.epoch, best);
    }
    info!("Checkpoints in {}", summary.checkpoint_dir.display());

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    info!("Validating configuration file: {}", config_path.display());

    let config = TrainerConfig::from_file(&config_path)
        .context("Failed to load configuration file")?;

    info!("Configuration is valid");
    info!("Configuration summary:");
    info!("  - Model: {}", config.model.model_type);
    info!("  - Epochs: {} (save every {})", config.train.epochs, config.train.save_period);
    info!("  - Monitor: {}", config.train.monitor);
    match config.train.early_stop {
        Some(patience) => info!("  - Early stop after {} non-improving epochs", patience),
        None => info!("  - Early stop: disabled"),
    }
    info!("  - Save dir: {}", config.train.save_dir.display());

    Ok(())
}

fn inspect_checkpoint(path: PathBuf) -> Result<()> {
    let checkpoint = Checkpoint::load(&path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;

    println!("Checkpoint: {}", path.display());
    println!("  Architecture: {}", checkpoint.arch);
    println!("  Epoch: {}", checkpoint.epoch);
    println!("  Monitor: {} (best {})", checkpoint.config.train.monitor, checkpoint.monitor_best);
    println!(
        "  Parameters: {} tensors, {} values",
        checkpoint.state_dict.len(),
        checkpoint.state_dict.parameter_count()
    );
    for (name, tensor) in checkpoint.state_dict.iter() {
        println!("    {} {:?} {}", name, tensor.shape, tensor.dtype);
    }

    let optimizer = &checkpoint.optimizer;
    println!(
        "  Optimizer: {} ({} steps)",
        optimizer.optimizer_type, optimizer.step_count
    );
    if let Some(group) = optimizer.param_groups.first() {
        println!("    lr: {}", group.lr);
    }

    if !checkpoint.classes.is_empty() {
        println!("  Classes: {}", checkpoint.classes.join(", "));
    }
    match &checkpoint.history {
        Some(history) => {
            println!("  History: {} epochs", history.len());
            if let Some(latest) = history.latest() {
                println!("{}", latest);
            }
        }
        None => println!("  History: none"),
    }

    Ok(())
}

fn show_system_info() {
    println!("trainctl - supervised training control loop");
    println!();
    println!("Version: {}", trainctl::VERSION);
    println!("Device: {}", device_name(&select_device()));
    println!();
    println!("Hardware support:");

    #[cfg(feature = "cuda")]
    println!("  CUDA: compiled");
    #[cfg(not(feature = "cuda"))]
    println!("  CUDA: not compiled");

    #[cfg(feature = "metal")]
    println!("  Metal: compiled");
    #[cfg(not(feature = "metal"))]
    println!("  Metal: not compiled");

    #[cfg(feature = "accelerate")]
    println!("  Accelerate: compiled");
    #[cfg(not(feature = "accelerate"))]
    println!("  Accelerate: not compiled");

    println!();
    println!("Usage:");
    println!("  trainctl train -c config.yaml [-r checkpoint.ckpt]");
    println!("  trainctl config -f config.yaml   # Validate configuration");
    println!("  trainctl inspect model_best.ckpt # Show checkpoint contents");
    println!("  trainctl info                    # Show this information");
}
