//! Linear regression on synthetic data
//!
//! A small but complete [`TrainEpoch`] implementation: a single linear layer
//! trained with SGD on seeded Gaussian data, reporting `loss` (mean training
//! MSE over the epoch) and `val_loss` (MSE on a held-out split). It is the
//! hook the `trainctl train` command drives, configured through the
//! `regression` section of the configuration file.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder, VarMap, SGD};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrainerConfig;
use crate::error::{Error, Result};
use crate::training::history::EpochResult;
use crate::training::model::{Model, StateDict};
use crate::training::optimizer::CandleOptimizer;
use crate::training::trainer::TrainEpoch;

/// Architecture name written into checkpoints
pub const ARCH: &str = "LinearRegression";

/// Name of the configuration section read by [`RegressionTrainer`]
pub const SECTION: &str = "regression";

/// `regression` configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegressionConfig {
    /// Number of input features
    pub input_dim: usize,

    /// Training samples
    pub train_samples: usize,

    /// Validation samples
    pub val_samples: usize,

    /// Mini-batch size
    pub batch_size: usize,

    /// SGD learning rate
    pub learning_rate: f64,

    /// Standard deviation of the target noise
    pub noise: f64,

    /// Seed for the synthetic data
    pub seed: u64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            input_dim: 4,
            train_samples: 256,
            val_samples: 64,
            batch_size: 32,
            learning_rate: 0.05,
            noise: 0.01,
            seed: 42,
        }
    }
}

impl RegressionConfig {
    /// Validate the section
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::config("regression.input_dim must be greater than 0"));
        }
        if self.train_samples == 0 || self.val_samples == 0 {
            return Err(Error::config("regression sample counts must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("regression.batch_size must be greater than 0"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config("regression.learning_rate must be positive"));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(Error::config("regression.noise must be non-negative"));
        }
        Ok(())
    }
}

/// Single linear layer `y = xW^T + b`
pub struct LinearRegression {
    varmap: VarMap,
    linear: Linear,
}

impl LinearRegression {
    /// Create a model with freshly initialized parameters
    pub fn new(input_dim: usize, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let linear = candle_nn::linear(input_dim, 1, vb.pp("linear"))?;
        Ok(Self { varmap, linear })
    }

    /// Predict targets for a `[n, input_dim]` batch
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(self.linear.forward(xs)?)
    }

    /// Parameter storage
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

impl Model for LinearRegression {
    fn arch(&self) -> &str {
        ARCH
    }

    fn state_dict(&self) -> Result<StateDict> {
        StateDict::from_varmap(&self.varmap)
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.load_into_varmap(&self.varmap)
    }
}

struct Split {
    xs: Tensor,
    ys: Tensor,
    len: usize,
}

/// Epoch hook training [`LinearRegression`] with SGD
pub struct RegressionTrainer {
    config: RegressionConfig,
    model: LinearRegression,
    optimizer: CandleOptimizer<SGD>,
    train: Split,
    val: Split,
}

impl RegressionTrainer {
    /// Build the model, optimizer and data from a `regression` section
    pub fn new(config: RegressionConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let model = LinearRegression::new(config.input_dim, device)?;
        let sgd = <SGD as candle_nn::Optimizer>::new(
            model.varmap().all_vars(),
            config.learning_rate,
        )?;
        let optimizer = CandleOptimizer::new(sgd, "SGD");

        let (train, val) = synthesize(&config, device)?;
        debug!(
            "Synthesized {} training and {} validation samples",
            train.len, val.len
        );

        Ok(Self {
            config,
            model,
            optimizer,
            train,
            val,
        })
    }

    /// Build from the `regression` section of a run configuration
    pub fn from_trainer_config(config: &TrainerConfig, device: &Device) -> Result<Self> {
        Self::new(config.section::<RegressionConfig>(SECTION)?, device)
    }

    /// Section this hook was built from
    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Mean squared error on the validation split
    pub fn validate(&self) -> Result<f64> {
        let predictions = self.model.forward(&self.val.xs)?;
        let loss = candle_nn::loss::mse(&predictions, &self.val.ys)?;
        Ok(loss.to_scalar::<f32>()? as f64)
    }
}

impl TrainEpoch for RegressionTrainer {
    type Model = LinearRegression;
    type Optimizer = CandleOptimizer<SGD>;

    fn train_epoch(&mut self, epoch: usize) -> Result<EpochResult> {
        let mut total = 0.0;
        let mut start = 0;

        while start < self.train.len {
            let len = self.config.batch_size.min(self.train.len - start);
            let xs = self.train.xs.narrow(0, start, len)?;
            let ys = self.train.ys.narrow(0, start, len)?;

            let predictions = self.model.forward(&xs)?;
            let loss = candle_nn::loss::mse(&predictions, &ys)?;
            self.optimizer.backward_step(&loss)?;

            total += loss.to_scalar::<f32>()? as f64 * len as f64;
            start += len;
        }

        let loss = total / self.train.len as f64;
        if !loss.is_finite() {
            return Err(Error::internal(format!(
                "training loss diverged at epoch {}",
                epoch
            )));
        }

        Ok(EpochResult::from([
            ("loss".to_string(), loss),
            ("val_loss".to_string(), self.validate()?),
        ]))
    }

    fn model(&self) -> &LinearRegression {
        &self.model
    }

    fn model_mut(&mut self) -> &mut LinearRegression {
        &mut self.model
    }

    fn optimizer(&self) -> &CandleOptimizer<SGD> {
        &self.optimizer
    }

    fn optimizer_mut(&mut self) -> &mut CandleOptimizer<SGD> {
        &mut self.optimizer
    }
}

/// Draw a hidden linear target and noisy samples from it
fn synthesize(config: &RegressionConfig, device: &Device) -> Result<(Split, Split)> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let standard = normal(1.0)?;
    let noise = normal(config.noise)?;

    let weights: Vec<f32> = (0..config.input_dim)
        .map(|_| standard.sample(&mut rng))
        .collect();
    let bias: f32 = standard.sample(&mut rng);

    let mut split = |len: usize| -> Result<Split> {
        let mut xs = Vec::with_capacity(len * config.input_dim);
        let mut ys = Vec::with_capacity(len);
        for _ in 0..len {
            let row: Vec<f32> = (0..config.input_dim)
                .map(|_| standard.sample(&mut rng))
                .collect();
            let target = row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f32>()
                + bias
                + noise.sample(&mut rng);
            xs.extend(row);
            ys.push(target);
        }
        Ok(Split {
            xs: Tensor::from_vec(xs, (len, config.input_dim), device)?,
            ys: Tensor::from_vec(ys, (len, 1), device)?,
            len,
        })
    };

    let train = split(config.train_samples)?;
    let val = split(config.val_samples)?;
    Ok((train, val))
}

fn normal(std_dev: f64) -> Result<Normal<f32>> {
    Normal::new(0.0, std_dev as f32)
        .map_err(|e| Error::config(format!("invalid noise distribution: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::optimizer::Optimizer;

    fn small_config() -> RegressionConfig {
        RegressionConfig {
            train_samples: 128,
            val_samples: 32,
            ..RegressionConfig::default()
        }
    }

    #[test]
    fn test_loss_decreases() {
        let mut hook = RegressionTrainer::new(small_config(), &Device::Cpu).unwrap();

        let first = hook.train_epoch(1).unwrap();
        let mut last = first.clone();
        for epoch in 2..=40 {
            last = hook.train_epoch(epoch).unwrap();
        }

        assert!(last["loss"] < first["loss"]);
        assert!(last["val_loss"] < 0.01, "val_loss = {}", last["val_loss"]);
        assert_eq!(hook.optimizer().step_count(), 40 * 4);
    }

    #[test]
    fn test_same_seed_same_epoch() {
        let mut a = RegressionTrainer::new(small_config(), &Device::Cpu).unwrap();
        let mut b = RegressionTrainer::new(small_config(), &Device::Cpu).unwrap();
        b.model_mut()
            .load_state_dict(&a.model().state_dict().unwrap())
            .unwrap();

        assert_eq!(a.train_epoch(1).unwrap(), b.train_epoch(1).unwrap());
    }

    #[test]
    fn test_state_dict_names() {
        let model = LinearRegression::new(3, &Device::Cpu).unwrap();
        let state = model.state_dict().unwrap();

        assert_eq!(state.get("linear.weight").unwrap().shape, vec![1, 3]);
        assert_eq!(state.get("linear.bias").unwrap().shape, vec![1]);
        assert_eq!(state.parameter_count(), 4);
    }

    #[test]
    fn test_reports_learning_rate() {
        let hook = RegressionTrainer::new(small_config(), &Device::Cpu).unwrap();
        assert_eq!(hook.optimizer().learning_rate(), Some(0.05));
    }

    #[test]
    fn test_section_defaults_and_validation() {
        let mut config = TrainerConfig::new(ARCH, "saved");
        config
            .extra
            .insert(SECTION.to_string(), serde_json::json!({ "input_dim": 2 }));
        let hook = RegressionTrainer::from_trainer_config(&config, &Device::Cpu).unwrap();
        assert_eq!(hook.config().input_dim, 2);
        assert_eq!(hook.config().batch_size, 32);

        let bad = RegressionConfig {
            batch_size: 0,
            ..RegressionConfig::default()
        };
        assert!(matches!(
            RegressionTrainer::new(bad, &Device::Cpu),
            Err(Error::Config(_))
        ));
    }
}
