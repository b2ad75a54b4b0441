//! Optimizer collaborator trait and optimizer state records
//!
//! The control loop never steps an optimizer itself; it only reads the
//! current learning rate and moves optimizer state in and out of
//! checkpoints. [`CandleOptimizer`] adapts any `candle_nn::Optimizer` to
//! this interface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::training::model::StateDict;

/// An optimizer whose state can be checkpointed
pub trait Optimizer {
    /// Parameter groups; the first group's learning rate is the reported one
    fn param_groups(&self) -> Vec<ParamGroup>;

    /// Current learning rate of the first parameter group
    fn learning_rate(&self) -> Option<f64> {
        self.param_groups().first().map(|group| group.lr)
    }

    /// Snapshot of the optimizer state
    fn state_dict(&self) -> Result<OptimizerStateDict>;

    /// Restore the optimizer state from a snapshot
    fn load_state_dict(&mut self, state: &OptimizerStateDict) -> Result<()>;
}

/// Hyperparameters shared by a group of parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    /// Learning rate
    pub lr: f64,

    /// Other named hyperparameters (momentum, weight decay, ...)
    pub hyperparameters: BTreeMap<String, f64>,
}

impl ParamGroup {
    /// Group with only a learning rate
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            hyperparameters: BTreeMap::new(),
        }
    }
}

/// Optimizer state dictionary for checkpointing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerStateDict {
    /// Optimizer type
    pub optimizer_type: String,

    /// Optimization steps taken so far
    pub step_count: usize,

    /// Parameter groups
    pub param_groups: Vec<ParamGroup>,

    /// Per-parameter buffers (momenta, moving averages)
    pub state: StateDict,
}

/// Adapter exposing a candle optimizer as a checkpointable [`Optimizer`]
///
/// candle optimizers keep their moment buffers private, so only the
/// learning rate and step count survive a checkpoint.
pub struct CandleOptimizer<O> {
    inner: O,
    name: String,
    step_count: usize,
}

impl<O: candle_nn::Optimizer> CandleOptimizer<O> {
    /// Wrap a candle optimizer
    pub fn new(inner: O, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
            step_count: 0,
        }
    }

    /// Compute gradients of `loss` and apply one update
    pub fn backward_step(&mut self, loss: &candle_core::Tensor) -> Result<()> {
        self.inner.backward_step(loss)?;
        self.step_count += 1;
        Ok(())
    }

    /// Set the learning rate
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.inner.set_learning_rate(lr);
    }

    /// Optimization steps taken so far
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Wrapped optimizer
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: candle_nn::Optimizer> Optimizer for CandleOptimizer<O> {
    fn param_groups(&self) -> Vec<ParamGroup> {
        vec![ParamGroup::new(self.inner.learning_rate())]
    }

    fn state_dict(&self) -> Result<OptimizerStateDict> {
        Ok(OptimizerStateDict {
            optimizer_type: self.name.clone(),
            step_count: self.step_count,
            param_groups: self.param_groups(),
            state: StateDict::new(),
        })
    }

    fn load_state_dict(&mut self, state: &OptimizerStateDict) -> Result<()> {
        if state.optimizer_type != self.name {
            return Err(Error::checkpoint(format!(
                "optimizer type mismatch: checkpoint has `{}`, expected `{}`",
                state.optimizer_type, self.name
            )));
        }
        let group = state
            .param_groups
            .first()
            .ok_or_else(|| Error::checkpoint("optimizer state has no parameter groups"))?;

        self.inner.set_learning_rate(group.lr);
        self.step_count = state.step_count;
        Ok(())
    }
}
