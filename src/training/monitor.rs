//! Monitored-metric tracking: best value, non-improvement counter, early stop
//!
//! The monitor is configured with a spec of the form `"off"`,
//! `"min <metric>"` or `"max <metric>"`. Each epoch log is fed to
//! [`Monitor::observe`], which compares the metric with the best value seen
//! so far using a strict comparison and reports whether the epoch improved
//! and whether training should stop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::training::history::EpochLog;

/// Parsed monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MonitorSpec {
    /// Monitoring disabled
    #[default]
    Off,
    /// Lower values of the metric are better
    Min(String),
    /// Higher values of the metric are better
    Max(String),
}

/// Comparison mode of an active monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Monitoring disabled
    Off,
    /// Minimize the metric
    Min,
    /// Maximize the metric
    Max,
}

impl MonitorMode {
    /// Starting best value for this mode
    pub fn initial_best(self) -> f64 {
        match self {
            MonitorMode::Off => 0.0,
            MonitorMode::Min => f64::INFINITY,
            MonitorMode::Max => f64::NEG_INFINITY,
        }
    }

    /// Whether `current` strictly improves on `best`
    pub fn is_improvement(self, current: f64, best: f64) -> bool {
        match self {
            MonitorMode::Off => false,
            MonitorMode::Min => current < best,
            MonitorMode::Max => current > best,
        }
    }
}

impl MonitorSpec {
    /// Comparison mode
    pub fn mode(&self) -> MonitorMode {
        match self {
            MonitorSpec::Off => MonitorMode::Off,
            MonitorSpec::Min(_) => MonitorMode::Min,
            MonitorSpec::Max(_) => MonitorMode::Max,
        }
    }

    /// Monitored metric name, if any
    pub fn metric(&self) -> Option<&str> {
        match self {
            MonitorSpec::Off => None,
            MonitorSpec::Min(metric) | MonitorSpec::Max(metric) => Some(metric),
        }
    }
}

impl FromStr for MonitorSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["off"] => Ok(MonitorSpec::Off),
            ["min", metric] => Ok(MonitorSpec::Min(metric.to_string())),
            ["max", metric] => Ok(MonitorSpec::Max(metric.to_string())),
            _ => Err(Error::config(format!(
                "invalid monitor `{}`: expected `off`, `min <metric>` or `max <metric>`",
                s
            ))),
        }
    }
}

impl TryFrom<String> for MonitorSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonitorSpec> for String {
    fn from(spec: MonitorSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for MonitorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorSpec::Off => write!(f, "off"),
            MonitorSpec::Min(metric) => write!(f, "min {}", metric),
            MonitorSpec::Max(metric) => write!(f, "max {}", metric),
        }
    }
}

/// Outcome of observing one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// The epoch set a new best value
    pub improved: bool,
    /// The non-improvement counter exceeded the early-stop threshold
    pub stop: bool,
}

/// Best-so-far tracker with early stopping
#[derive(Debug, Clone)]
pub struct Monitor {
    mode: MonitorMode,
    metric: Option<String>,
    best: f64,
    not_improved_count: usize,
    early_stop: Option<usize>,
}

impl Monitor {
    /// Create a monitor; `early_stop = None` never stops training
    pub fn new(spec: &MonitorSpec, early_stop: Option<usize>) -> Self {
        let mode = spec.mode();
        Self {
            mode,
            metric: spec.metric().map(str::to_string),
            best: mode.initial_best(),
            not_improved_count: 0,
            early_stop,
        }
    }

    /// Feed one epoch log into the monitor
    pub fn observe(&mut self, log: &EpochLog) -> Observation {
        let metric = match (&self.mode, &self.metric) {
            (MonitorMode::Off, _) | (_, None) => {
                return Observation { improved: false, stop: false };
            }
            (_, Some(metric)) => metric,
        };

        let improved = match log.get(metric) {
            Some(current) => self.mode.is_improvement(current, self.best).then_some(current),
            None => {
                warn!(
                    "Metric '{}' is not found. Model performance monitoring is disabled.",
                    metric
                );
                // Counted as a non-improving epoch starting from a fresh counter
                self.mode = MonitorMode::Off;
                self.not_improved_count = 0;
                None
            }
        };

        if let Some(current) = improved {
            self.best = current;
            self.not_improved_count = 0;
        } else {
            self.not_improved_count += 1;
        }
        let improved = improved.is_some();

        let stop = self
            .early_stop
            .map_or(false, |threshold| self.not_improved_count > threshold);

        Observation { improved, stop }
    }

    /// Restore the best value from a checkpoint
    pub fn restore_best(&mut self, best: f64) {
        self.best = best;
    }

    /// Best value seen so far
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Current comparison mode; becomes `Off` once the metric goes missing
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Monitored metric name
    pub fn metric(&self) -> Option<&str> {
        self.metric.as_deref()
    }

    /// Consecutive non-improving epochs
    pub fn not_improved_count(&self) -> usize {
        self.not_improved_count
    }

    /// Early-stop threshold
    pub fn early_stop(&self) -> Option<usize> {
        self.early_stop
    }

    /// Whether monitoring is still active
    pub fn is_active(&self) -> bool {
        self.mode != MonitorMode::Off
    }
}
