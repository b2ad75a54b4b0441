//! Epoch log records and the training-history logger

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metric name to scalar value, as produced by an epoch hook
pub type EpochResult = BTreeMap<String, f64>;

/// One epoch's metrics tagged with the epoch number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLog {
    /// Epoch number (1-based)
    pub epoch: usize,

    /// Metrics reported by the epoch hook
    pub metrics: EpochResult,
}

impl EpochLog {
    /// Attach an epoch number to an epoch result
    pub fn new(epoch: usize, metrics: EpochResult) -> Self {
        Self { epoch, metrics }
    }

    /// Look up a value; `"epoch"` resolves to the epoch number
    pub fn get(&self, key: &str) -> Option<f64> {
        match self.metrics.get(key) {
            Some(value) => Some(*value),
            None if key == "epoch" => Some(self.epoch as f64),
            None => None,
        }
    }
}

impl fmt::Display for EpochLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.metrics.keys().map(String::len).max().unwrap_or(0);
        for (name, value) in &self.metrics {
            writeln!(f, "    {:<width$}  {:.6}", name, value, width = width)?;
        }
        Ok(())
    }
}

/// Append-only record of every epoch log, persisted inside checkpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    entries: Vec<EpochLog>,
}

impl TrainingHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an epoch log
    pub fn add_entry(&mut self, entry: EpochLog) {
        self.entries.push(entry);
    }

    /// All recorded entries in insertion order
    pub fn entries(&self) -> &[EpochLog] {
        &self.entries
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&EpochLog> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_lookup() {
        let log = EpochLog::new(4, EpochResult::from([("loss".to_string(), 0.5)]));
        assert_eq!(log.get("loss"), Some(0.5));
        assert_eq!(log.get("epoch"), Some(4.0));
        assert_eq!(log.get("acc"), None);
    }

    #[test]
    fn test_display_excludes_epoch_row() {
        let log = EpochLog::new(
            2,
            EpochResult::from([("loss".to_string(), 0.25), ("val_loss".to_string(), 0.5)]),
        );
        let rendered = log.to_string();
        assert!(rendered.contains("loss"));
        assert!(rendered.contains("0.250000"));
        assert!(!rendered.contains("epoch"));
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn test_history_append() {
        let mut history = TrainingHistory::new();
        assert!(history.is_empty());

        history.add_entry(EpochLog::new(1, EpochResult::new()));
        history.add_entry(EpochLog::new(2, EpochResult::new()));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|e| e.epoch), Some(2));
        assert_eq!(history.entries()[0].epoch, 1);
    }
}
