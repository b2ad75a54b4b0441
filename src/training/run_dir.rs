//! Run directory layout: `<save_dir>/<model_type>_<MMDD_HHMMSS>/{checkpoints,logs}`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use crate::error::Result;
use crate::utils::io::ensure_dir_exists;

/// Timestamp format used in run directory names
pub const RUN_TIMESTAMP_FORMAT: &str = "%m%d_%H%M%S";

/// Directories of one training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirs {
    /// `<save_dir>/<model_type>_<timestamp>`
    pub root: PathBuf,

    /// Checkpoints, `config.json` and the copied model definition
    pub checkpoint_dir: PathBuf,

    /// Scalar logs
    pub log_dir: PathBuf,
}

impl RunDirs {
    /// Compute the layout for a run started at `started`
    pub fn layout<Tz: TimeZone>(save_dir: &Path, model_type: &str, started: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let root = save_dir.join(format!(
            "{}_{}",
            model_type,
            started.format(RUN_TIMESTAMP_FORMAT)
        ));
        Self {
            checkpoint_dir: root.join("checkpoints"),
            log_dir: root.join("logs"),
            root,
        }
    }

    /// Create the directories of a run starting now
    pub fn create(save_dir: &Path, model_type: &str) -> Result<Self> {
        let dirs = Self::layout(save_dir, model_type, &Local::now());
        ensure_dir_exists(&dirs.checkpoint_dir)?;
        ensure_dir_exists(&dirs.log_dir)?;
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_layout_naming() {
        let started = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let dirs = RunDirs::layout(Path::new("saved"), "AutoEncoder", &started);

        assert_eq!(dirs.root, PathBuf::from("saved/AutoEncoder_0307_090501"));
        assert_eq!(dirs.checkpoint_dir, dirs.root.join("checkpoints"));
        assert_eq!(dirs.log_dir, dirs.root.join("logs"));
    }

    #[test]
    fn test_create_makes_both_dirs() {
        let dir = TempDir::new().unwrap();
        let dirs = RunDirs::create(dir.path(), "M").unwrap();
        assert!(dirs.checkpoint_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
        assert!(dirs.root.starts_with(dir.path()));
    }
}
