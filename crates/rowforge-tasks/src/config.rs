//! Configuration for task management
//!
//! Defines per-task limits and the on-disk layout of the data directory.

use crate::error::TaskError;
use rowforge_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bounds and defaults for per-task settings
///
/// # Examples
///
/// ```
/// use rowforge_tasks::TaskLimits;
///
/// let limits = TaskLimits::default();
/// assert_eq!(limits.default_worker_count, 1);
/// assert!(limits.check(8, 10_000).is_ok());
/// assert!(limits.check(9, 50).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLimits {
    /// Worker count used when a request does not name one
    pub default_worker_count: usize,

    /// Upper bound on concurrent rule executions per batch
    pub max_worker_count: usize,

    /// Checkpoint interval used when a request does not name one
    pub default_checkpoint_interval: usize,

    /// Upper bound on the checkpoint interval (rows)
    pub max_checkpoint_interval: usize,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            default_worker_count: 1,
            max_worker_count: 8,
            default_checkpoint_interval: 50,
            max_checkpoint_interval: 10_000,
        }
    }
}

impl TaskLimits {
    /// Check a worker count and checkpoint interval against the bounds
    pub fn check(&self, worker_count: usize, checkpoint_interval: usize) -> Result<(), TaskError> {
        if worker_count == 0 || worker_count > self.max_worker_count {
            return Err(TaskError::InvalidRequest(format!(
                "worker_count must be between 1 and {}, got {}",
                self.max_worker_count, worker_count
            )));
        }
        if checkpoint_interval == 0 || checkpoint_interval > self.max_checkpoint_interval {
            return Err(TaskError::InvalidRequest(format!(
                "checkpoint_interval must be between 1 and {}, got {}",
                self.max_checkpoint_interval, checkpoint_interval
            )));
        }
        Ok(())
    }

    /// Validate the limits themselves
    pub fn validate(&self) -> Result<(), String> {
        if self.max_worker_count == 0 {
            return Err("max_worker_count must be greater than 0".to_string());
        }
        if self.max_checkpoint_interval == 0 {
            return Err("max_checkpoint_interval must be greater than 0".to_string());
        }
        if self.default_worker_count == 0 || self.default_worker_count > self.max_worker_count {
            return Err("default_worker_count is outside the allowed range".to_string());
        }
        if self.default_checkpoint_interval == 0
            || self.default_checkpoint_interval > self.max_checkpoint_interval
        {
            return Err("default_checkpoint_interval is outside the allowed range".to_string());
        }
        Ok(())
    }
}

/// Configuration for the task service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Root of all durable artifacts
    pub data_dir: PathBuf,

    /// Batch execution settings
    pub engine: EngineConfig,

    /// Per-task bounds
    pub limits: TaskLimits,
}

impl ServiceConfig {
    /// Configuration with defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            engine: EngineConfig::default(),
            limits: TaskLimits::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.engine.validate()?;
        self.limits.validate()
    }
}

/// Directory layout under the data directory
///
/// ```text
/// <data_dir>/imports/       dataset copies
/// <data_dir>/exports/       final outputs and partial exports
/// <data_dir>/checkpoints/   metadata records and snapshots
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Imported dataset copies
    pub fn imports_dir(&self) -> PathBuf {
        self.root.join("imports")
    }

    /// Final outputs and partial exports
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Checkpoint records
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// Create every directory of the layout
    pub fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.imports_dir())?;
        fs::create_dir_all(self.exports_dir())?;
        fs::create_dir_all(self.checkpoints_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        assert!(TaskLimits::default().validate().is_ok());
    }

    #[test]
    fn test_limit_bounds() {
        let limits = TaskLimits::default();
        assert!(limits.check(1, 1).is_ok());
        assert!(limits.check(0, 50).is_err());
        assert!(limits.check(1, 0).is_err());
        assert!(limits.check(1, 10_001).is_err());
    }

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.imports_dir(), PathBuf::from("/data/imports"));
        assert_eq!(layout.exports_dir(), PathBuf::from("/data/exports"));
        assert_eq!(layout.checkpoints_dir(), PathBuf::from("/data/checkpoints"));
    }

    #[test]
    fn test_service_config_rejects_bad_engine() {
        let mut config = ServiceConfig::new("/data");
        config.engine.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
