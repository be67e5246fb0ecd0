//! # Config - engine construction settings
//!
//! Everything the engine needs is fixed at open time: where the tables
//! live, how large the memtable may grow before it is flushed, and how many
//! tables may accumulate before a full compaction runs.
//!
//! ```rust
//! use config::EngineConfig;
//!
//! let cfg = EngineConfig::builder()
//!     .dir("data")
//!     .flush_threshold(64 * 1024)
//!     .compaction_trigger(8)
//!     .build()
//!     .unwrap();
//! assert_eq!(cfg.flush_threshold, 64 * 1024);
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Default memtable byte-size threshold that triggers a flush (4 MiB).
pub const DEFAULT_FLUSH_THRESHOLD: usize = 4 * 1024 * 1024;

/// Default number of tables that must be *exceeded* before the engine
/// compacts everything into a single table.
pub const DEFAULT_COMPACTION_TRIGGER: usize = 16;

/// Errors produced while validating an [`EngineConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The base directory path is empty.
    #[error("base directory must not be empty")]
    EmptyDir,

    /// A zero flush threshold would flush after every single write.
    #[error("flush threshold must be greater than zero")]
    ZeroFlushThreshold,
}

/// Settings supplied once when the engine is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding `<generation>.dat` tables and the `MANIFEST`.
    pub dir: PathBuf,

    /// Memtable size (key + value bytes) at which a flush happens.
    pub flush_threshold: usize,

    /// A compaction runs once the table count exceeds this value.
    /// `0` disables automatic compaction.
    pub compaction_trigger: usize,
}

impl EngineConfig {
    /// Config for `dir` with default thresholds.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            compaction_trigger: DEFAULT_COMPACTION_TRIGGER,
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Checks the settings for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDir);
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::ZeroFlushThreshold);
        }
        Ok(())
    }

    /// Whether automatic compaction should run with `table_count` live tables.
    pub fn should_compact(&self, table_count: usize) -> bool {
        self.compaction_trigger > 0 && table_count > self.compaction_trigger
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    dir: Option<PathBuf>,
    flush_threshold: Option<usize>,
    compaction_trigger: Option<usize>,
}

impl ConfigBuilder {
    /// Set the base directory
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Set the flush threshold (in bytes)
    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = Some(bytes);
        self
    }

    /// Set the table count above which compaction runs (0 = never)
    pub fn compaction_trigger(mut self, tables: usize) -> Self {
        self.compaction_trigger = Some(tables);
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::new(self.dir.unwrap_or_default());
        if let Some(bytes) = self.flush_threshold {
            config.flush_threshold = bytes;
        }
        if let Some(tables) = self.compaction_trigger {
            config.compaction_trigger = tables;
        }
        config.validate()?;
        Ok(config)
    }
}
