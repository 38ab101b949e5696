//! Engine configuration
//!
//! Loaded from TOML (see `avsync_common::config` for file discovery). Every
//! field has a built-in default, so an empty or missing file yields a working
//! engine.
//!
//! ```toml
//! [scheduler]
//! video_low_water = 31
//! audio_hw_low_water = 6
//! audio_only_low_water = 24
//! batch_size = 32
//!
//! [pool]
//! soft_cap = 32
//!
//! [worker]
//! interrupt_poll_ms = 2
//! seek_wait_warn_ms = 500
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The scheduler thresholds are empirical; they are exposed here rather than
//! compiled in so they can be tuned per deployment.

use crate::error::{Error, Result};
use avsync_common::config::{load_or_default, ConfigSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Decode scheduling thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Request decode while the video queue holds fewer frames than this
    #[serde(default = "default_video_low_water")]
    pub video_low_water: usize,

    /// Request decode (video streams) while the audio sink holds fewer queued buffers than this
    #[serde(default = "default_audio_hw_low_water")]
    pub audio_hw_low_water: usize,

    /// Request decode (audio-only streams) while the audio sink holds fewer queued buffers than this
    #[serde(default = "default_audio_only_low_water")]
    pub audio_only_low_water: usize,

    /// Frames requested from the decoder backend per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Video frame pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of pooled (recycled) pixel buffers
    #[serde(default = "default_soft_cap")]
    pub soft_cap: usize,
}

/// Decode worker timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Poll interval while waiting for an interrupted decode to return
    #[serde(default = "default_interrupt_poll_ms")]
    pub interrupt_poll_ms: u64,

    /// Log a warning when an interrupted decode takes longer than this to return
    #[serde(default = "default_seek_wait_warn_ms")]
    pub seek_wait_warn_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_video_low_water() -> usize {
    31
}

fn default_audio_hw_low_water() -> usize {
    6
}

fn default_audio_only_low_water() -> usize {
    24
}

fn default_batch_size() -> usize {
    32
}

fn default_soft_cap() -> usize {
    32
}

fn default_interrupt_poll_ms() -> u64 {
    2
}

fn default_seek_wait_warn_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            video_low_water: default_video_low_water(),
            audio_hw_low_water: default_audio_hw_low_water(),
            audio_only_low_water: default_audio_only_low_water(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            soft_cap: default_soft_cap(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interrupt_poll_ms: default_interrupt_poll_ms(),
            seek_wait_warn_ms: default_seek_wait_warn_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WorkerConfig {
    pub fn interrupt_poll(&self) -> Duration {
        Duration::from_millis(self.interrupt_poll_ms)
    }

    pub fn seek_wait_warn(&self) -> Duration {
        Duration::from_millis(self.seek_wait_warn_ms)
    }
}

impl EngineConfig {
    /// Load configuration from the resolved source and validate it
    pub fn load(source: &ConfigSource) -> Result<Self> {
        let config: EngineConfig = load_or_default(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = avsync_common::config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.batch_size == 0 {
            return Err(Error::Config("scheduler.batch_size must be > 0".to_string()));
        }
        if self.pool.soft_cap == 0 {
            return Err(Error::Config("pool.soft_cap must be > 0".to_string()));
        }
        if self.worker.interrupt_poll_ms == 0 {
            return Err(Error::Config("worker.interrupt_poll_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.video_low_water, 31);
        assert_eq!(config.scheduler.audio_hw_low_water, 6);
        assert_eq!(config.scheduler.audio_only_low_water, 24);
        assert_eq!(config.scheduler.batch_size, 32);
        assert_eq!(config.pool.soft_cap, 32);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str("[scheduler]\nbatch_size = 8\n").unwrap();
        assert_eq!(config.scheduler.batch_size, 8);
        assert_eq!(config.scheduler.video_low_water, 31);
        assert_eq!(config.pool.soft_cap, 32);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let result = EngineConfig::from_toml_str("[scheduler]\nbatch_size = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let result = EngineConfig::from_toml_str("[pool]\nsoft_cap = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = EngineConfig::default();
        config.worker.interrupt_poll_ms = 5;
        let text = config.to_toml_string().unwrap();
        let back = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_command_line_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[pool]\nsoft_cap = 12\n\n[logging]\nlevel = \"debug\"\n").unwrap();

        let config = EngineConfig::load(&ConfigSource::CommandLine(path)).unwrap();
        assert_eq!(config.pool.soft_cap, 12);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[scheduler]\nbatch_size = 0\n").unwrap();

        let result = EngineConfig::load(&ConfigSource::CommandLine(path));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
