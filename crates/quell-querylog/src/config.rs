//! Query log configuration
//!
//! [`QueryLogSettings`] is the loader-facing form: plain serde data as it
//! appears in the service configuration file. [`QueryLogSettings::validate`]
//! turns it into a [`QueryLogConfig`], which is the only form the engine
//! accepts. A config is never mutated in place; replacing it means closing
//! the engine and opening a new one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ignore::IgnoreFilter;

/// Shortest accepted rotation interval
pub const MIN_ROTATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Longest accepted rotation interval
pub const MAX_ROTATION_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Pause after a failed background flush before the next attempt
pub const FLUSH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Configuration rejected at load time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Rotation interval out of range
    #[error("querylog.interval_hours: {hours}h is out of range, must be between 1h and 8760h")]
    InvalidInterval { hours: u64 },

    /// Memory buffer capacity of zero
    #[error("querylog.size_memory: must be positive")]
    InvalidMemorySize,

    /// Retention of zero rotated files
    #[error("querylog.max_rotated_files: must be positive when set")]
    InvalidRetention,

    /// Empty ignored host entry
    #[error("querylog.ignored[{index}]: empty host")]
    EmptyIgnored { index: usize },

    /// Ignored host entry that is not a DNS name
    #[error("querylog.ignored[{index}]: malformed host {host:?}: {reason}")]
    MalformedIgnored {
        index: usize,
        host: String,
        reason: String,
    },

    /// Ignored host entry listed twice
    #[error("querylog.ignored[{index}]: duplicate host {host:?}")]
    DuplicateIgnored { index: usize, host: String },
}

/// Raw query log settings as read from the service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogSettings {
    /// Record queries at all
    pub enabled: bool,
    /// Persist records to segment files
    pub file_enabled: bool,
    /// Rotation interval in hours
    pub interval_hours: u64,
    /// Memory buffer capacity in records
    pub size_memory: usize,
    /// Directory holding segment files
    pub dir: PathBuf,
    /// Hosts that are never recorded
    pub ignored: Vec<String>,
    /// Mask the host part of client addresses before recording
    pub anonymize_client_ip: bool,
    /// Closed segments to keep; `None` keeps all of them
    pub max_rotated_files: Option<usize>,
}

impl Default for QueryLogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file_enabled: true,
            interval_hours: 90 * 24,
            size_memory: 1000,
            dir: PathBuf::from("./data/querylog"),
            ignored: Vec::new(),
            anonymize_client_ip: false,
            max_rotated_files: None,
        }
    }
}

impl QueryLogSettings {
    /// Validate the settings, producing a config the engine can be opened with
    pub fn validate(&self) -> Result<QueryLogConfig, ConfigError> {
        let rotation_interval = Duration::from_secs(self.interval_hours.saturating_mul(60 * 60));
        if !(MIN_ROTATION_INTERVAL..=MAX_ROTATION_INTERVAL).contains(&rotation_interval) {
            return Err(ConfigError::InvalidInterval {
                hours: self.interval_hours,
            });
        }

        if self.size_memory == 0 {
            return Err(ConfigError::InvalidMemorySize);
        }

        if self.max_rotated_files == Some(0) {
            return Err(ConfigError::InvalidRetention);
        }

        let ignored = IgnoreFilter::from_hosts(&self.ignored)?;

        Ok(QueryLogConfig {
            enabled: self.enabled,
            file_enabled: self.file_enabled,
            rotation_interval,
            flush_retry_delay: FLUSH_RETRY_DELAY,
            mem_size: self.size_memory,
            base_dir: self.dir.clone(),
            ignored,
            anonymize_client_ip: self.anonymize_client_ip,
            max_rotated_files: self.max_rotated_files,
        })
    }
}

/// Validated query log configuration
#[derive(Debug, Clone)]
pub struct QueryLogConfig {
    pub(crate) enabled: bool,
    pub(crate) file_enabled: bool,
    pub(crate) rotation_interval: Duration,
    pub(crate) flush_retry_delay: Duration,
    pub(crate) mem_size: usize,
    pub(crate) base_dir: PathBuf,
    pub(crate) ignored: IgnoreFilter,
    pub(crate) anonymize_client_ip: bool,
    pub(crate) max_rotated_files: Option<usize>,
}

impl QueryLogConfig {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn file_enabled(&self) -> bool {
        self.file_enabled
    }

    pub fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn ignored(&self) -> &IgnoreFilter {
        &self.ignored
    }

    pub fn anonymize_client_ip(&self) -> bool {
        self.anonymize_client_ip
    }

    pub fn max_rotated_files(&self) -> Option<usize> {
        self.max_rotated_files
    }

    /// Convert back to the persisted settings form
    pub fn to_settings(&self) -> QueryLogSettings {
        QueryLogSettings {
            enabled: self.enabled,
            file_enabled: self.file_enabled,
            interval_hours: self.rotation_interval.as_secs() / (60 * 60),
            size_memory: self.mem_size,
            dir: self.base_dir.clone(),
            ignored: self.ignored.hosts(),
            anonymize_client_ip: self.anonymize_client_ip,
            max_rotated_files: self.max_rotated_files,
        }
    }

    /// Config for unit tests, bypassing the interval lower bound
    #[cfg(test)]
    pub(crate) fn for_test(dir: &Path, file_enabled: bool, mem_size: usize) -> Self {
        Self {
            enabled: true,
            file_enabled,
            rotation_interval: Duration::from_secs(24 * 60 * 60),
            flush_retry_delay: FLUSH_RETRY_DELAY,
            mem_size,
            base_dir: dir.to_path_buf(),
            ignored: IgnoreFilter::default(),
            anonymize_client_ip: false,
            max_rotated_files: None,
        }
    }
}
