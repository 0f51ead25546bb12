//! Explicit queue and logging configuration.
//!
//! Both structures have working defaults and can be layered from the
//! environment:
//!
//! ```bash
//! export QUEUE_MAX_RETRIES=5
//! export QUEUE_BLOCK_DURATION_MS=60000
//! export LOG_LEVEL=info
//! export LOG_FILE=logs/combined.log
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{QueueError, QueueResult};

/// Configuration for the queue service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Jobs leased more than this many times are no longer leasable and get cleaned up
    pub max_retries: u32,
    /// Lease duration used by `lease_job` and the worker loop
    pub block_duration: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            block_duration: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = block_duration;
        self
    }

    /// Defaults overridden by `QUEUE_MAX_RETRIES` and `QUEUE_BLOCK_DURATION_MS`
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueueResult<Self> {
        let mut config = Self::default();
        if let Some(max_retries) = parse_var(&lookup, "QUEUE_MAX_RETRIES")? {
            config.max_retries = max_retries;
        }
        if let Some(millis) = parse_var::<u64>(&lookup, "QUEUE_BLOCK_DURATION_MS")? {
            config.block_duration = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

/// Configuration handed to the logging collaborator at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `debug` or `dog_topic_queue=info`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Log file; stdout when unset
    pub file: Option<PathBuf>,
    /// Rotate once the file would grow past this many bytes
    pub max_file_size: u64,
    /// Rotated files kept besides the active one
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json: false,
            file: None,
            max_file_size: 50_000_000,
            max_files: 3,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Defaults overridden by `LOG_LEVEL`, `LOG_FORMAT`, `LOG_FILE`,
    /// `LOG_FILE_MAX_SIZE` and `LOG_FILE_MAX_FILES`
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueueResult<Self> {
        let mut config = Self::default();
        if let Some(level) = lookup("LOG_LEVEL").filter(|v| !v.is_empty()) {
            config.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.json = match format.to_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" | "" => false,
                other => {
                    return Err(QueueError::Configuration(format!("LOG_FORMAT: unknown format {}", other)))
                }
            };
        }
        if let Some(file) = lookup("LOG_FILE").filter(|v| !v.is_empty()) {
            config.file = Some(PathBuf::from(file));
        }
        if let Some(size) = parse_var(&lookup, "LOG_FILE_MAX_SIZE")? {
            config.max_file_size = size;
        }
        if let Some(files) = parse_var(&lookup, "LOG_FILE_MAX_FILES")? {
            config.max_files = files;
        }
        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> QueueResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| QueueError::Configuration(format!("{}: {}", key, e))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let queue = QueueConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(queue, QueueConfig::default());

        let log = LogConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.max_file_size, 50_000_000);
        assert_eq!(log.max_files, 3);
        assert!(log.file.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let queue = QueueConfig::from_lookup(lookup(&[
            ("QUEUE_MAX_RETRIES", "7"),
            ("QUEUE_BLOCK_DURATION_MS", "5000"),
        ]))
        .unwrap();
        assert_eq!(queue.max_retries, 7);
        assert_eq!(queue.block_duration, Duration::from_millis(5000));

        let log = LogConfig::from_lookup(lookup(&[
            ("LOG_LEVEL", "warn"),
            ("LOG_FORMAT", "JSON"),
            ("LOG_FILE", "logs/combined.log"),
            ("LOG_FILE_MAX_SIZE", "1024"),
            ("LOG_FILE_MAX_FILES", "5"),
        ]))
        .unwrap();
        assert_eq!(log.level, "warn");
        assert!(log.json);
        assert_eq!(log.file, Some(PathBuf::from("logs/combined.log")));
        assert_eq!(log.max_file_size, 1024);
        assert_eq!(log.max_files, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[("QUEUE_MAX_RETRIES", "lots")])).unwrap_err();
        assert!(matches!(err, QueueError::Configuration(msg) if msg.contains("QUEUE_MAX_RETRIES")));

        let err = LogConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, QueueError::Configuration(_)));
    }
}
