//! Per-engine settings
//!
//! Each streaming engine reads one section of [`StreamConfig`](super::StreamConfig).
//! All sections deserialize with defaults for missing fields, so a config
//! file only needs to name what it changes.
//!
//! # Main Types
//!
//! - [`MetricSettings`] - Trace buffer sizing and flush granularity
//! - [`ProgressSettings`] - Whether progress frames are interleaved
//! - [`CsvSettings`] - CSV export chunking and placeholder cell
//! - [`SinkSettings`] - Channel sink chunk size and queue depth
//! - [`LoggingSettings`] - Default tracing filter for the CLI

use serde::{Deserialize, Serialize};

/// Default capacity reserved for each trace's vectors
pub const DEFAULT_STEPS: usize = 50;

/// Default number of CSV records between flushes
pub const DEFAULT_CSV_CHUNK_SIZE: usize = 500;

/// Default byte threshold before the channel sink sends a chunk
pub const DEFAULT_SINK_CHUNK_BYTES: usize = 64 * 1024;

/// Default number of chunks the channel can hold before the writer blocks
pub const DEFAULT_CHANNEL_DEPTH: usize = 16;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,trackstream=debug";

/// When the metric engine flushes the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Flush once a run's traces are complete
    #[default]
    PerRun,
    /// Flush after every trace
    PerGroup,
}

impl std::fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushPolicy::PerRun => write!(f, "per run"),
            FlushPolicy::PerGroup => write!(f, "per group"),
        }
    }
}

/// Metric stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSettings {
    /// Requested point count per trace, echoed in `slice` and used as the
    /// initial vector capacity
    pub default_steps: usize,

    /// Flush granularity
    pub flush: FlushPolicy,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            default_steps: DEFAULT_STEPS,
            flush: FlushPolicy::PerRun,
        }
    }
}

/// Progress frame settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Interleave `progress_<n>` frames
    pub enabled: bool,
}

/// CSV export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    /// Records written between flushes
    pub chunk_size: usize,

    /// Cell written when a run has no value for a column
    pub missing: String,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CSV_CHUNK_SIZE,
            missing: "-".to_string(),
        }
    }
}

/// Channel sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Buffered bytes that trigger a send without an explicit flush
    pub chunk_bytes: usize,

    /// Bounded channel capacity, in chunks
    pub channel_depth: usize,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_SINK_CHUNK_BYTES,
            channel_depth: DEFAULT_CHANNEL_DEPTH,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_settings_default() {
        let settings = MetricSettings::default();
        assert_eq!(settings.default_steps, 50);
        assert_eq!(settings.flush, FlushPolicy::PerRun);
    }

    #[test]
    fn test_flush_policy_serde_names() {
        let json = serde_json::to_string(&FlushPolicy::PerGroup).unwrap();
        assert_eq!(json, "\"per_group\"");
        let parsed: FlushPolicy = serde_json::from_str("\"per_run\"").unwrap();
        assert_eq!(parsed, FlushPolicy::PerRun);
    }

    #[test]
    fn test_partial_csv_section() {
        let settings: CsvSettings = serde_json::from_str(r#"{"chunk_size": 10}"#).unwrap();
        assert_eq!(settings.chunk_size, 10);
        assert_eq!(settings.missing, "-");
    }

    #[test]
    fn test_progress_disabled_by_default() {
        assert!(!ProgressSettings::default().enabled);
    }
}
