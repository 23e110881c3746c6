//! Core data types for trackstream
//!
//! This module contains the row and record types consumed by the streaming
//! engines, together with the lookup seam used to fetch pre-rendered run
//! headers.
//!
//! # Main Types
//!
//! - [`MetricRow`] - One stored metric point, as produced by the row cursor
//! - [`RunEntry`] / [`RunLookup`] - Per-run header and remaining-runs counter
//! - [`RunProps`] - Run properties rendered into the `props` subtree
//! - [`RunSummary`] - One run for the runs-search stream and CSV export
//! - [`ArtifactRow`] - One stored image artifact
//!
//! # Ordering Contract
//!
//! Metric rows must arrive sorted by `(run_id, key, context_id)` and by
//! iteration within a group. The engines never re-sort and do not check
//! this; out-of-order input yields fragmented but well-formed output.

use crate::encoding::Tree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ==================== Metric Rows ====================

/// One stored metric point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricRow {
    pub run_id: String,
    /// Metric name. Empty for a run placeholder row with no matching metrics.
    pub key: String,
    /// Deduplicated context id. Groups are keyed by this, never by the JSON.
    pub context_id: i64,
    pub context_json: String,
    pub iteration: i64,
    pub step: i64,
    pub timestamp_ms: i64,
    pub value: f64,
    /// The stored value is NaN; `value` holds a placeholder.
    pub is_nan: bool,
    #[serde(default)]
    pub x_axis_value: Option<f64>,
    #[serde(default)]
    pub x_axis_is_nan: bool,
    #[serde(default)]
    pub x_axis_iter: Option<i64>,
}

impl MetricRow {
    /// Create a row with an empty context
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, iteration: i64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            context_json: "{}".to_string(),
            iteration,
            value,
            ..Default::default()
        }
    }

    /// A row that only announces a run.
    pub fn placeholder(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.key.is_empty()
    }

    /// The value with the NaN flag applied.
    pub fn effective_value(&self) -> f64 {
        if self.is_nan {
            f64::NAN
        } else {
            self.value
        }
    }

    /// The aligned x-axis value with the NaN flag applied.
    pub fn effective_x_axis_value(&self) -> Option<f64> {
        self.x_axis_value
            .map(|v| if self.x_axis_is_nan { f64::NAN } else { v })
    }

    pub fn has_x_axis(&self) -> bool {
        self.x_axis_value.is_some()
    }

    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}

// ==================== Run Lookup ====================

/// Pre-rendered header for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEntry {
    /// Subtree emitted as `{run_id: info}` before the run's traces.
    pub info: Tree,
    /// Runs still to be streamed after this one.
    pub remaining: i64,
}

impl RunEntry {
    pub fn new(info: Tree, remaining: i64) -> Self {
        Self { info, remaining }
    }
}

/// Source of per-run headers, keyed by run id.
#[cfg_attr(test, mockall::automock)]
pub trait RunLookup {
    fn run_entry(&self, run_id: &str) -> Option<RunEntry>;
}

impl RunLookup for HashMap<String, RunEntry> {
    fn run_entry(&self, run_id: &str) -> Option<RunEntry> {
        self.get(run_id).cloned()
    }
}

impl RunLookup for BTreeMap<String, RunEntry> {
    fn run_entry(&self, run_id: &str) -> Option<RunEntry> {
        self.get(run_id).cloned()
    }
}

// ==================== Run Properties ====================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperimentRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artifact_location: String,
}

/// A shared tag attached to a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunTag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Run properties rendered into the `props` subtree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProps {
    pub name: String,
    pub description: Option<String>,
    pub experiment: ExperimentRef,
    pub tags: Vec<RunTag>,
    /// Unix milliseconds
    pub creation_time_ms: i64,
    /// Unix milliseconds
    pub end_time_ms: i64,
    pub archived: bool,
    pub active: bool,
}

impl RunProps {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Render as the `props` subtree. Times become float seconds.
    pub fn render(&self) -> Tree {
        let tags = self.tags.iter().map(|t| {
            Tree::map()
                .with("id", t.id.as_str())
                .with("name", t.name.as_str())
                .with("color", t.color.clone())
        });

        Tree::map()
            .with("name", self.name.as_str())
            .with("description", self.description.clone())
            .with(
                "experiment",
                Tree::map()
                    .with("id", self.experiment.id.as_str())
                    .with("name", self.experiment.name.as_str())
                    .with("artifact_location", self.experiment.artifact_location.as_str()),
            )
            .with("tags", Tree::array(tags))
            .with("creation_time", self.creation_time_ms as f64 / 1000.0)
            .with("end_time", self.end_time_ms as f64 / 1000.0)
            .with("archived", self.archived)
            .with("active", self.active)
    }

    /// Header entry suitable for a [`RunLookup`].
    pub fn into_entry(self, remaining: i64) -> RunEntry {
        RunEntry::new(Tree::keyed("props", self.render()), remaining)
    }
}

// ==================== Run Summaries ====================

/// Last recorded value of one metric series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatestMetric {
    pub key: String,
    pub context_json: String,
    pub value: f64,
    pub is_nan: bool,
    pub last_iter: i64,
}

impl LatestMetric {
    pub fn effective_value(&self) -> f64 {
        if self.is_nan {
            f64::NAN
        } else {
            self.value
        }
    }
}

/// A run parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn to_tree(&self) -> Tree {
        match self {
            ParamValue::Int(v) => Tree::int(*v),
            ParamValue::Float(v) => Tree::float(*v),
            ParamValue::String(v) => Tree::string(v.as_str()),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(v) => f.write_str(v),
        }
    }
}

/// One run as listed by runs search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub run_id: String,
    pub props: RunProps,
    pub latest_metrics: Vec<LatestMetric>,
    pub params: BTreeMap<String, ParamValue>,
    pub tags: BTreeMap<String, String>,
    /// Runs still to be streamed after this one.
    pub remaining: i64,
}

// ==================== Artifacts ====================

/// One stored image artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtifactRow {
    pub run_id: String,
    /// Sequence name the image belongs to.
    pub name: String,
    pub caption: String,
    pub blob_uri: String,
    pub width: i64,
    pub height: i64,
    pub format: String,
    pub iter: i64,
    /// Position of the image within its step.
    pub index: i64,
    pub step: i64,
}

impl ArtifactRow {
    pub fn render(&self) -> Tree {
        Tree::map()
            .with("blob_uri", self.blob_uri.as_str())
            .with("caption", self.caption.as_str())
            .with("height", self.height)
            .with("width", self.width)
            .with("format", self.format.as_str())
            .with("iter", self.iter)
            .with("index", self.index)
            .with("step", self.step)
    }
}
