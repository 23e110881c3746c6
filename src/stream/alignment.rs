//! Metric-vs-metric alignment
//!
//! Aligning a trace against a reference metric replaces its natural x axis
//! with the reference metric's recorded points, matched by ordinal position
//! within the run: point `i` of the trace receives point `i` of the
//! reference series. Step and timestamp play no part.
//!
//! If the reference series is shorter than the trace, only the overlapping
//! prefix is aligned. A trace of the reference metric itself is aligned to
//! its own points.
//!
//! [`stream_aligned_metrics`] is the standalone flavor: it streams only the
//! reference axis for each requested trace.

use super::grouping::SeriesGroup;
use super::{log_outcome, StreamSummary};
use crate::config::StreamConfig;
use crate::encoding::{PathToken, TreeEncoder, ValueNode};
use crate::error::{Result, StreamError};
use crate::types::MetricRow;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

/// The reference metric's `(iteration, value)` points for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentIndex {
    points: Vec<(i64, f64)>,
}

impl AlignmentIndex {
    pub fn new(points: Vec<(i64, f64)>) -> Self {
        Self { points }
    }

    /// Build from reference rows in iteration order.
    pub fn from_rows<'r>(rows: impl IntoIterator<Item = &'r MetricRow>) -> Self {
        Self {
            points: rows
                .into_iter()
                .map(|r| (r.iteration, r.effective_value()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<(i64, f64)> {
        self.points.get(ordinal).copied()
    }
}

/// Source of per-run reference series.
pub trait AlignmentSource {
    fn reference_series(&self, run_id: &str) -> Option<AlignmentIndex>;
}

impl AlignmentSource for HashMap<String, AlignmentIndex> {
    fn reference_series(&self, run_id: &str) -> Option<AlignmentIndex> {
        self.get(run_id).cloned()
    }
}

/// Group reference rows into per-run indexes.
pub fn build_alignment_indexes<I>(rows: I) -> HashMap<String, AlignmentIndex>
where
    I: IntoIterator<Item = MetricRow>,
{
    let mut out: HashMap<String, AlignmentIndex> = HashMap::new();
    for row in rows {
        out.entry(row.run_id.clone())
            .or_default()
            .points
            .push((row.iteration, row.effective_value()));
    }
    out
}

/// Assigns x-axis fields to rows as they stream past.
///
/// Rows must arrive in the engine's order. The reference series is fetched
/// once per run.
pub struct AlignmentResolver<'a> {
    source: &'a dyn AlignmentSource,
    reference_key: String,
    run_id: Option<String>,
    index: Option<AlignmentIndex>,
    series: Option<(String, i64)>,
    ordinal: usize,
}

impl<'a> AlignmentResolver<'a> {
    pub fn new(source: &'a dyn AlignmentSource, reference_key: impl Into<String>) -> Self {
        Self {
            source,
            reference_key: reference_key.into(),
            run_id: None,
            index: None,
            series: None,
            ordinal: 0,
        }
    }

    pub fn reference_key(&self) -> &str {
        &self.reference_key
    }

    /// Forget per-run state before a new stream.
    pub fn reset(&mut self) {
        self.run_id = None;
        self.index = None;
        self.series = None;
        self.ordinal = 0;
    }

    /// Fill `row`'s x-axis fields from the reference series.
    pub fn resolve(&mut self, row: &mut MetricRow) {
        if self.run_id.as_deref() != Some(row.run_id.as_str()) {
            self.index = self.source.reference_series(&row.run_id);
            if self.index.is_none() && !row.is_placeholder() {
                tracing::debug!("No reference series '{}' for run {}", self.reference_key, row.run_id);
            }
            self.run_id = Some(row.run_id.clone());
            self.series = None;
        }

        let same_series = self
            .series
            .as_ref()
            .is_some_and(|(key, ctx)| *key == row.key && *ctx == row.context_id);
        if !same_series {
            self.series = Some((row.key.clone(), row.context_id));
            self.ordinal = 0;
        }

        if row.key == self.reference_key {
            row.x_axis_value = Some(row.value);
            row.x_axis_is_nan = row.is_nan;
            row.x_axis_iter = Some(row.iteration);
        } else {
            match self.index.as_ref().and_then(|idx| idx.get(self.ordinal)) {
                Some((iter, value)) => {
                    row.x_axis_value = Some(value);
                    row.x_axis_is_nan = false;
                    row.x_axis_iter = Some(iter);
                }
                None => {
                    row.x_axis_value = None;
                    row.x_axis_is_nan = false;
                    row.x_axis_iter = None;
                }
            }
        }

        self.ordinal += 1;
    }
}

impl std::fmt::Debug for AlignmentResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentResolver")
            .field("reference_key", &self.reference_key)
            .field("run_id", &self.run_id)
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

/// Stream the reference axis for each requested trace.
///
/// `rows` carry the reference metric's points labelled with the requested
/// trace's key and context, sorted like metric rows. Each run is written as
/// `{run_id: [{name, context, x_axis_values, x_axis_iters}, ...]}` and
/// flushed. Runs without traces are skipped.
pub fn stream_aligned_metrics<I, E, W>(
    rows: I,
    config: &StreamConfig,
    sink: W,
) -> Result<StreamSummary>
where
    I: IntoIterator<Item = std::result::Result<MetricRow, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    W: Write,
{
    let start = Instant::now();
    let mut encoder = TreeEncoder::new(sink);
    let mut summary = StreamSummary::default();
    let result = write_aligned(rows, config.metrics.default_steps, &mut encoder, &mut summary);
    summary.record_encoder(&encoder);
    log_outcome("aligned metrics", start, &summary, result)
}

fn write_aligned<I, E, W>(
    rows: I,
    capacity: usize,
    encoder: &mut TreeEncoder<W>,
    summary: &mut StreamSummary,
) -> Result<()>
where
    I: IntoIterator<Item = std::result::Result<MetricRow, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    W: Write,
{
    let mut run_id: Option<String> = None;
    let mut traces = 0usize;
    let mut group: Option<SeriesGroup> = None;

    for row in rows {
        let row = row.map_err(StreamError::cursor)?;
        summary.rows += 1;

        if group.as_ref().is_some_and(|g| g.matches(&row)) {
            if let Some(g) = group.as_mut() {
                g.push(&row);
            }
            continue;
        }

        if let Some(g) = group.take() {
            flush_axis_group(g, &mut traces, encoder, summary)?;
        }
        if run_id.as_deref() != Some(row.run_id.as_str()) {
            if traces > 0 {
                encoder.flush()?;
            }
            run_id = Some(row.run_id.clone());
            traces = 0;
        }
        if !row.is_placeholder() {
            let mut g = SeriesGroup::start(&row, capacity)?;
            g.push(&row);
            group = Some(g);
        }
    }

    if let Some(g) = group.take() {
        flush_axis_group(g, &mut traces, encoder, summary)?;
    }
    encoder.flush()?;
    Ok(())
}

fn flush_axis_group<W: Write>(
    group: SeriesGroup,
    traces: &mut usize,
    encoder: &mut TreeEncoder<W>,
    summary: &mut StreamSummary,
) -> Result<()> {
    let run = PathToken::name(group.series.run_id.clone());
    if *traces == 0 {
        encoder.write_frame(&[run.clone()], &ValueNode::ArrayMarker)?;
        summary.runs += 1;
    }
    encoder.encode_at(&[run, PathToken::index(*traces)], &group.render_axis())?;
    *traces += 1;
    summary.groups += 1;
    Ok(())
}
