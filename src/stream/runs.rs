//! Run listing streams
//!
//! Runs search writes one subtree per run:
//!
//! ```text
//! {run_id: {props: {...},
//!           traces: {metric: [{name, context, last_value: {...}}, ...]},
//!           params: {<key>: <value>, ..., tags: {<key>: <value>}}}}
//! ```
//!
//! `traces` and `params` can each be excluded. The active-runs flavor always
//! carries traces and never params.

use super::grouping::parse_context;
use super::progress::ProgressReporter;
use super::{log_outcome, StreamSummary};
use crate::encoding::{Tree, TreeEncoder};
use crate::error::Result;
use crate::types::{LatestMetric, RunSummary};
use std::io::Write;
use std::time::Instant;

/// Options for a runs-search stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunsRequest {
    pub exclude_traces: bool,
    pub exclude_params: bool,
    pub report_progress: bool,
    /// Total runs matched by the search, for progress frames
    pub total: i64,
}

fn render_metric(metric: &LatestMetric) -> Result<Tree> {
    Ok(Tree::map()
        .with("name", metric.key.as_str())
        .with("context", parse_context(&metric.key, &metric.context_json)?)
        .with(
            "last_value",
            Tree::map()
                .with("dtype", "float")
                .with("first_step", 0i64)
                .with("last_step", metric.last_iter)
                .with("last", metric.effective_value())
                .with("version", 2i64),
        ))
}

fn render_traces(run: &RunSummary) -> Result<Tree> {
    let metrics = run
        .latest_metrics
        .iter()
        .map(render_metric)
        .collect::<Result<Vec<_>>>()?;
    Ok(Tree::keyed("metric", Tree::array(metrics)))
}

fn render_params(run: &RunSummary) -> Tree {
    let tags = run
        .tags
        .iter()
        .fold(Tree::map(), |acc, (k, v)| acc.with(k.as_str(), v.as_str()));
    run.params
        .iter()
        .fold(Tree::map(), |acc, (k, v)| acc.with(k.as_str(), v.to_tree()))
        .with("tags", tags)
}

fn write_runs<W: Write>(
    runs: &[RunSummary],
    request: &RunsRequest,
    encoder: &mut TreeEncoder<W>,
    progress: &mut ProgressReporter,
    summary: &mut StreamSummary,
) -> Result<()> {
    for run in runs {
        summary.rows += 1;
        let mut body = Tree::keyed("props", run.props.render());
        if !request.exclude_traces {
            body.insert("traces", render_traces(run)?);
        }
        if !request.exclude_params {
            body.insert("params", render_params(run));
        }
        encoder.encode(&Tree::keyed(run.run_id.as_str(), body))?;
        summary.runs += 1;

        progress.report(encoder, run.remaining)?;
        encoder.flush()?;
    }
    progress.finish(encoder)?;
    encoder.flush()?;
    Ok(())
}

fn write_active_runs<W: Write>(
    runs: &[RunSummary],
    encoder: &mut TreeEncoder<W>,
    progress: &mut ProgressReporter,
    summary: &mut StreamSummary,
) -> Result<()> {
    for (i, run) in runs.iter().enumerate() {
        summary.rows += 1;
        let body = Tree::keyed("props", run.props.render()).with("traces", render_traces(run)?);
        encoder.encode(&Tree::keyed(run.run_id.as_str(), body))?;
        summary.runs += 1;

        progress.report_done(encoder, i as i64 + 1)?;
        encoder.flush()?;
    }
    progress.finish(encoder)?;
    encoder.flush()?;
    Ok(())
}

/// Stream a page of runs-search results.
///
/// Each run is followed by a progress frame (when requested) and a flush.
pub fn stream_runs<W: Write>(
    runs: &[RunSummary],
    request: &RunsRequest,
    sink: W,
) -> Result<StreamSummary> {
    let start = Instant::now();
    let mut encoder = TreeEncoder::new(sink);
    let mut progress = ProgressReporter::new(request.report_progress, request.total);
    let mut summary = StreamSummary::default();

    let result = write_runs(runs, request, &mut encoder, &mut progress, &mut summary);
    summary.record_encoder(&encoder);
    log_outcome("runs", start, &summary, result)
}

/// Stream the currently active runs with their latest metrics.
pub fn stream_active_runs<W: Write>(
    runs: &[RunSummary],
    report_progress: bool,
    sink: W,
) -> Result<StreamSummary> {
    let start = Instant::now();
    let mut encoder = TreeEncoder::new(sink);
    let mut progress = ProgressReporter::new(report_progress, runs.len() as i64);
    let mut summary = StreamSummary::default();

    let result = write_active_runs(runs, &mut encoder, &mut progress, &mut summary);
    summary.record_encoder(&encoder);
    log_outcome("active runs", start, &summary, result)
}
