//! Image artifact streaming
//!
//! Artifact rows arrive sorted by run. All images of one run are collected,
//! thinned to the requested densities and written as one subtree:
//!
//! ```text
//! {run_id: {props: {...},
//!           ranges: {record_range_total, record_range_used,
//!                    index_range_total, index_range_used},
//!           params: {images_per_step},
//!           traces: [{name, context, caption, values: [[image, ...], ...],
//!                     iters: [...]}, ...]}}
//! ```
//!
//! `values` and `iters` are indexed by step. Traces keep the order in which
//! their sequence names were first seen.

use super::progress::ProgressReporter;
use super::{log_outcome, StreamSummary};
use crate::encoding::{Tree, TreeEncoder};
use crate::error::{Result, ResultExt, StreamError};
use crate::types::{ArtifactRow, RunLookup};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::time::Instant;

/// Per-sequence extents, computed upstream over the whole result.
pub trait ArtifactSummary {
    /// Highest image index in any step of the sequence
    fn max_index(&self, run_id: &str, name: &str) -> i64;
    /// Highest step of the sequence
    fn max_step(&self, run_id: &str, name: &str) -> i64;
}

/// In-memory [`ArtifactSummary`].
#[derive(Debug, Clone, Default)]
pub struct SequenceSummary {
    extents: HashMap<(String, String), (i64, i64)>,
}

impl SequenceSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, run_id: &str, name: &str, max_step: i64, max_index: i64) {
        self.extents
            .insert((run_id.to_string(), name.to_string()), (max_step, max_index));
    }

    /// Derive extents from the rows themselves.
    pub fn from_rows<'r>(rows: impl IntoIterator<Item = &'r ArtifactRow>) -> Self {
        let mut out = Self::new();
        for row in rows {
            let entry = out
                .extents
                .entry((row.run_id.clone(), row.name.clone()))
                .or_insert((0, 0));
            entry.0 = entry.0.max(row.step);
            entry.1 = entry.1.max(row.index);
        }
        out
    }

    fn get(&self, run_id: &str, name: &str) -> (i64, i64) {
        self.extents
            .get(&(run_id.to_string(), name.to_string()))
            .copied()
            .unwrap_or((0, 0))
    }
}

impl ArtifactSummary for SequenceSummary {
    fn max_index(&self, run_id: &str, name: &str) -> i64 {
        self.get(run_id, name).1
    }

    fn max_step(&self, run_id: &str, name: &str) -> i64 {
        self.get(run_id, name).0
    }
}

/// Range and density options for an artifact search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactRequest {
    /// Requested step range; defaults to `[0, max_step]`
    pub record_range: Option<(i64, i64)>,
    /// Requested index range; defaults to `[0, max_index]`
    pub index_range: Option<(i64, i64)>,
    /// Steps to keep per trace; `None` keeps all
    pub record_density: Option<usize>,
    /// Images to keep per step; `None` keeps all
    pub index_density: Option<usize>,
    pub report_progress: bool,
}

impl ArtifactRequest {
    /// Highest step that can appear in the output.
    fn last_step(&self, max_step: i64) -> i64 {
        match self.record_range {
            Some((_, max)) => max.min(max_step),
            None => max_step,
        }
    }

    fn record_range_used(&self, max_step: i64) -> [i64; 2] {
        match self.record_range {
            Some((min, max)) => [min, max],
            None => [0, max_step],
        }
    }

    fn index_range_used(&self, max_index: i64) -> [i64; 2] {
        match self.index_range {
            Some((min, max)) => [min, max],
            None => [0, max_index],
        }
    }
}

/// Positions kept when thinning `len` items down to `density`.
///
/// Everything is kept when the density is unset, zero, or at least `len`.
/// Otherwise every `len / density`-th position is kept, starting at 0.
pub fn select_indices(len: usize, density: Option<usize>) -> Vec<usize> {
    match density {
        Some(d) if d > 0 && len > d => {
            let interval = len / d;
            (0..len).filter(|i| i % interval == 0).collect()
        }
        _ => (0..len).collect(),
    }
}

/// One image sequence of the open run.
///
/// Steps are stored sparsely and rendered densely over `0..steps`. Images
/// whose step falls outside that window are dropped.
#[derive(Debug)]
struct ImageTrace {
    name: String,
    caption: String,
    steps: usize,
    images: BTreeMap<usize, (i64, Vec<Tree>)>,
}

impl ImageTrace {
    fn new(row: &ArtifactRow, last_step: i64) -> Self {
        Self {
            name: row.name.clone(),
            caption: row.caption.clone(),
            steps: usize::try_from(last_step).map_or(0, |s| s.saturating_add(1)),
            images: BTreeMap::new(),
        }
    }

    fn add(&mut self, row: &ArtifactRow) {
        let step = match usize::try_from(row.step) {
            Ok(step) if step < self.steps => step,
            _ => {
                tracing::warn!(
                    "Skipping image {} of {} at step {}, outside 0..{}",
                    row.index,
                    row.name,
                    row.step,
                    self.steps
                );
                return;
            }
        };
        let (iter, images) = self.images.entry(step).or_default();
        images.push(row.render());
        *iter = row.iter;
    }

    fn render(&self, request: &ArtifactRequest) -> Tree {
        let steps = select_indices(self.steps, request.record_density);
        let values = steps.iter().map(|s| match self.images.get(s) {
            Some((_, images)) => Tree::array(
                select_indices(images.len(), request.index_density)
                    .into_iter()
                    .map(|i| images[i].clone()),
            ),
            None => Tree::array(Vec::new()),
        });
        let iters = steps
            .iter()
            .map(|s| self.images.get(s).map_or(0, |(iter, _)| *iter));

        Tree::map()
            .with("name", self.name.as_str())
            .with("context", Tree::map())
            .with("caption", self.caption.as_str())
            .with("values", Tree::array(values))
            .with("iters", Tree::int_array(iters))
    }
}

/// The run whose images are being collected.
struct OpenRun {
    id: String,
    header: Tree,
    traces: Vec<ImageTrace>,
    by_name: HashMap<String, usize>,
}

/// Streams image artifacts grouped per run.
pub struct ArtifactStreamer<'a> {
    lookup: &'a dyn RunLookup,
    summary: &'a dyn ArtifactSummary,
    request: ArtifactRequest,
    total_runs: i64,
}

impl<'a> ArtifactStreamer<'a> {
    pub fn new(
        lookup: &'a dyn RunLookup,
        summary: &'a dyn ArtifactSummary,
        request: ArtifactRequest,
    ) -> Self {
        Self {
            lookup,
            summary,
            request,
            total_runs: 0,
        }
    }

    /// Number of runs in the result, for progress frames.
    pub fn with_total_runs(mut self, total_runs: i64) -> Self {
        self.total_runs = total_runs;
        self
    }

    /// Consume `rows` and write the stream to `sink`.
    pub fn stream<I, E, W>(&self, rows: I, sink: W) -> Result<StreamSummary>
    where
        I: IntoIterator<Item = std::result::Result<ArtifactRow, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Write,
    {
        let start = Instant::now();
        let mut encoder = TreeEncoder::new(sink);
        let mut progress = ProgressReporter::new(self.request.report_progress, self.total_runs);
        let mut summary = StreamSummary::default();

        let result = self.write_rows(rows, &mut encoder, &mut progress, &mut summary);
        summary.record_encoder(&encoder);
        log_outcome("artifacts", start, &summary, result)
    }

    fn write_rows<I, E, W>(
        &self,
        rows: I,
        encoder: &mut TreeEncoder<W>,
        progress: &mut ProgressReporter,
        summary: &mut StreamSummary,
    ) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<ArtifactRow, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Write,
    {
        let mut run: Option<OpenRun> = None;

        for row in rows {
            let row = row.map_err(StreamError::cursor)?;
            summary.rows += 1;

            if run.as_ref().map_or(true, |r| r.id != row.run_id) {
                if let Some(open) = run.take() {
                    self.flush_run(open, encoder, progress, summary)?;
                }
                run = Some(self.open_run(&row));
            }

            if let Some(open) = run.as_mut() {
                self.add_image(open, &row);
            }
        }

        if let Some(open) = run.take() {
            self.flush_run(open, encoder, progress, summary)?;
            progress.finish(encoder)?;
            encoder.flush()?;
        }
        Ok(())
    }

    /// Start a run; ranges come from the first image's sequence.
    fn open_run(&self, row: &ArtifactRow) -> OpenRun {
        let max_step = self.summary.max_step(&row.run_id, &row.name);
        let max_index = self.summary.max_index(&row.run_id, &row.name);

        let mut header = match self.lookup.run_entry(&row.run_id) {
            Some(entry) => entry.info,
            None => {
                tracing::warn!("No header for run {}", row.run_id);
                Tree::map()
            }
        };
        header.insert(
            "ranges",
            Tree::map()
                .with("record_range_total", Tree::int_array([0, max_step]))
                .with(
                    "record_range_used",
                    Tree::int_array(self.request.record_range_used(max_step)),
                )
                .with("index_range_total", Tree::int_array([0, max_index]))
                .with(
                    "index_range_used",
                    Tree::int_array(self.request.index_range_used(max_index)),
                ),
        );
        header.insert("params", Tree::keyed("images_per_step", Tree::int(max_index)));

        OpenRun {
            id: row.run_id.clone(),
            header,
            traces: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    fn add_image(&self, run: &mut OpenRun, row: &ArtifactRow) {
        let idx = match run.by_name.get(&row.name) {
            Some(&idx) => idx,
            None => {
                let max_step = self.summary.max_step(&row.run_id, &row.name);
                run.traces.push(ImageTrace::new(row, self.request.last_step(max_step)));
                run.by_name.insert(row.name.clone(), run.traces.len() - 1);
                run.traces.len() - 1
            }
        };
        run.traces[idx].add(row);
    }

    fn flush_run<W: Write>(
        &self,
        run: OpenRun,
        encoder: &mut TreeEncoder<W>,
        progress: &mut ProgressReporter,
        summary: &mut StreamSummary,
    ) -> Result<()> {
        let traces = run.traces.iter().map(|t| t.render(&self.request));
        let mut body = run.header;
        body.insert("traces", Tree::array(traces));

        encoder
            .encode(&Tree::keyed(run.id.as_str(), body))
            .with_context(|| format!("Failed to write images of run {}", run.id))?;
        summary.runs += 1;
        summary.groups += run.traces.len() as u64;

        progress.report_done(encoder, summary.runs as i64)?;
        encoder.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for ArtifactStreamer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStreamer")
            .field("request", &self.request)
            .field("total_runs", &self.total_runs)
            .finish()
    }
}
