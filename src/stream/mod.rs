//! Streaming engines
//!
//! Each engine consumes an already-filtered, already-sorted source and
//! writes the binary tree stream (or CSV) to a caller-supplied sink in a
//! single pass.
//!
//! # Engines
//!
//! - [`MetricStreamer`] - Metric traces grouped per run, optionally aligned
//! - [`stream_aligned_metrics`] - Reference axis for requested traces
//! - [`stream_runs`] / [`stream_active_runs`] - Run listings
//! - [`ArtifactStreamer`] - Image sequences per run
//! - [`write_runs_csv`] - Flattened run listing as CSV
//!
//! # Resource Model
//!
//! Rows are pulled one at a time and writes happen as soon as a group
//! closes, so a slow sink pauses row consumption. Pair an engine with a
//! [`ChannelSink`] to hand the bytes to another thread with bounded
//! buffering. Any error aborts the stream; bytes already written stay
//! written.

pub mod alignment;
pub mod artifacts;
pub mod csv_export;
pub mod grouping;
pub mod metrics;
pub mod progress;
pub mod runs;
pub mod sink;

pub use alignment::{
    build_alignment_indexes, stream_aligned_metrics, AlignmentIndex, AlignmentResolver,
    AlignmentSource,
};
pub use artifacts::{ArtifactRequest, ArtifactStreamer, ArtifactSummary, SequenceSummary};
pub use csv_export::{write_runs_csv, CsvOptions};
pub use grouping::{numeric_block, SeriesGroup, SeriesKey};
pub use metrics::MetricStreamer;
pub use progress::{ProgressReporter, ProgressState};
pub use runs::{stream_active_runs, stream_runs, RunsRequest};
pub use sink::{channel_sink, ChannelSink};

use crate::encoding::TreeEncoder;
use crate::error::Result;
use std::io::Write;
use std::time::Instant;

/// Counters for one completed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Source rows consumed
    pub rows: u64,
    /// Traces (or records) emitted
    pub groups: u64,
    /// Runs emitted
    pub runs: u64,
    pub frames: u64,
    pub bytes: u64,
}

impl StreamSummary {
    pub(crate) fn record_encoder<W: Write>(&mut self, encoder: &TreeEncoder<W>) {
        self.frames = encoder.frames_written();
        self.bytes = encoder.bytes_written();
    }
}

/// Log the end of a stream and pass its result through.
pub(crate) fn log_outcome(
    label: &str,
    start: Instant,
    summary: &StreamSummary,
    result: Result<()>,
) -> Result<StreamSummary> {
    match result {
        Ok(()) => {
            tracing::info!(
                "Streamed {} in {:?}: {} rows, {} groups, {} runs, {} bytes",
                label,
                start.elapsed(),
                summary.rows,
                summary.groups,
                summary.runs,
                summary.bytes
            );
            Ok(*summary)
        }
        Err(e) => {
            tracing::error!(
                "Error streaming {} after {:?} ({} rows): {}",
                label,
                start.elapsed(),
                summary.rows,
                e
            );
            Err(e)
        }
    }
}
