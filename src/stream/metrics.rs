//! Metric trace streaming
//!
//! [`MetricStreamer`] turns sorted metric rows into per-run trace trees:
//!
//! ```text
//! {run_id: <header from the run lookup>}
//! {run_id: {traces: [{name, context, slice, values, iters, epochs,
//!                     timestamps, x_axis_values, x_axis_iters}, ...]}}
//! {progress_<n>: [remaining, total]}
//! ```
//!
//! The header is written when a run's first row arrives. Trace `i` is
//! written under `run_id.traces.i` as soon as its group closes; the
//! `traces` array marker goes out with the first trace, so a run that only
//! has placeholder rows gets a header and nothing else.

use super::alignment::AlignmentResolver;
use super::grouping::SeriesGroup;
use super::progress::ProgressReporter;
use super::{log_outcome, StreamSummary};
use crate::config::{FlushPolicy, StreamConfig};
use crate::encoding::{PathToken, Tree, TreeEncoder, ValueNode};
use crate::error::{Result, ResultExt, StreamError};
use crate::types::{MetricRow, RunLookup};
use std::io::Write;
use std::time::Instant;

/// The run whose traces are currently being written.
struct OpenRun {
    id: String,
    remaining: Option<i64>,
    traces: usize,
}

/// Streams metric rows as per-run trace trees.
pub struct MetricStreamer<'a> {
    lookup: &'a dyn RunLookup,
    resolver: Option<AlignmentResolver<'a>>,
    x_axis_from_rows: bool,
    steps: usize,
    flush: FlushPolicy,
    report_progress: bool,
    total_runs: i64,
}

impl<'a> MetricStreamer<'a> {
    pub fn new(lookup: &'a dyn RunLookup, config: &StreamConfig) -> Self {
        Self {
            lookup,
            resolver: None,
            x_axis_from_rows: false,
            steps: config.metrics.default_steps,
            flush: config.metrics.flush,
            report_progress: config.progress.enabled,
            total_runs: 0,
        }
    }

    /// Align every trace against a reference metric.
    pub fn with_alignment(mut self, resolver: AlignmentResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Keep the x-axis fields the cursor already filled in.
    ///
    /// Without a resolver those fields are otherwise rendered as null. A
    /// resolver, when set, still takes precedence.
    pub fn with_x_axis(mut self, from_rows: bool) -> Self {
        self.x_axis_from_rows = from_rows;
        self
    }

    /// Requested points per trace, echoed in `slice`.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Enable or disable progress frames for this request.
    pub fn with_progress(mut self, enabled: bool, total_runs: i64) -> Self {
        self.report_progress = enabled;
        self.total_runs = total_runs;
        self
    }

    pub fn with_flush_policy(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    pub fn is_aligned(&self) -> bool {
        self.resolver.is_some() || self.x_axis_from_rows
    }

    /// Consume `rows` and write the stream to `sink`.
    ///
    /// The cursor is dropped before returning on every path. A cursor error
    /// aborts the stream with [`StreamError::Cursor`].
    pub fn stream<I, E, W>(&mut self, rows: I, sink: W) -> Result<StreamSummary>
    where
        I: IntoIterator<Item = std::result::Result<MetricRow, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Write,
    {
        let start = Instant::now();
        tracing::debug!(
            "Streaming metrics (aligned: {}, flush {}, progress: {})",
            self.is_aligned(),
            self.flush,
            self.report_progress
        );

        if let Some(resolver) = self.resolver.as_mut() {
            resolver.reset();
        }

        let mut encoder = TreeEncoder::new(sink);
        let mut progress = ProgressReporter::new(self.report_progress, self.total_runs);
        let mut summary = StreamSummary::default();

        let result = self.write_rows(rows, &mut encoder, &mut progress, &mut summary);
        summary.record_encoder(&encoder);
        log_outcome("metrics", start, &summary, result)
    }

    fn write_rows<I, E, W>(
        &mut self,
        rows: I,
        encoder: &mut TreeEncoder<W>,
        progress: &mut ProgressReporter,
        summary: &mut StreamSummary,
    ) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<MetricRow, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Write,
    {
        let mut run: Option<OpenRun> = None;
        let mut group: Option<SeriesGroup> = None;

        for row in rows {
            let mut row = row.map_err(StreamError::cursor)?;
            summary.rows += 1;

            if let Some(resolver) = self.resolver.as_mut() {
                resolver.resolve(&mut row);
            }

            if let Some(g) = group.as_mut().filter(|g| g.matches(&row)) {
                g.push(&row);
                continue;
            }

            if let Some(g) = group.take() {
                if let Some(open) = run.as_mut() {
                    self.write_group(g, open, encoder, summary)?;
                }
            }

            if run.as_ref().map_or(true, |r| r.id != row.run_id) {
                if let Some(open) = run.take() {
                    self.finish_run(open, encoder, progress)?;
                }
                run = Some(self.start_run(&row.run_id, encoder)?);
                summary.runs += 1;
            }

            if !row.is_placeholder() {
                let mut g = SeriesGroup::start(&row, self.steps)?;
                g.push(&row);
                group = Some(g);
            }
        }

        if let Some(g) = group.take() {
            if let Some(open) = run.as_mut() {
                self.write_group(g, open, encoder, summary)?;
            }
        }
        if let Some(open) = run.take() {
            self.finish_run(open, encoder, progress)?;
        }

        progress.finish(encoder)?;
        encoder.flush()?;
        Ok(())
    }

    fn start_run<W: Write>(&self, run_id: &str, encoder: &mut TreeEncoder<W>) -> Result<OpenRun> {
        let (info, remaining) = match self.lookup.run_entry(run_id) {
            Some(entry) => (entry.info, Some(entry.remaining)),
            None => {
                tracing::warn!("No header for run {}, sending an empty one", run_id);
                (Tree::map(), None)
            }
        };

        encoder
            .encode_at(&[PathToken::name(run_id)], &info)
            .with_context(|| format!("Failed to write header of run {:?}", run_id))?;

        Ok(OpenRun {
            id: run_id.to_string(),
            remaining,
            traces: 0,
        })
    }

    fn write_group<W: Write>(
        &self,
        group: SeriesGroup,
        run: &mut OpenRun,
        encoder: &mut TreeEncoder<W>,
        summary: &mut StreamSummary,
    ) -> Result<()> {
        let run_token = PathToken::name(run.id.as_str());
        let traces_token = PathToken::name("traces");

        if run.traces == 0 {
            encoder.write_frame(&[run_token.clone(), traces_token.clone()], &ValueNode::ArrayMarker)?;
        }
        encoder.encode_at(
            &[run_token, traces_token, PathToken::index(run.traces)],
            &group.render(self.steps, self.is_aligned()),
        )?;

        run.traces += 1;
        summary.groups += 1;

        if self.flush == FlushPolicy::PerGroup {
            encoder.flush()?;
        }
        Ok(())
    }

    fn finish_run<W: Write>(
        &self,
        run: OpenRun,
        encoder: &mut TreeEncoder<W>,
        progress: &mut ProgressReporter,
    ) -> Result<()> {
        tracing::trace!("Finished run {} with {} traces", run.id, run.traces);
        let remaining = run.remaining.unwrap_or_else(|| progress.last_remaining());
        progress.report(encoder, remaining)?;
        encoder.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for MetricStreamer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricStreamer")
            .field("resolver", &self.resolver)
            .field("x_axis_from_rows", &self.x_axis_from_rows)
            .field("steps", &self.steps)
            .field("flush", &self.flush)
            .field("report_progress", &self.report_progress)
            .field("total_runs", &self.total_runs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{decode_slice, read_frames, CodecError};
    use crate::types::{MockRunLookup, RunEntry};
    use std::convert::Infallible;
    use std::io;

    fn rows(rows: Vec<MetricRow>) -> Vec<std::result::Result<MetricRow, Infallible>> {
        rows.into_iter().map(Ok).collect()
    }

    fn lookup_with(runs: &'static [(&'static str, i64)]) -> MockRunLookup {
        let mut lookup = MockRunLookup::new();
        lookup.expect_run_entry().returning(move |id| {
            runs.iter().find(|(r, _)| *r == id).map(|(r, remaining)| {
                RunEntry::new(Tree::keyed("props", Tree::map().with("name", *r)), *remaining)
            })
        });
        lookup
    }

    #[test]
    fn test_header_written_once_per_run() {
        let mut lookup = MockRunLookup::new();
        lookup
            .expect_run_entry()
            .withf(|id| id == "a")
            .times(1)
            .returning(|_| Some(RunEntry::new(Tree::map().with("props", Tree::map()), 0)));

        let config = StreamConfig::default();
        let mut out = Vec::new();
        MetricStreamer::new(&lookup, &config)
            .stream(
                rows(vec![
                    MetricRow::new("a", "loss", 0, 1.0),
                    MetricRow::new("a", "loss", 1, 0.5),
                    MetricRow::new("a", "acc", 0, 0.1),
                ]),
                &mut out,
            )
            .unwrap();

        let decoded = decode_slice(&out).unwrap();
        assert_eq!(decoded.table["a.props"], ValueNode::ObjectMarker);
        assert_eq!(decoded.table["a.traces.1.name"], ValueNode::String("acc".into()));
    }

    #[test]
    fn test_placeholder_run_has_no_traces() {
        let lookup = lookup_with(&[("a", 1), ("b", 0)]);
        let config = StreamConfig::default();
        let mut out = Vec::new();
        let summary = MetricStreamer::new(&lookup, &config)
            .stream(
                rows(vec![MetricRow::placeholder("a"), MetricRow::new("b", "loss", 0, 1.0)]),
                &mut out,
            )
            .unwrap();

        let decoded = decode_slice(&out).unwrap();
        assert_eq!(decoded.table["a.props.name"], ValueNode::String("a".into()));
        assert!(!decoded.table.keys().any(|k| k.starts_with("a.traces")));
        assert!(decoded.table.contains_key("b.traces.0.values"));
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.groups, 1);
    }

    #[test]
    fn test_missing_header_is_empty_object() {
        let lookup = lookup_with(&[]);
        let config = StreamConfig::default();
        let mut out = Vec::new();
        MetricStreamer::new(&lookup, &config)
            .stream(rows(vec![MetricRow::new("x", "loss", 0, 1.0)]), &mut out)
            .unwrap();

        let frames = read_frames(&out).unwrap();
        assert_eq!(frames[0].path, vec![PathToken::name("x")]);
        assert_eq!(frames[0].value, ValueNode::ObjectMarker);
    }

    #[test]
    fn test_progress_frames_follow_runs() {
        let lookup = lookup_with(&[("a", 1), ("b", 0)]);
        let config = StreamConfig::default();
        let mut out = Vec::new();
        MetricStreamer::new(&lookup, &config)
            .with_progress(true, 2)
            .stream(
                rows(vec![MetricRow::new("a", "loss", 0, 1.0), MetricRow::new("b", "loss", 0, 2.0)]),
                &mut out,
            )
            .unwrap();

        let roots: Vec<_> = read_frames(&out)
            .unwrap()
            .iter()
            .map(|f| f.root_key())
            .fold(Vec::new(), |mut acc, k| {
                if acc.last() != Some(&k) {
                    acc.push(k);
                }
                acc
            });
        assert_eq!(roots, vec!["a", "progress_0", "b", "progress_1", "progress_2"]);

        let decoded = decode_slice(&out).unwrap();
        assert_eq!(decoded.table["progress_0.0"], ValueNode::Int64(1));
        assert_eq!(decoded.table["progress_2.0"], ValueNode::Int64(0));
        assert_eq!(decoded.table["progress_2.1"], ValueNode::Int64(2));
    }

    #[test]
    fn test_cursor_error_aborts() {
        let lookup = lookup_with(&[("a", 0)]);
        let config = StreamConfig::default();
        let source: Vec<std::result::Result<MetricRow, io::Error>> = vec![
            Ok(MetricRow::new("a", "loss", 0, 1.0)),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "db gone")),
            Ok(MetricRow::new("a", "loss", 1, 2.0)),
        ];

        let mut out = Vec::new();
        let err = MetricStreamer::new(&lookup, &config)
            .stream(source, &mut out)
            .unwrap_err();
        assert!(matches!(err, StreamError::Cursor(_)));
        assert!(err.to_string().contains("db gone"));
        // the header was already written before the failure
        assert!(!out.is_empty());
    }

    #[test]
    fn test_header_error_names_run() {
        let lookup = lookup_with(&[]);
        let config = StreamConfig::default();

        let err = MetricStreamer::new(&lookup, &config)
            .stream(rows(vec![MetricRow::new("", "loss", 0, 1.0)]), Vec::new())
            .unwrap_err();
        assert!(err.to_string().starts_with(r#"Failed to write header of run """#));
        match err {
            StreamError::WithContext { source, .. } => assert!(matches!(
                *source,
                StreamError::Codec(CodecError::EmptyPathName { depth: 0 })
            )),
            other => panic!("expected context, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_context_is_fatal() {
        let lookup = lookup_with(&[("a", 0)]);
        let config = StreamConfig::default();
        let mut row = MetricRow::new("a", "loss", 0, 1.0);
        row.context_json = "{not json".to_string();

        let err = MetricStreamer::new(&lookup, &config)
            .stream(rows(vec![row]), Vec::new())
            .unwrap_err();
        assert!(matches!(err, StreamError::Context { .. }));
    }

    #[test]
    fn test_x_axis_from_rows() {
        let lookup = lookup_with(&[("a", 0)]);
        let config = StreamConfig::default();
        let input = || {
            let mut points = vec![MetricRow::new("a", "loss", 0, 1.0), MetricRow::new("a", "loss", 1, 2.0)];
            for (i, row) in points.iter_mut().enumerate() {
                row.x_axis_value = Some(10.0 * (i + 1) as f64);
                row.x_axis_iter = Some(i as i64 + 100);
            }
            rows(points)
        };

        let mut out = Vec::new();
        MetricStreamer::new(&lookup, &config)
            .with_x_axis(true)
            .stream(input(), &mut out)
            .unwrap();
        let decoded = decode_slice(&out).unwrap();
        assert_eq!(
            decoded.table["a.traces.0.x_axis_values"],
            ValueNode::NumericBlock(vec![10.0, 20.0])
        );
        assert_eq!(
            decoded.table["a.traces.0.x_axis_iters"],
            ValueNode::NumericBlock(vec![100.0, 101.0])
        );

        let mut out = Vec::new();
        MetricStreamer::new(&lookup, &config)
            .stream(input(), &mut out)
            .unwrap();
        let decoded = decode_slice(&out).unwrap();
        assert_eq!(decoded.table["a.traces.0.x_axis_values"], ValueNode::Null);
    }

    #[test]
    fn test_per_group_flush() {
        struct CountingSink {
            flushes: usize,
        }
        impl Write for CountingSink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                self.flushes += 1;
                Ok(())
            }
        }

        let lookup = lookup_with(&[("a", 0)]);
        let config = StreamConfig::default();
        let input = || {
            rows(vec![
                MetricRow::new("a", "acc", 0, 1.0),
                MetricRow::new("a", "loss", 0, 1.0),
                MetricRow::new("a", "lr", 0, 1.0),
            ])
        };

        let mut per_run = CountingSink { flushes: 0 };
        MetricStreamer::new(&lookup, &config)
            .stream(input(), &mut per_run)
            .unwrap();

        let mut per_group = CountingSink { flushes: 0 };
        MetricStreamer::new(&lookup, &config)
            .with_flush_policy(FlushPolicy::PerGroup)
            .stream(input(), &mut per_group)
            .unwrap();

        assert_eq!(per_group.flushes, per_run.flushes + 3);
    }
}
