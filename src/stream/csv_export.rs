//! CSV export of run listings
//!
//! One header row, then one row per run:
//!
//! ```text
//! run,experiment,experiment_description,date,duration,<metric> <context>...,params[<k>]...,tags[<k>]...
//! ```
//!
//! Metric, param and tag columns are each sorted. A run with no value for a
//! column gets the configured placeholder (`-` by default).

use crate::config::CsvSettings;
use crate::error::Result;
use crate::types::RunSummary;
use chrono::DateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::time::Instant;

/// Format of the `date` column
pub const DATE_FORMAT: &str = "%H:%M:%S %Y-%m-%d";

/// Column selection for an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvOptions {
    pub exclude_traces: bool,
    pub exclude_params: bool,
}

/// Column key for one metric series.
fn metric_column(key: &str, context_json: &str) -> String {
    format!("{} {}", key, context_json)
}

fn format_date(start_ms: i64) -> String {
    DateTime::from_timestamp(start_ms.div_euclid(1000), 0)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Write `runs` as CSV, flushing every `settings.chunk_size` records.
///
/// Returns the number of data records written.
pub fn write_runs_csv<W: Write>(
    runs: &[RunSummary],
    options: &CsvOptions,
    settings: &CsvSettings,
    sink: W,
) -> Result<u64> {
    let start = Instant::now();
    let result = write_records(runs, options, settings, sink);
    match &result {
        Ok(records) => tracing::info!("Exported {} runs as CSV in {:?}", records, start.elapsed()),
        Err(e) => tracing::error!("Error exporting runs after {:?}: {}", start.elapsed(), e),
    }
    result
}

fn write_records<W: Write>(
    runs: &[RunSummary],
    options: &CsvOptions,
    settings: &CsvSettings,
    sink: W,
) -> Result<u64> {
    let mut metric_keys = BTreeSet::new();
    let mut param_keys = BTreeSet::new();
    let mut tag_keys = BTreeSet::new();
    let mut metric_values: Vec<BTreeMap<String, f64>> = Vec::with_capacity(runs.len());

    for run in runs {
        let mut values = BTreeMap::new();
        if !options.exclude_traces {
            for m in &run.latest_metrics {
                let column = metric_column(&m.key, &m.context_json);
                metric_keys.insert(column.clone());
                values.insert(column, m.effective_value());
            }
        }
        if !options.exclude_params {
            param_keys.extend(run.params.keys().cloned());
            tag_keys.extend(run.tags.keys().cloned());
        }
        metric_values.push(values);
    }

    let mut writer = csv::Writer::from_writer(sink);

    let mut header: Vec<String> = ["run", "experiment", "experiment_description", "date", "duration"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(metric_keys.iter().cloned());
    header.extend(param_keys.iter().map(|k| format!("params[{}]", k)));
    header.extend(tag_keys.iter().map(|k| format!("tags[{}]", k)));
    writer.write_record(&header)?;

    let chunk_size = settings.chunk_size.max(1);
    let missing = settings.missing.as_str();
    let mut written = 0u64;

    for (run, values) in runs.iter().zip(&metric_values) {
        let props = &run.props;
        let mut record = vec![
            props.name.clone(),
            props.experiment.name.clone(),
            missing.to_string(),
            format_date(props.creation_time_ms),
            format!("{}ms", props.end_time_ms - props.creation_time_ms),
        ];

        record.extend(metric_keys.iter().map(|k| match values.get(k) {
            Some(v) => format!("{:.6}", v),
            None => missing.to_string(),
        }));
        record.extend(param_keys.iter().map(|k| match run.params.get(k) {
            Some(v) => v.to_string(),
            None => missing.to_string(),
        }));
        record.extend(tag_keys.iter().map(|k| {
            run.tags
                .get(k)
                .cloned()
                .unwrap_or_else(|| missing.to_string())
        }));

        writer.write_record(&record)?;
        written += 1;

        if written % chunk_size as u64 == 0 {
            writer.flush()?;
        }
    }

    writer.into_inner().map_err(|e| e.into_error())?;
    Ok(written)
}
