//! Test data builders for creating rows

use trackstream::types::LatestMetric;
use trackstream::{ArtifactRow, MetricRow, RunProps, RunSummary};

/// Builder for metric rows
pub struct MetricRowBuilder {
    row: MetricRow,
}

impl MetricRowBuilder {
    pub fn new(run_id: &str, key: &str) -> Self {
        Self {
            row: MetricRow::new(run_id, key, 0, 0.0),
        }
    }

    pub fn context(mut self, context_id: i64, context_json: &str) -> Self {
        self.row.context_id = context_id;
        self.row.context_json = context_json.to_string();
        self
    }

    pub fn iter(mut self, iteration: i64) -> Self {
        self.row.iteration = iteration;
        self
    }

    pub fn step(mut self, step: i64) -> Self {
        self.row.step = step;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.row.value = value;
        self
    }

    pub fn nan(mut self) -> Self {
        self.row.is_nan = true;
        self
    }

    /// X-axis point already resolved by the query.
    pub fn x_axis(mut self, value: f64, iteration: i64) -> Self {
        self.row.x_axis_value = Some(value);
        self.row.x_axis_iter = Some(iteration);
        self
    }

    pub fn timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.row.timestamp_ms = timestamp_ms;
        self
    }

    pub fn build(self) -> MetricRow {
        self.row
    }
}

/// Builder for run listing entries
pub struct RunSummaryBuilder {
    run: RunSummary,
}

impl RunSummaryBuilder {
    pub fn new(run_id: &str) -> Self {
        Self {
            run: RunSummary {
                run_id: run_id.to_string(),
                props: RunProps::new(run_id),
                ..Default::default()
            },
        }
    }

    pub fn experiment(mut self, name: &str) -> Self {
        self.run.props.experiment.name = name.to_string();
        self
    }

    pub fn times(mut self, creation_ms: i64, end_ms: i64) -> Self {
        self.run.props.creation_time_ms = creation_ms;
        self.run.props.end_time_ms = end_ms;
        self
    }

    pub fn metric(mut self, key: &str, context_json: &str, value: f64, last_iter: i64) -> Self {
        self.run.latest_metrics.push(LatestMetric {
            key: key.to_string(),
            context_json: context_json.to_string(),
            value,
            is_nan: false,
            last_iter,
        });
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.run.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn remaining(mut self, remaining: i64) -> Self {
        self.run.remaining = remaining;
        self
    }

    pub fn build(self) -> RunSummary {
        self.run
    }
}

/// An image row with a predictable blob uri.
pub fn image(run_id: &str, name: &str, step: i64, index: i64) -> ArtifactRow {
    ArtifactRow {
        run_id: run_id.to_string(),
        name: name.to_string(),
        caption: format!("{} caption", name),
        blob_uri: format!("{}/{}/{}/{}", run_id, name, step, index),
        width: 32,
        height: 32,
        format: "png".to_string(),
        iter: step * 10,
        index,
        step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_row_builder() {
        let row = MetricRowBuilder::new("r", "loss")
            .context(3, r#"{"subset":"val"}"#)
            .iter(7)
            .value(0.5)
            .build();

        assert_eq!(row.run_id, "r");
        assert_eq!(row.context_id, 3);
        assert_eq!(row.iteration, 7);
        assert_eq!(row.value, 0.5);
    }
}
