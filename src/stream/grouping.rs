//! Series accumulation
//!
//! A [`SeriesGroup`] collects the points of one `(run, metric, context)`
//! series between two group boundaries. It is rendered into a trace subtree
//! once the boundary is seen and then dropped, so at most one group is alive
//! at a time.

use crate::encoding::Tree;
use crate::error::{Result, StreamError};
use crate::types::MetricRow;

/// Identity of a metric series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub run_id: String,
    pub key: String,
    pub context_id: i64,
}

impl SeriesKey {
    pub fn of(row: &MetricRow) -> Self {
        Self {
            run_id: row.run_id.clone(),
            key: row.key.clone(),
            context_id: row.context_id,
        }
    }

    /// Whether `row` belongs to this series.
    pub fn matches(&self, row: &MetricRow) -> bool {
        self.context_id == row.context_id && self.key == row.key && self.run_id == row.run_id
    }
}

/// Pack floats as a numeric block.
///
/// `±f64::MAX` is how storage records infinities, so it is mapped back to
/// `±inf` here.
pub fn numeric_block(values: &[f64]) -> Tree {
    Tree::numeric(
        values
            .iter()
            .map(|&v| {
                if v == f64::MAX {
                    f64::INFINITY
                } else if v == -f64::MAX {
                    f64::NEG_INFINITY
                } else {
                    v
                }
            })
            .collect(),
    )
}

/// Parse a context blob into a tree. An empty blob is an empty map.
pub fn parse_context(key: &str, context_json: &str) -> Result<Tree> {
    if context_json.trim().is_empty() {
        return Ok(Tree::map());
    }
    let value: serde_json::Value =
        serde_json::from_str(context_json).map_err(|source| StreamError::Context {
            key: key.to_string(),
            source,
        })?;
    Ok(match value {
        serde_json::Value::Null => Tree::map(),
        other => Tree::from(other),
    })
}

/// Points of one series, in arrival order.
#[derive(Debug, Clone)]
pub struct SeriesGroup {
    pub series: SeriesKey,
    pub context: Tree,
    pub values: Vec<f64>,
    pub iters: Vec<f64>,
    pub epochs: Vec<f64>,
    pub timestamps: Vec<f64>,
    pub x_axis_values: Vec<f64>,
    pub x_axis_iters: Vec<f64>,
}

impl SeriesGroup {
    /// Open a group for the series of `row`. The context is parsed here,
    /// once per group.
    pub fn start(row: &MetricRow, capacity: usize) -> Result<Self> {
        Ok(Self {
            series: SeriesKey::of(row),
            context: parse_context(&row.key, &row.context_json)?,
            values: Vec::with_capacity(capacity),
            iters: Vec::with_capacity(capacity),
            epochs: Vec::with_capacity(capacity),
            timestamps: Vec::with_capacity(capacity),
            x_axis_values: Vec::new(),
            x_axis_iters: Vec::new(),
        })
    }

    pub fn matches(&self, row: &MetricRow) -> bool {
        self.series.matches(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, row: &MetricRow) {
        self.values.push(row.effective_value());
        self.iters.push(row.iteration as f64);
        self.epochs.push(row.step as f64);
        self.timestamps.push(row.timestamp_secs());

        if let Some(x) = row.effective_x_axis_value() {
            self.x_axis_values.push(x);
            self.x_axis_iters
                .push(row.x_axis_iter.unwrap_or(row.iteration) as f64);
        }
    }

    /// Render the trace subtree.
    ///
    /// `steps` is echoed in `slice`. Without alignment the x-axis fields are
    /// null.
    pub fn render(&self, steps: usize, aligned: bool) -> Tree {
        let (x_values, x_iters) = if aligned {
            (
                numeric_block(&self.x_axis_values),
                numeric_block(&self.x_axis_iters),
            )
        } else {
            (Tree::null(), Tree::null())
        };

        Tree::map()
            .with("name", self.series.key.as_str())
            .with("context", self.context.clone())
            .with("slice", Tree::int_array([0, 0, steps as i64]))
            .with("values", numeric_block(&self.values))
            .with("iters", numeric_block(&self.iters))
            .with("epochs", numeric_block(&self.epochs))
            .with("timestamps", numeric_block(&self.timestamps))
            .with("x_axis_values", x_values)
            .with("x_axis_iters", x_iters)
    }

    /// Render as an aligned-metrics entry: only the reference axis.
    pub fn render_axis(&self) -> Tree {
        Tree::map()
            .with("name", self.series.key.as_str())
            .with("context", self.context.clone())
            .with("x_axis_values", numeric_block(&self.values))
            .with("x_axis_iters", numeric_block(&self.iters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(run: &str, key: &str, ctx: i64, iter: i64, value: f64) -> MetricRow {
        MetricRow {
            context_id: ctx,
            step: iter * 10,
            timestamp_ms: 1_000 + iter,
            ..MetricRow::new(run, key, iter, value)
        }
    }

    #[test]
    fn test_series_key_matching() {
        let key = SeriesKey::of(&row("a", "loss", 1, 0, 0.0));
        assert!(key.matches(&row("a", "loss", 1, 5, 1.0)));
        assert!(!key.matches(&row("a", "loss", 2, 0, 0.0)));
        assert!(!key.matches(&row("b", "loss", 1, 0, 0.0)));
    }

    #[test]
    fn test_numeric_block_maps_extremes() {
        let tree = numeric_block(&[f64::MAX, -f64::MAX, 1.0]);
        let block = tree.as_leaf().and_then(|v| v.as_block()).unwrap();
        assert_eq!(block, &[f64::INFINITY, f64::NEG_INFINITY, 1.0]);
    }

    #[test]
    fn test_parse_context() {
        assert_eq!(parse_context("k", "").unwrap(), Tree::map());
        assert_eq!(parse_context("k", "null").unwrap(), Tree::map());
        assert_eq!(
            parse_context("k", r#"{"subset":"val"}"#).unwrap(),
            Tree::map().with("subset", "val")
        );
        let err = parse_context("loss", "{oops").unwrap_err();
        assert!(matches!(err, StreamError::Context { ref key, .. } if key == "loss"));
    }

    #[test]
    fn test_push_converts_units() {
        let mut nan_row = row("a", "loss", 1, 1, 0.0);
        nan_row.is_nan = true;

        let mut group = SeriesGroup::start(&row("a", "loss", 1, 0, 2.0), 4).unwrap();
        group.push(&row("a", "loss", 1, 0, 2.0));
        group.push(&nan_row);

        assert_eq!(group.len(), 2);
        assert_eq!(group.values[0], 2.0);
        assert!(group.values[1].is_nan());
        assert_eq!(group.epochs, vec![0.0, 10.0]);
        assert_eq!(group.timestamps, vec![1.0, 1.001]);
        assert!(group.x_axis_values.is_empty());
    }

    #[test]
    fn test_render_without_alignment() {
        let first = row("a", "acc", 1, 0, 0.5);
        let mut group = SeriesGroup::start(&first, 1).unwrap();
        group.push(&first);

        let tree = group.render(7, false);
        assert_eq!(tree.get("name"), Some(&Tree::string("acc")));
        assert_eq!(tree.get("slice"), Some(&Tree::int_array([0, 0, 7])));
        assert_eq!(tree.get("values"), Some(&Tree::numeric(vec![0.5])));
        assert_eq!(tree.get("x_axis_values"), Some(&Tree::null()));
    }

    #[test]
    fn test_x_axis_prefix_only() {
        let mut aligned = row("a", "acc", 1, 0, 0.5);
        aligned.x_axis_value = Some(10.0);
        aligned.x_axis_iter = Some(3);

        let mut group = SeriesGroup::start(&aligned, 2).unwrap();
        group.push(&aligned);
        group.push(&row("a", "acc", 1, 1, 0.6));

        let tree = group.render(2, true);
        assert_eq!(tree.get("x_axis_values"), Some(&Tree::numeric(vec![10.0])));
        assert_eq!(tree.get("x_axis_iters"), Some(&Tree::numeric(vec![3.0])));
    }
}
