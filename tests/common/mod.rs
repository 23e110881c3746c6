//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::collections::HashMap;
use std::convert::Infallible;
use trackstream::encoding::{decode_slice, DecodedTable};
use trackstream::{MetricRow, RunEntry, RunProps};

/// Wrap rows as an infallible cursor.
pub fn ok_rows<T>(rows: Vec<T>) -> Vec<Result<T, Infallible>> {
    rows.into_iter().map(Ok).collect()
}

/// Decode a complete stream, failing the test on any codec error.
pub fn decode_table(bytes: &[u8]) -> DecodedTable {
    decode_slice(bytes).expect("stream should decode").table
}

/// A run lookup with a `props.name` header for each id, counting down
/// `remaining` in the given order.
pub fn lookup(ids: &[&str]) -> HashMap<String, RunEntry> {
    let total = ids.len() as i64;
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let entry = RunProps::new(*id).into_entry(total - i as i64 - 1);
            (id.to_string(), entry)
        })
        .collect()
}

/// Rows `(iteration, value)` for one series.
pub fn series(run: &str, key: &str, points: &[(i64, f64)]) -> Vec<MetricRow> {
    points
        .iter()
        .map(|&(iter, value)| MetricRow::new(run, key, iter, value))
        .collect()
}
