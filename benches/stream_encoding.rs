//! Benchmarks for encoding and metric streaming
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::convert::Infallible;
use trackstream::encoding::{decode_slice, encode_to_vec, Tree};
use trackstream::{MetricRow, MetricStreamer, RunProps, StreamConfig};

fn rows(runs: usize, keys: usize, points: usize) -> Vec<MetricRow> {
    let mut out = Vec::with_capacity(runs * keys * points);
    for r in 0..runs {
        for k in 0..keys {
            for i in 0..points {
                out.push(MetricRow::new(
                    format!("run-{}", r),
                    format!("metric-{}", k),
                    i as i64,
                    (i as f64).sin(),
                ));
            }
        }
    }
    out
}

fn bench_metric_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric_stream");
    let config = StreamConfig::default();

    for points in [100, 1_000, 10_000].iter() {
        let input = rows(4, 8, *points);
        let lookup: HashMap<_, _> = (0..4)
            .map(|r| {
                let id = format!("run-{}", r);
                (id.clone(), RunProps::new(id).into_entry(0))
            })
            .collect();

        group.throughput(Throughput::Elements(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("rows", input.len()), &input, |b, input| {
            let mut out = Vec::with_capacity(input.len() * 40);
            b.iter(|| {
                out.clear();
                MetricStreamer::new(&lookup, &config)
                    .stream(input.iter().cloned().map(Ok::<_, Infallible>), &mut out)
                    .unwrap();
                black_box(out.len());
            });
        });
    }

    group.finish();
}

fn bench_numeric_block_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_block_codec");

    for size in [1_000, 100_000].iter() {
        let values: Vec<f64> = (0..*size).map(|i| i as f64 * 0.5).collect();
        let tree = Tree::keyed("values", Tree::numeric(values));
        let bytes = encode_to_vec(&tree).unwrap();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &tree, |b, tree| {
            b.iter(|| encode_to_vec(black_box(tree)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| decode_slice(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_metric_stream, bench_numeric_block_codec);
criterion_main!(benches);
