//! Throughput benchmarks for the JKSN codec.
//!
//! Run with: cargo bench --bench codec
//!
//! Covers:
//! - `dump` / `parse` of a record list (swapped arrays, repeated strings)
//! - `dump` / `parse` of a flat integer series (delta integers)
//! - a warm session where the whole value is a back-reference

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jksn_core::{dump, parse, Decoder, Encoder, Value};

fn records(n: usize) -> Value {
    Value::array((0..n).map(|i| {
        Value::object([
            ("id", Value::Int(i as i64)),
            ("name", Value::from(format!("user-{}", i % 50))),
            ("active", Value::Bool(i % 3 != 0)),
            ("score", Value::Double(i as f64 * 0.5)),
        ])
    }))
}

fn series(n: usize) -> Value {
    Value::array((0..n as i64).map(|i| 1_000_000 + i * 7 - (i % 5) * 3))
}

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump");
    for n in [100usize, 1000] {
        let value = records(n);
        let size = dump(&value, true).map(|b| b.len()).unwrap_or(0);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("records", n), &value, |b, v| {
            b.iter(|| dump(black_box(v), true))
        });
    }
    let value = series(10_000);
    group.bench_function("series/10000", |b| b.iter(|| dump(black_box(&value), false)));
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for n in [100usize, 1000] {
        let bytes = dump(&records(n), true).unwrap_or_default();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("records", n), &bytes, |b, input| {
            b.iter(|| parse(black_box(input), true))
        });
    }
    let bytes = dump(&series(10_000), false).unwrap_or_default();
    group.bench_function("series/10000", |b| b.iter(|| parse(black_box(&bytes), false)));
    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let value = records(100);
    c.bench_function("session/warm_dump", |b| {
        let mut enc = Encoder::new();
        let _ = enc.dump(&value, false);
        b.iter(|| enc.dump(black_box(&value), false))
    });
    c.bench_function("session/warm_parse", |b| {
        let mut enc = Encoder::new();
        let mut dec = Decoder::new();
        let first = enc.dump(&value, false).unwrap_or_default();
        let _ = dec.parse(&first, false);
        let again = enc.dump(&value, false).unwrap_or_default();
        b.iter(|| dec.parse(black_box(&again), false))
    });
}

criterion_group!(benches, bench_dump, bench_parse, bench_session);
criterion_main!(benches);
