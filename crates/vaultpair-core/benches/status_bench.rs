//! Criterion benchmarks for engine status decoding.
//!
//! The session controller decodes one status report per poll tick, so this
//! path runs twice a second for every active session.
//!
//! Run with:
//! ```bash
//! cargo bench --package vaultpair-core --bench status_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vaultpair_core::{EngineErrorKind, EngineStatus, VerificationCode};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const MINIMAL: &str = r#"{"state":"listening"}"#;

const VERIFYING: &str = r#"{
    "state": "verifying",
    "verification_code": "482913",
    "connected_device": "Living Room Tablet",
    "error": null,
    "error_kind": null
}"#;

const UNSTRUCTURED_ERROR: &str = r#"{
    "state": "error",
    "error": "bind: Address already in use (os error 98)"
}"#;

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_status");
    for (name, json) in [
        ("minimal", MINIMAL),
        ("verifying", VERIFYING),
        ("unstructured_error", UNSTRUCTURED_ERROR),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), json, |b, json| {
            b.iter(|| EngineStatus::from_json(black_box(json)).ok());
        });
    }
    group.finish();
}

fn bench_code_digits(c: &mut Criterion) {
    c.bench_function("parse_code_digits", |b| {
        b.iter(|| {
            VerificationCode::parse(black_box("482913"))
                .map(|code| code.digits())
                .ok()
        });
    });
}

fn bench_error_inference(c: &mut Criterion) {
    c.bench_function("infer_error_kind", |b| {
        b.iter(|| {
            EngineErrorKind::infer_from_message(black_box(
                "connection reset while waiting for peer: operation timed out",
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_code_digits,
    bench_error_inference
);
criterion_main!(benches);
