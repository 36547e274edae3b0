//! Criterion benchmarks for the chat line codec.
//!
//! The receive loop shutdown-checks every inbound line while holding the
//! transport lock and decodes it right after releasing it, so both must stay
//! well under the poll interval.
//!
//! Run with:
//! ```bash
//! cargo bench --package chat-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chat_core::{
    decode_envelope, decode_message, encode_message, is_shutdown_signal, ClientIdentity,
    ExtraFlag,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn identity() -> ClientIdentity {
    ClientIdentity::new("benchmark-client", "bench-group").unwrap()
}

fn body_of_len(len: usize) -> String {
    "lorem ipsum; dolor sit amet ".chars().cycle().take(len).collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let id = identity();
    let mut group = c.benchmark_group("encode_message");
    for len in [16usize, 256, 4096] {
        let body = body_of_len(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &body, |b, body| {
            b.iter(|| encode_message(black_box(&id), black_box(body), ExtraFlag::None))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let id = identity();
    let mut group = c.benchmark_group("decode_message");
    for len in [16usize, 256, 4096] {
        let line = encode_message(&id, &body_of_len(len), ExtraFlag::None).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &line, |b, line| {
            b.iter(|| decode_message(black_box(line)))
        });
    }
    group.finish();
}

fn bench_decode_envelope(c: &mut Criterion) {
    let line = encode_message(&identity(), &body_of_len(256), ExtraFlag::NewConnection).unwrap();
    c.bench_function("decode_envelope/256", |b| {
        b.iter(|| decode_envelope(black_box(&line)))
    });
}

fn bench_shutdown_detection(c: &mut Criterion) {
    let id = identity();
    let chat = encode_message(&id, &body_of_len(256), ExtraFlag::None).unwrap();
    let shutdown = encode_message(&id, "LOGOUT", ExtraFlag::Shutdown).unwrap();

    let mut group = c.benchmark_group("is_shutdown_signal");
    group.bench_function("chat_line", |b| b.iter(|| is_shutdown_signal(black_box(&chat))));
    group.bench_function("shutdown_line", |b| {
        b.iter(|| is_shutdown_signal(black_box(&shutdown)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_decode_envelope,
    bench_shutdown_detection
);
criterion_main!(benches);
