//! Criterion benchmarks for the hot paths: the flap metric and the
//! key/value wire codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vigild::flapping::flapping_pct;
use vigild::kvvec::KvVec;
use vigild::objects::MAX_STATE_HISTORY_ENTRIES;

fn bench_flapping_pct(c: &mut Criterion) {
    let mut history = [0i32; MAX_STATE_HISTORY_ENTRIES];
    for (i, slot) in history.iter_mut().enumerate() {
        *slot = (i % 3 == 0) as i32 * 2;
    }
    c.bench_function("flapping_pct", |b| {
        b.iter(|| flapping_pct(black_box(&history), black_box(7)))
    });
}

fn bench_kvvec_codec(c: &mut Criterion) {
    let mut kvv = KvVec::new();
    for i in 0..32 {
        kvv.push_str(&format!("key_{i}"), &format!("value number {i} with some text"));
    }
    let buf = kvv.encode(0x00, 0x01, 0);

    c.bench_function("kvvec_encode", |b| {
        b.iter(|| black_box(&kvv).encode(0x00, 0x01, 0))
    });
    c.bench_function("kvvec_decode", |b| {
        b.iter(|| KvVec::from_buf(black_box(&buf), 0x00, 0x01))
    });
    c.bench_function("kvvec_sorted_fetch", |b| {
        let mut sorted = kvv.clone();
        sorted.sort();
        b.iter(|| sorted.fetch(black_box(b"key_17")))
    });
}

criterion_group!(benches, bench_flapping_pct, bench_kvvec_codec);
criterion_main!(benches);
