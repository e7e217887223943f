// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gpiowatch_uapi::{WatchEventKind, WatchEventRecord, RECORD_SIZE};

criterion_group!(benches, record_benchmarks);
criterion_main!(benches);

fn record_benchmarks(c: &mut Criterion) {
    c.bench_function("record from_slice", from_slice);
    c.bench_function("record batch of 32", batch);
}

fn from_slice(b: &mut criterion::Bencher) {
    let d = WatchEventRecord {
        kind: WatchEventKind::ConfigChanged,
        timestamp_ns: 1234,
        offset: 3,
    }
    .to_bytes();
    b.iter(|| WatchEventRecord::from_slice(black_box(&d)).unwrap());
}

// decode a full batch, as read by the monitoring tool.
fn batch(b: &mut criterion::Bencher) {
    let mut d = vec![0_u8; RECORD_SIZE * 32];
    for (i, chunk) in d.chunks_mut(RECORD_SIZE).enumerate() {
        let r = WatchEventRecord {
            kind: WatchEventKind::Requested,
            timestamp_ns: i as u64,
            offset: (i % 8) as u32,
        };
        chunk.copy_from_slice(&r.to_bytes());
    }
    b.iter(|| {
        for chunk in black_box(&d).chunks(RECORD_SIZE) {
            WatchEventRecord::from_slice(chunk).unwrap();
        }
    });
}
