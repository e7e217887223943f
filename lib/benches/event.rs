// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{criterion_group, criterion_main, Bencher, Criterion};
use gpiowatch::Chip;
use gpiowatch_sim::Simpleton;

criterion_group!(benches, benchmarks);
criterion_main!(benches);

fn benchmarks(c: &mut Criterion) {
    c.bench_function("watch event latency", watch_event_latency);
    c.bench_function("ten watch events", ten_watch_events);
    c.bench_function("ten buffered watch events", ten_buffered_watch_events);
    c.bench_function("watch unwatch", watch_unwatch);
}

fn new_chip(s: &Simpleton) -> Chip {
    Chip::from_device(s.open().unwrap()).unwrap()
}

// determine the time from a line being requested to the event being returned.
// overheads are the sim request time.
fn watch_event_latency(b: &mut Bencher) {
    let s = Simpleton::new(10);
    let offset = 1;
    let chip = new_chip(&s);
    chip.watch_line(offset).unwrap();
    let mut requested = false;

    b.iter(|| {
        if requested {
            s.release(offset).unwrap();
        } else {
            s.request(offset).unwrap();
        }
        requested = !requested;
        let _ = chip.read_watch_event().unwrap();
    });
}

// determine time taken to decode ten events read in a single batch.
// overheads are 10 * request time and 1 * latency.
fn ten_watch_events(b: &mut Bencher) {
    let s = Simpleton::new(10);
    let offset = 1;
    let chip = new_chip(&s);
    chip.watch_line(offset).unwrap();
    let mut events = Vec::with_capacity(10);

    b.iter(|| {
        for _ in 0..5 {
            s.request(offset).unwrap();
            s.release(offset).unwrap();
        }
        events.clear();
        chip.read_watch_events(&mut events, 10).unwrap();
    });
}

// as ten_watch_events, but returning events individually from a buffer.
fn ten_buffered_watch_events(b: &mut Bencher) {
    let s = Simpleton::new(10);
    let offset = 1;
    let chip = new_chip(&s);
    chip.watch_line(offset).unwrap();
    let mut buf = chip.new_watch_event_buffer(10);

    b.iter(|| {
        for _ in 0..5 {
            s.request(offset).unwrap();
            s.release(offset).unwrap();
        }
        for _ in 0..10 {
            let _ = buf.read_event().unwrap();
        }
    });
}

// determine the cost of arming and disarming a watch.
fn watch_unwatch(b: &mut Bencher) {
    let s = Simpleton::new(10);
    let chip = new_chip(&s);
    let line = chip.line(3).unwrap();

    b.iter(|| {
        line.watch().unwrap();
        line.unwatch().unwrap();
    });
}
