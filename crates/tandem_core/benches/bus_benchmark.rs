//! # Message Bus Benchmark
//!
//! Measures broadcast cost for a frame's worth of queued messages across
//! the six standard servers.
//!
//! Run with: `cargo bench --package tandem_core`

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;
use tandem_core::{CoreResult, EntityRegistry, Message, MessageBus, MessageReceiver};

/// Receivers registered on a default runtime.
const SERVER_COUNT: usize = 6;

struct Sink(u64);

impl MessageReceiver for Sink {
    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        if let Message::KeyPressed(_) = message {
            self.0 += 1;
        }
        Ok(())
    }
}

fn bench_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_notify");

    for count in [16, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let bus = MessageBus::new();
            for _ in 0..SERVER_COUNT {
                bus.register(Arc::new(Mutex::new(Sink(0))));
            }
            b.iter(|| {
                for _ in 0..count {
                    bus.post(Message::KeyPressed(tandem_core::Key::Space));
                }
                black_box(bus.notify())
            });
        });
    }

    group.finish();
}

fn bench_sync_set_query(c: &mut Criterion) {
    let mut registry = EntityRegistry::with_capacity(100_000);
    for i in 0..100_000u64 {
        // Every other entity is physics-driven.
        registry.spawn_with(i + 1, if i % 2 == 0 { i + 1 } else { 0 });
    }

    c.bench_function("entity_sync_set_100k", |b| {
        b.iter(|| black_box(registry.with_physics_and_graphics().count()));
    });
}

criterion_group!(benches, bench_notify, bench_sync_set_query);
criterion_main!(benches);
