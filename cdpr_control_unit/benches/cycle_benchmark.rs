//! Cycle benchmark: full drive pipeline for N-axis configurations.
//!
//! Measures `CycleRunner::cycle_body` on the simulated bus with every drive
//! enabled and tracking a moving position set-point, plus the status-word
//! decode on its own.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use cdpr_common::drive::StatusWord;
use cdpr_control_unit::cycle::CycleRunner;
use cdpr_control_unit::drive::DriveEvent;
use cdpr_control_unit::sim::SimulatedBus;

fn enabled_runner(n_axes: usize) -> CycleRunner<SimulatedBus> {
    let ids: Vec<u16> = (1..=n_axes as u16).collect();
    let bus = SimulatedBus::new(n_axes).expect("bus");
    let mut runner = CycleRunner::new(bus, &ids).expect("runner");
    runner.set_auto_enable(true);
    for _ in 0..10 {
        runner.cycle_body().expect("power-up cycle");
    }
    assert!(runner.all_enabled());
    runner.set_auto_enable(false);
    runner
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_full");
    group.significance_level(0.01);
    group.sample_size(500);

    for &n_axes in &[1, 4, 8, 16] {
        let mut runner = enabled_runner(n_axes);
        let mut step = 0i32;

        group.bench_with_input(BenchmarkId::new("axes", n_axes), &n_axes, |b, &n| {
            b.iter(|| {
                step = step.wrapping_add(1);
                for index in 0..n {
                    let _ = runner.post_event(index, DriveEvent::ChangeDeltaPosition(step % 7));
                }
                runner.cycle_body().expect("cycle");
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let words = [0x0040u16, 0x0021, 0x0023, 0x0027, 0x0007, 0x000F, 0x0008];
    c.bench_function("status_word_decode", |b| {
        b.iter(|| {
            for &raw in &words {
                black_box(StatusWord::from_raw(black_box(raw)).decode_state());
            }
        });
    });
}

criterion_group!(benches, bench_cycle, bench_decode);
criterion_main!(benches);
