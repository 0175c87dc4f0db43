//! Timing wheel insert/step throughput benchmark.
//!
//! Usage:
//!     cargo run --release --bin wheel_bench
//!
//! Environment variables:
//!     BENCH_CPU=2  Pin the benchmark thread to CPU 2 (default: unpinned)

use std::env;
use std::hint::black_box;

use minstant::Instant;

use cadence::runtime::actor::{ActorHandle, Session};
use cadence::runtime::timing::{TickSpan, TimerEvent, TimingWheel};
use cadence::runtime::topology::pin_to_core;

const TIMERS: u32 = 1 << 20;
/// Delays spread over the near wheel and the first two levels.
const DELAY_SPAN: u32 = 1 << 16;

fn bench_cpu() -> Option<usize> {
    env::var("BENCH_CPU").ok().and_then(|s| s.parse().ok())
}

/// Cheap deterministic delay sequence (xorshift).
fn delays() -> impl Iterator<Item = u32> {
    let mut state = 0x9e37_79b9_u32;
    std::iter::repeat_with(move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state % DELAY_SPAN + 1
    })
}

fn bench_insert(wheel: &TimingWheel) {
    let start = Instant::now();
    for (i, delay) in (0..TIMERS).zip(delays()) {
        let event = TimerEvent {
            target: ActorHandle::new(i | 1),
            session: Session::new(i as i32),
        };
        if let Err(e) = wheel.insert(event, TickSpan::new(delay)) {
            eprintln!("insert failed: {e}");
            return;
        }
    }
    let elapsed = start.elapsed();
    println!(
        "insert: {TIMERS} timers in {elapsed:?} ({:.1} ns/insert)",
        elapsed.as_nanos() as f64 / f64::from(TIMERS)
    );
}

fn bench_drain(wheel: &TimingWheel) {
    let mut fired = Vec::with_capacity(1024);
    let mut total = 0usize;
    let mut steps = 0u32;
    let start = Instant::now();
    while !wheel.is_empty() {
        wheel.step(&mut fired);
        total += fired.len();
        black_box(&fired);
        fired.clear();
        steps += 1;
    }
    let elapsed = start.elapsed();
    println!(
        "drain: {total} timers over {steps} steps in {elapsed:?} ({:.1} ns/step)",
        elapsed.as_nanos() as f64 / f64::from(steps.max(1))
    );
}

fn bench_idle_steps(wheel: &TimingWheel) {
    const STEPS: u32 = 1 << 22;
    let mut fired = Vec::new();
    let start = Instant::now();
    for _ in 0..STEPS {
        wheel.step(&mut fired);
    }
    let elapsed = start.elapsed();
    println!(
        "idle: {STEPS} empty steps in {elapsed:?} ({:.1} ns/step)",
        elapsed.as_nanos() as f64 / f64::from(STEPS)
    );
}

fn main() {
    if let Some(cpu) = bench_cpu() {
        if !pin_to_core(cpu) {
            eprintln!("wheel_bench: could not pin to CPU {cpu}");
        }
    }

    let wheel = TimingWheel::default();
    bench_insert(&wheel);
    bench_drain(&wheel);
    bench_idle_steps(&wheel);
}
