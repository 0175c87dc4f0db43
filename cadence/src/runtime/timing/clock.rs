//! Centisecond clock that drives the wheel.
//!
//! The monotonic reading is kept in a 24-bit seconds domain (seconds are
//! masked to 24 bits, then scaled to centiseconds), so it wraps roughly every
//! 194 days. Deltas are taken modulo that domain, which makes the wrap
//! invisible to the wheel.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use minstant::Instant;

/// Centiseconds per second.
pub const CENTIS_PER_SEC: u32 = 100;

/// Size of the monotonic domain in centiseconds.
pub const CLOCK_DOMAIN: u32 = (1 << 24) * CENTIS_PER_SEC;

/// Source of monotonic and wall-clock time.
pub trait ClockSource: Send + Sync {
    /// Monotonic centiseconds in `0..CLOCK_DOMAIN`.
    fn monotonic_centis(&self) -> u32;

    /// Wall-clock seconds since the Unix epoch.
    fn wall_secs(&self) -> u32;
}

impl<T: ClockSource + ?Sized> ClockSource for Arc<T> {
    fn monotonic_centis(&self) -> u32 {
        (**self).monotonic_centis()
    }

    fn wall_secs(&self) -> u32 {
        (**self).wall_secs()
    }
}

/// Production source: TSC-backed monotonic time via `minstant`.
#[derive(Debug)]
pub struct MonotonicSource {
    origin: Instant,
    /// Monotonic seconds already elapsed at `origin` (process start offset).
    base_secs: u64,
}

impl MonotonicSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            base_secs: 0,
        }
    }

    /// A source whose reading starts `secs` into the domain. Lets a host
    /// exercise the 24-bit wrap without waiting for it.
    #[must_use]
    pub fn with_offset(secs: u64) -> Self {
        Self {
            origin: Instant::now(),
            base_secs: secs,
        }
    }
}

impl Default for MonotonicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicSource {
    fn monotonic_centis(&self) -> u32 {
        let elapsed = self.origin.elapsed();
        let secs = (self.base_secs + elapsed.as_secs()) & 0x00ff_ffff;
        // secs < 2^24, so the product stays below CLOCK_DOMAIN.
        (secs as u32) * CENTIS_PER_SEC + elapsed.subsec_nanos() / 10_000_000
    }

    fn wall_secs(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as u32)
    }
}

/// Hand-driven source for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct ManualSource {
    centis: AtomicU32,
    wall: AtomicU32,
}

impl ManualSource {
    #[must_use]
    pub fn new(centis: u32, wall_secs: u32) -> Self {
        Self {
            centis: AtomicU32::new(centis % CLOCK_DOMAIN),
            wall: AtomicU32::new(wall_secs),
        }
    }

    /// Moves monotonic time forward by `centis`, wrapping in the domain.
    pub fn advance(&self, centis: u32) {
        let now = self.centis.load(Ordering::Relaxed);
        let next = ((u64::from(now) + u64::from(centis)) % u64::from(CLOCK_DOMAIN)) as u32;
        self.centis.store(next, Ordering::Relaxed);
    }
}

impl ClockSource for ManualSource {
    fn monotonic_centis(&self) -> u32 {
        self.centis.load(Ordering::Relaxed)
    }

    fn wall_secs(&self) -> u32 {
        self.wall.load(Ordering::Relaxed)
    }
}

/// Elapsed centiseconds from `last` to `now` inside the clock domain.
#[inline]
#[must_use]
pub const fn domain_delta(last: u32, now: u32) -> u32 {
    if now >= last {
        now - last
    } else {
        CLOCK_DOMAIN - last + now
    }
}

/// Tracks observed monotonic time and reconstructs wall-clock time from it.
pub struct GlobalClock {
    source: Box<dyn ClockSource>,
    current: AtomicU32,
    wall_offset: u32,
}

impl GlobalClock {
    /// Samples `source` once to fix the wall-clock offset.
    #[must_use]
    pub fn new(source: Box<dyn ClockSource>) -> Self {
        let current = source.monotonic_centis();
        let wall_offset = source
            .wall_secs()
            .wrapping_sub(current / CENTIS_PER_SEC);
        Self {
            source,
            current: AtomicU32::new(current),
            wall_offset,
        }
    }

    /// Reads the source and calls `on_tick` once per centisecond elapsed
    /// since the previous call. Returns the number of ticks.
    ///
    /// Must be driven from a single thread.
    pub fn advance(&self, mut on_tick: impl FnMut()) -> u32 {
        let now = self.source.monotonic_centis();
        let last = self.current.load(Ordering::Relaxed);
        if now == last {
            return 0;
        }
        let diff = domain_delta(last, now);
        self.current.store(now, Ordering::Release);
        for _ in 0..diff {
            on_tick();
        }
        diff
    }

    /// Last observed monotonic centiseconds.
    #[must_use]
    pub fn now_centis(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    /// Wall-clock seconds at monotonic zero.
    #[must_use]
    pub const fn start_time(&self) -> u32 {
        self.wall_offset
    }

    /// Current wall-clock seconds, reconstructed from monotonic time.
    #[must_use]
    pub fn wall_now(&self) -> u32 {
        self.wall_offset
            .wrapping_add(self.now_centis() / CENTIS_PER_SEC)
    }
}
