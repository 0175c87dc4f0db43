//! Timeout service: schedules deferred responses and delivers them as the
//! clock advances.
//!
//! Owned by the [`Scheduler`](crate::runtime::scheduler::Scheduler) and
//! shared by `Arc` with anything that needs to arm a timeout. Delivery goes
//! through the host's [`MessageSink`]; a refused delivery is dropped without
//! retry, timers carry no delivery guarantee.

use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::runtime::actor::{ActorHandle, Dropped, Message, MessageSink, Session};
use crate::runtime::timing::{
    GlobalClock, TickInstant, TickSpan, TimerEvent, TimingWheel, WheelError,
};
use crate::trace::trace;

/// Failure to arm a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    /// Zero-delay delivery was refused by the target mailbox.
    #[error(transparent)]
    Dropped(#[from] Dropped),
    #[error(transparent)]
    Wheel(#[from] WheelError),
}

/// Counters since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Timeouts placed in the wheel.
    pub scheduled: u64,
    /// Responses accepted by the sink, zero-delay ones included.
    pub delivered: u64,
    /// Responses the sink refused.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

pub struct TimerService {
    wheel: TimingWheel,
    clock: GlobalClock,
    sink: Arc<dyn MessageSink>,
    counters: Counters,
}

impl TimerService {
    #[must_use]
    pub fn new(clock: GlobalClock, sink: Arc<dyn MessageSink>, capacity: NonZeroUsize) -> Self {
        Self::with_wheel(TimingWheel::new(capacity), clock, sink)
    }

    /// Builds the service around an existing wheel (e.g. one started near
    /// the counter wrap).
    #[must_use]
    pub fn with_wheel(wheel: TimingWheel, clock: GlobalClock, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            wheel,
            clock,
            sink,
            counters: Counters::default(),
        }
    }

    /// Arms a timeout that answers `target` with an empty response carrying
    /// `session` after `delay_centis` centiseconds.
    ///
    /// A zero delay delivers synchronously before returning.
    ///
    /// # Errors
    ///
    /// - [`TimeoutError::Dropped`] if a zero-delay response was refused.
    /// - [`TimeoutError::Wheel`] if the delay is longer than the wheel allows.
    pub fn schedule_timeout(
        &self,
        target: ActorHandle,
        delay_centis: u32,
        session: Session,
    ) -> Result<Session, TimeoutError> {
        if delay_centis == 0 {
            self.sink.push_message(target, Message::timeout(session))?;
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            return Ok(session);
        }

        let expire = self
            .wheel
            .insert(TimerEvent { target, session }, TickSpan::new(delay_centis))?;
        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        trace!(%target, %session, %expire, "timeout scheduled");
        Ok(session)
    }

    /// Catches the wheel up with the clock, one step per elapsed
    /// centisecond, delivering as it goes. Returns the number of ticks.
    ///
    /// `scratch` is a reusable buffer owned by the caller; it is empty on
    /// return. Must be driven from a single thread.
    pub fn advance(&self, scratch: &mut Vec<TimerEvent>) -> u32 {
        self.clock.advance(|| {
            self.wheel.step(scratch);
            self.deliver(scratch);
        })
    }

    /// Steps the wheel once regardless of the clock.
    pub fn tick(&self, scratch: &mut Vec<TimerEvent>) {
        self.wheel.step(scratch);
        self.deliver(scratch);
    }

    fn deliver(&self, fired: &mut Vec<TimerEvent>) {
        for event in fired.drain(..) {
            match self
                .sink
                .push_message(event.target, Message::timeout(event.session))
            {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(Dropped(target)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(%target, session = %event.session, "timeout dropped");
                }
            }
        }
    }

    #[must_use]
    pub fn current_tick(&self) -> TickInstant {
        self.wheel.current_tick()
    }

    /// Wall-clock seconds.
    #[must_use]
    pub fn wall_now(&self) -> u32 {
        self.clock.wall_now()
    }

    /// Last observed monotonic centiseconds.
    #[must_use]
    pub fn now_centis(&self) -> u32 {
        self.clock.now_centis()
    }

    /// Wall-clock seconds at monotonic zero.
    #[must_use]
    pub fn start_time(&self) -> u32 {
        self.clock.start_time()
    }

    /// Timeouts waiting in the wheel.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.wheel.len()
    }

    #[must_use]
    pub fn stats(&self) -> TimerStats {
        TimerStats {
            scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}
