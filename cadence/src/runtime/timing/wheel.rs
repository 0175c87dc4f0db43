//! Hierarchical cascading timing wheel.
//!
//! ```text
//! near      256 buckets x 1 tick                      expire & 0xff
//! level 0    63 buckets x 256 ticks                   bits  8..14
//! level 1    63 buckets x 16 384 ticks                bits 14..20
//! level 2    63 buckets x 1 048 576 ticks             bits 20..26
//! level 3    63 buckets x 67 108 864 ticks            bits 26..32
//! wrapped    top digit 0 after crossing 2^32          redistributed at t = 0
//! ```
//!
//! An entry sits in the near level once its expiry shares every bit above
//! the low 8 with the current tick. Otherwise it sits in the first level whose
//! width covers the difference, at the bucket named by its digit at that level.
//! Digit 0 of a level is never used: the range it would cover is handled by
//! the finer levels at the moment the coarser digit rolls over.
//!
//! Every time the near level wraps, the next coarse bucket that has become
//! reachable is emptied and its entries re-inserted. Buckets are FIFO lists,
//! so same-tick entries fire in insertion order and a cascade keeps relative
//! order.
//!
//! Insert and step are mutually exclusive under one spin lock. Fired events
//! are handed back to the caller, which delivers them after the lock is
//! released.

use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::runtime::actor::{ActorHandle, Session};
use crate::runtime::timing::slab::{NodeIndex, Slab};
use crate::runtime::timing::spin::SpinLock;
use crate::runtime::timing::tick::{TickInstant, TickSpan};

const NEAR_SHIFT: u32 = 8;
const NEAR_SLOTS: usize = 1 << NEAR_SHIFT;
const NEAR_MASK: u32 = (1 << NEAR_SHIFT) - 1;
const LEVEL_SHIFT: u32 = 6;
const LEVEL_SLOTS: usize = 1 << LEVEL_SHIFT;
const LEVEL_MASK: u32 = (1 << LEVEL_SHIFT) - 1;
const LEVELS: usize = 4;

/// Longest delay the wheel accepts. Anything longer could alias with the
/// current tick after the 32-bit counter wraps.
pub const MAX_DELAY: TickSpan = TickSpan::new(i32::MAX as u32);

/// Default number of preallocated timer nodes.
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// What a timer delivers when it expires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerEvent {
    pub target: ActorHandle,
    pub session: Session,
}

/// Rejected schedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WheelError {
    #[error("delay of {delay} ticks exceeds the wheel maximum of {max}")]
    DelayTooLong { delay: u32, max: u32 },
}

/// FIFO list of nodes threaded through the slab.
#[derive(Debug, Copy, Clone)]
struct Bucket {
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
}

impl Bucket {
    const EMPTY: Self = Self {
        head: None,
        tail: None,
    };

    fn push(&mut self, slab: &mut Slab, idx: NodeIndex) {
        match self.tail {
            Some(tail) => {
                if let Some(node) = slab.get_mut(tail) {
                    node.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    /// Detaches the whole list, returning its head.
    fn take(&mut self) -> Option<NodeIndex> {
        self.tail = None;
        self.head.take()
    }
}

/// Where an entry belongs relative to the current tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Placement {
    Near(usize),
    Level(usize, usize),
    Wrapped,
}

fn placement(expire: TickInstant, current: TickInstant) -> Placement {
    let (expire, current) = (expire.get(), current.get());
    if expire | NEAR_MASK == current | NEAR_MASK {
        return Placement::Near((expire & NEAR_MASK) as usize);
    }

    let mut mask: u64 = 1 << (NEAR_SHIFT + LEVEL_SHIFT);
    let mut level = 0;
    while level < LEVELS - 1 {
        let low = (mask - 1) as u32;
        if expire | low == current | low {
            break;
        }
        mask <<= LEVEL_SHIFT;
        level += 1;
    }

    let shift = NEAR_SHIFT + level as u32 * LEVEL_SHIFT;
    match (expire >> shift) & LEVEL_MASK {
        0 => Placement::Wrapped,
        digit => Placement::Level(level, digit as usize - 1),
    }
}

struct WheelState {
    near: [Bucket; NEAR_SLOTS],
    levels: [[Bucket; LEVEL_SLOTS - 1]; LEVELS],
    wrapped: Bucket,
    time: TickInstant,
    slab: Slab,
}

impl WheelState {
    fn link(&mut self, idx: NodeIndex) {
        let Some(expire) = self.slab.get(idx).map(|n| n.expire) else {
            return;
        };
        match placement(expire, self.time) {
            Placement::Near(slot) => self.near[slot].push(&mut self.slab, idx),
            Placement::Level(level, slot) => self.levels[level][slot].push(&mut self.slab, idx),
            Placement::Wrapped => self.wrapped.push(&mut self.slab, idx),
        }
    }

    /// Re-links every node of a detached list, in list order.
    fn relink(&mut self, mut cursor: Option<NodeIndex>) {
        while let Some(idx) = cursor {
            cursor = self.slab.get_mut(idx).and_then(|n| n.next.take());
            self.link(idx);
        }
    }

    /// Moves time forward one tick and pulls down the coarse bucket that
    /// just became reachable, if any.
    fn shift(&mut self) {
        self.time = self.time + TickSpan::new(1);
        let now = self.time.get();

        let mut mask: u64 = 1 << NEAR_SHIFT;
        let mut digits = now >> NEAR_SHIFT;
        let mut level = 0;
        while level < LEVELS && u64::from(now) & (mask - 1) == 0 {
            let digit = digits & LEVEL_MASK;
            if digit != 0 {
                let list = self.levels[level][digit as usize - 1].take();
                self.relink(list);
                return;
            }
            mask <<= LEVEL_SHIFT;
            digits >>= LEVEL_SHIFT;
            level += 1;
        }

        if now == 0 {
            let list = self.wrapped.take();
            self.relink(list);
        }
    }

    /// Drains the near bucket for the current tick into `fired`.
    fn expire(&mut self, fired: &mut Vec<TimerEvent>) {
        let slot = (self.time.get() & NEAR_MASK) as usize;
        let mut cursor = self.near[slot].take();
        while let Some(idx) = cursor {
            let node = self.slab.remove(idx);
            cursor = node.next;
            fired.push(node.event);
        }
    }
}

/// Cascading timer wheel shared by the clock thread and every scheduler of
/// timeouts.
pub struct TimingWheel {
    state: SpinLock<WheelState>,
    /// Mirror of `state.time` for lock-free reads.
    now: AtomicU32,
}

impl TimingWheel {
    /// Creates an empty wheel at tick 0.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::starting_at(TickInstant::ZERO, capacity)
    }

    /// Creates an empty wheel whose counter starts at `start`.
    #[must_use]
    pub fn starting_at(start: TickInstant, capacity: NonZeroUsize) -> Self {
        Self {
            state: SpinLock::new(WheelState {
                near: [Bucket::EMPTY; NEAR_SLOTS],
                levels: [[Bucket::EMPTY; LEVEL_SLOTS - 1]; LEVELS],
                wrapped: Bucket::EMPTY,
                time: start,
                slab: Slab::with_capacity(capacity),
            }),
            now: AtomicU32::new(start.get()),
        }
    }

    /// Schedules `event` to fire `delay` ticks from the current tick and
    /// returns the expiry tick.
    ///
    /// A zero delay lands in the current near bucket and fires on the next
    /// [`step`](Self::step).
    ///
    /// # Errors
    ///
    /// [`WheelError::DelayTooLong`] if `delay` exceeds [`MAX_DELAY`].
    pub fn insert(&self, event: TimerEvent, delay: TickSpan) -> Result<TickInstant, WheelError> {
        if delay > MAX_DELAY {
            return Err(WheelError::DelayTooLong {
                delay: delay.get(),
                max: MAX_DELAY.get(),
            });
        }
        let mut state = self.state.lock();
        let expire = state.time + delay;
        let idx = state.slab.insert(event, expire);
        state.link(idx);
        Ok(expire)
    }

    /// Advances one tick, appending every expired event to `fired` in
    /// firing order.
    ///
    /// Entries left at the pre-shift position (zero-delay inserts that raced
    /// the previous step) fire first, then time shifts and cascades, then the
    /// new position fires.
    pub fn step(&self, fired: &mut Vec<TimerEvent>) {
        let mut state = self.state.lock();
        state.expire(fired);
        state.shift();
        state.expire(fired);
        self.now.store(state.time.get(), Ordering::Release);
    }

    /// The wheel's tick counter.
    #[inline]
    #[must_use]
    pub fn current_tick(&self) -> TickInstant {
        TickInstant::new(self.now.load(Ordering::Acquire))
    }

    /// Entries scheduled and not yet fired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().slab.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimingWheel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
