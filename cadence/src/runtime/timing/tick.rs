//! Tick-space coordinates for the timing wheel.
//!
//! One tick is one centisecond of monotonic time. The counter is a `u32`
//! that wraps: every comparison the wheel makes is a mask test on bit
//! patterns, never an ordering test, so wraparound needs no special casing
//! outside the top cascade level.

use core::fmt;
use core::ops::Add;

/// A point on the wrapping tick lattice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct TickInstant(u32);

impl TickInstant {
    /// The first tick of a freshly created wheel.
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Advances by `span`, wrapping at 2^32.
    #[inline]
    #[must_use]
    pub const fn wrapping_add(self, span: TickSpan) -> Self {
        Self(self.0.wrapping_add(span.0))
    }
}

impl Add<TickSpan> for TickInstant {
    type Output = Self;

    #[inline]
    fn add(self, rhs: TickSpan) -> Self::Output {
        self.wrapping_add(rhs)
    }
}

impl fmt::Display for TickInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A number of ticks (centiseconds).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct TickSpan(u32);

impl TickSpan {
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}
