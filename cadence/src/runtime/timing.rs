//! Timing primitives: tick coordinates, the cascading wheel and the clock
//! that feeds it.

pub mod clock;
mod slab;
mod spin;
mod tick;
pub mod wheel;

pub use clock::{ClockSource, GlobalClock, ManualSource, MonotonicSource};
pub use tick::{TickInstant, TickSpan};
pub use wheel::{MAX_DELAY, TimerEvent, TimingWheel, WheelError};
