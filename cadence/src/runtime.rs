//! Runtime building blocks.
//!
//! - `actor`: handles, messages and the traits the host implements.
//! - `timing`: tick coordinates, the timing wheel and the global clock.
//! - `timer`: timeout scheduling on top of the wheel.
//! - `scheduler`: worker pool, wake protocol, monitor and orchestration.
//! - `topology`: worker CPU placement.

pub mod actor;
pub mod scheduler;
pub mod timer;
pub mod timing;
pub mod topology;
