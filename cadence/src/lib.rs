//! Thread-level scheduling core for an actor runtime.
//!
//! `cadence` owns the threads; the host owns the actors. A host supplies a
//! [`Dispatcher`](runtime::actor::Dispatcher) that delivers one message per
//! call, a [`MessageSink`](runtime::actor::MessageSink) that accepts timer
//! responses, and a [`SocketPoller`](net::SocketPoller). The
//! [`Scheduler`](runtime::scheduler::Scheduler) drives them with a worker
//! pool, a centisecond timing wheel and a stalled-dispatch monitor.

pub mod net;
pub mod runtime;
pub mod trace;

pub use trace::init_tracing;
