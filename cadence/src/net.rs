//! Socket event plumbing between the host's network layer and the
//! scheduler.

pub mod poller;

pub use poller::{MioPoller, NullPoller, PollOutcome, SocketPoller};
