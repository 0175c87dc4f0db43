//! Seams to the actor registry that owns mailboxes and runs actor code.
//!
//! The scheduler never looks inside an actor. It asks a [`Dispatcher`] to run
//! one unit of work, asks how many actors are still alive, and hands expired
//! timers to a [`MessageSink`]. Everything else (naming, payload encoding,
//! mailbox layout) belongs to the host.

use core::fmt;

use crate::runtime::scheduler::{StuckDispatch, WorkerMonitor};

/// Opaque actor address. `0` is reserved for the runtime itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ActorHandle(u32);

impl ActorHandle {
    /// Source address stamped on messages produced by the runtime.
    pub const SYSTEM: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{:08x}", self.0)
    }
}

/// Caller-chosen correlation id, echoed back in the response message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Session(i32);

impl Session {
    #[inline]
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message category as seen by the receiving actor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Reply to an earlier request; timer expiry is delivered this way.
    Response,
    /// Anything the host defines on top.
    Other(u8),
}

/// A message pushed into an actor mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: ActorHandle,
    pub session: Session,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Message {
    /// The empty response a timer produces when it expires.
    #[must_use]
    pub const fn timeout(session: Session) -> Self {
        Self {
            source: ActorHandle::SYSTEM,
            session,
            kind: MessageKind::Response,
            payload: Vec::new(),
        }
    }
}

/// The target mailbox does not exist (anymore) or refused the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message to {0} dropped")]
pub struct Dropped(pub ActorHandle);

/// Delivery side of the actor registry.
pub trait MessageSink: Send + Sync {
    /// Appends `message` to the mailbox of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Dropped`] when `target` is unknown or already dead.
    fn push_message(&self, target: ActorHandle, message: Message) -> Result<(), Dropped>;
}

/// Execution side of the actor registry.
pub trait Dispatcher: Send + Sync {
    /// Runs at most one unit of work on the calling worker thread.
    ///
    /// Implementations call [`WorkerMonitor::trigger`] with the source and
    /// destination before handing a message to an actor, and with
    /// `(SYSTEM, SYSTEM)` once it returns. Returns `true` if work was done.
    fn dispatch_one(&self, monitor: &WorkerMonitor) -> bool;

    /// Number of live actors. The scheduler shuts down when this reaches zero.
    fn actor_count(&self) -> usize;

    /// Called by the monitor thread for every dispatch that made no progress
    /// over a full monitor interval. The worker is not interrupted; the host
    /// may flag `stuck.destination` as possibly looping forever.
    fn mark_endless(&self, stuck: &StuckDispatch) {
        let _ = stuck;
    }
}
