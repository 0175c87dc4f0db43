//! Socket polling contract and its implementations.
//!
//! The scheduler's socket thread calls [`SocketPoller::poll`] in a loop and
//! wakes a worker whenever the poller reports that it forwarded something.
//! What "forwarding" means is up to the host: typically the handler turns a
//! readiness event into a message pushed to some actor's mailbox.

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use mio::event::Event;
use mio::{Events, Poll, Registry, Token, Waker};

use crate::trace::{debug, warn};

/// Result of one poll round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing forwarded (interrupted, spurious or failed). Poll again.
    Transient,
    /// The poller was asked to exit.
    Exit,
    /// At least one event was forwarded to an actor.
    Processed,
}

impl PollOutcome {
    /// Maps the integer convention: negative, zero, positive.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        if code < 0 {
            Self::Transient
        } else if code == 0 {
            Self::Exit
        } else {
            Self::Processed
        }
    }
}

/// Socket event source driven by the scheduler's socket thread.
pub trait SocketPoller: Send + Sync {
    /// Blocks until something happens.
    fn poll(&self) -> PollOutcome;

    /// Makes the current or next [`poll`](Self::poll) return
    /// [`PollOutcome::Exit`]. Callable from any thread.
    fn request_exit(&self);
}

/// Token reserved for the exit waker. Hosts must not register sockets
/// with it.
pub const WAKE_TOKEN: Token = Token(usize::MAX);

const EVENT_CAPACITY: usize = 256;

type Handler = Box<dyn FnMut(&Event) -> bool + Send>;

struct PollState {
    poll: Poll,
    events: Events,
    handler: Handler,
}

/// [`SocketPoller`] over a `mio::Poll`.
///
/// Register sockets through [`registry`](Self::registry). Every readiness
/// event other than the exit waker goes to the handler, which returns
/// whether it forwarded anything.
pub struct MioPoller {
    state: Mutex<PollState>,
    registry: Registry,
    waker: Waker,
    exit: AtomicBool,
}

impl MioPoller {
    /// # Errors
    ///
    /// Returns an error if the OS poller or the waker cannot be created.
    pub fn new(handler: impl FnMut(&Event) -> bool + Send + 'static) -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        Ok(Self {
            state: Mutex::new(PollState {
                poll,
                events: Events::with_capacity(EVENT_CAPACITY),
                handler: Box::new(handler),
            }),
            registry,
            waker,
            exit: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // Only the socket thread polls; the lock is uncontended.
    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SocketPoller for MioPoller {
    fn poll(&self) -> PollOutcome {
        if self.exit.load(Ordering::Acquire) {
            return PollOutcome::Exit;
        }

        let mut guard = self.lock();
        let PollState {
            poll,
            events,
            handler,
        } = &mut *guard;

        if let Err(e) = poll.poll(events, None) {
            if e.kind() != ErrorKind::Interrupted {
                warn!(error = %e, "socket poll failed");
            }
            return PollOutcome::Transient;
        }

        let mut forwarded = false;
        for event in events.iter() {
            if event.token() == WAKE_TOKEN {
                continue;
            }
            forwarded |= handler(event);
        }

        if self.exit.load(Ordering::Acquire) {
            PollOutcome::Exit
        } else if forwarded {
            PollOutcome::Processed
        } else {
            PollOutcome::Transient
        }
    }

    fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake socket poller");
        }
    }
}

/// [`SocketPoller`] for hosts without sockets. `poll` parks until exit is
/// requested.
#[derive(Debug, Default)]
pub struct NullPoller {
    exit: Mutex<bool>,
    cond: Condvar,
}

impl NullPoller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SocketPoller for NullPoller {
    fn poll(&self) -> PollOutcome {
        let mut exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
        while !*exit {
            exit = self
                .cond
                .wait(exit)
                .unwrap_or_else(PoisonError::into_inner);
        }
        debug!("null poller exiting");
        PollOutcome::Exit
    }

    fn request_exit(&self) {
        let mut exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
        *exit = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use mio::Interest;
    use mio::net::UdpSocket;

    #[test]
    fn outcome_from_code() {
        assert_eq!(PollOutcome::from_code(-1), PollOutcome::Transient);
        assert_eq!(PollOutcome::from_code(0), PollOutcome::Exit);
        assert_eq!(PollOutcome::from_code(3), PollOutcome::Processed);
    }

    #[test]
    fn null_poller_blocks_until_exit() {
        let poller = Arc::new(NullPoller::new());
        let p = Arc::clone(&poller);
        let handle = thread::spawn(move || p.poll());
        thread::sleep(std::time::Duration::from_millis(10));
        poller.request_exit();
        assert_eq!(handle.join().unwrap(), PollOutcome::Exit);
        assert_eq!(poller.poll(), PollOutcome::Exit);
    }

    #[test]
    fn mio_poller_forwards_readable_socket() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let poller = MioPoller::new(move |event| {
            assert_eq!(event.token(), Token(7));
            counter.fetch_add(1, Ordering::Relaxed);
            true
        })
        .unwrap();

        let mut socket = UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        poller
            .registry()
            .register(&mut socket, Token(7), Interest::READABLE)
            .unwrap();
        let addr = socket.local_addr().unwrap();
        socket.send_to(b"ping", addr).unwrap();

        assert_eq!(poller.poll(), PollOutcome::Processed);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn mio_poller_exit_from_another_thread() {
        let poller = Arc::new(MioPoller::new(|_| true).unwrap());
        let p = Arc::clone(&poller);
        let handle = thread::spawn(move || {
            let mut rounds = 0;
            while p.poll() != PollOutcome::Exit {
                rounds += 1;
                assert!(rounds < 100, "poller never exited");
            }
        });
        thread::sleep(std::time::Duration::from_millis(10));
        poller.request_exit();
        handle.join().unwrap();
    }
}
