//! Stalled-dispatch detection.
//!
//! Each worker owns a [`WorkerMonitor`] that the dispatcher stamps when a
//! message is handed to an actor and again when the handler returns. The
//! monitor thread looks at every slot periodically: a slot that is mid-dispatch
//! and has not been stamped since the previous look is reported as a possible
//! endless loop, both in the log and to [`Dispatcher::mark_endless`]. The
//! worker is never interrupted.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::actor::{ActorHandle, Dispatcher};
use crate::trace::{debug, warn};

/// Per-worker progress token.
#[derive(Debug, Default)]
pub struct WorkerMonitor {
    version: AtomicU32,
    /// Version seen by the previous check. Only the monitor thread writes it.
    check_version: AtomicU32,
    source: AtomicU32,
    destination: AtomicU32,
}

/// A dispatch that made no progress across two checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckDispatch {
    pub worker: usize,
    pub source: ActorHandle,
    pub destination: ActorHandle,
    pub version: u32,
}

impl WorkerMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start (`destination != SYSTEM`) or end
    /// (`(SYSTEM, SYSTEM)`) of a dispatch.
    pub fn trigger(&self, source: ActorHandle, destination: ActorHandle) {
        self.source.store(source.get(), Ordering::Relaxed);
        self.destination.store(destination.get(), Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Compares the current version with the one seen last time. Returns the
    /// outstanding dispatch if it has not moved.
    pub fn check(&self, worker: usize) -> Option<StuckDispatch> {
        let version = self.version.load(Ordering::Acquire);
        if version == self.check_version.load(Ordering::Relaxed) {
            let destination = self.destination.load(Ordering::Relaxed);
            if destination != 0 {
                return Some(StuckDispatch {
                    worker,
                    source: ActorHandle::new(self.source.load(Ordering::Relaxed)),
                    destination: ActorHandle::new(destination),
                    version,
                });
            }
        } else {
            self.check_version.store(version, Ordering::Relaxed);
        }
        None
    }

    /// Dispatches started or finished on this worker so far.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Relaxed)
    }
}

/// Audits every worker's progress token.
pub struct DeadlockMonitor {
    workers: Arc<[WorkerMonitor]>,
    reports: AtomicU64,
}

impl DeadlockMonitor {
    #[must_use]
    pub fn new(workers: Arc<[WorkerMonitor]>) -> Self {
        Self {
            workers,
            reports: AtomicU64::new(0),
        }
    }

    /// One audit pass over all workers. Logs and returns every stall found.
    pub fn check_all(&self) -> Vec<StuckDispatch> {
        let stuck: Vec<_> = self
            .workers
            .iter()
            .enumerate()
            .filter_map(|(worker, monitor)| monitor.check(worker))
            .collect();
        for s in &stuck {
            warn!(
                worker = s.worker,
                source = %s.source,
                destination = %s.destination,
                version = s.version,
                "message from {} to {} may be in an endless loop",
                s.source,
                s.destination
            );
        }
        self.reports
            .fetch_add(stuck.len() as u64, Ordering::Relaxed);
        stuck
    }

    /// Stalls reported since creation.
    #[must_use]
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }
}

/// Monitor thread body.
pub struct MonitorThread {
    monitor: Arc<DeadlockMonitor>,
    dispatcher: Arc<dyn Dispatcher>,
    interval: Duration,
    poll: Duration,
}

impl MonitorThread {
    /// Audits every `interval`, checking for shutdown every `poll`.
    pub fn new(
        monitor: Arc<DeadlockMonitor>,
        dispatcher: Arc<dyn Dispatcher>,
        interval: Duration,
        poll: Duration,
    ) -> Self {
        Self {
            monitor,
            dispatcher,
            interval,
            poll,
        }
    }

    pub fn run(&self) {
        let steps = (self.interval.as_nanos() / self.poll.as_nanos().max(1)).max(1);
        'outer: loop {
            if self.dispatcher.actor_count() == 0 {
                break;
            }
            for stuck in self.monitor.check_all() {
                self.dispatcher.mark_endless(&stuck);
            }
            for _ in 0..steps {
                if self.dispatcher.actor_count() == 0 {
                    break 'outer;
                }
                std::thread::sleep(self.poll);
            }
        }
        debug!(reports = self.monitor.reports(), "monitor loop finished");
    }
}
