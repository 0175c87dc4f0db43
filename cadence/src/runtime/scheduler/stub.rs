//! Test doubles for the thread loops.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::runtime::actor::{ActorHandle, Dispatcher};
use crate::runtime::scheduler::{StuckDispatch, WorkerMonitor};

/// Dispatcher with a counter of pending work units and a settable actor
/// count.
#[derive(Debug, Default)]
pub struct StubDispatcher {
    alive: AtomicUsize,
    work: AtomicUsize,
    attempts: AtomicUsize,
    pub endless: Mutex<Vec<StuckDispatch>>,
}

impl StubDispatcher {
    pub fn with_actors(alive: usize) -> Self {
        let d = Self::default();
        d.set_alive(alive);
        d
    }

    pub fn set_alive(&self, alive: usize) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn add_work(&self, units: usize) {
        self.work.fetch_add(units, Ordering::SeqCst);
    }

    pub fn pending_work(&self) -> usize {
        self.work.load(Ordering::SeqCst)
    }

    /// `dispatch_one` calls so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Dispatcher for StubDispatcher {
    fn dispatch_one(&self, monitor: &WorkerMonitor) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let took = self
            .work
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| w.checked_sub(1))
            .is_ok();
        if took {
            monitor.trigger(ActorHandle::new(1), ActorHandle::new(2));
            monitor.trigger(ActorHandle::SYSTEM, ActorHandle::SYSTEM);
        }
        took
    }

    fn actor_count(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    fn mark_endless(&self, stuck: &StuckDispatch) {
        self.endless.lock().unwrap().push(*stuck);
    }
}

/// Polls `cond` every millisecond, failing the test after five seconds.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
