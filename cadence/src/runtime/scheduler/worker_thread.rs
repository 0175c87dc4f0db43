//! Worker thread: dispatch until there is nothing to do, then sleep.

use std::sync::Arc;

use crate::runtime::actor::Dispatcher;
use crate::runtime::scheduler::monitor_thread::WorkerMonitor;
use crate::runtime::scheduler::wake::WakeCoordinator;
use crate::trace::{debug, trace};

pub struct WorkerThread {
    id: usize,
    dispatcher: Arc<dyn Dispatcher>,
    coordinator: Arc<WakeCoordinator>,
    monitors: Arc<[WorkerMonitor]>,
}

impl WorkerThread {
    /// `id` indexes this worker's slot in `monitors`.
    pub fn new(
        id: usize,
        dispatcher: Arc<dyn Dispatcher>,
        coordinator: Arc<WakeCoordinator>,
        monitors: Arc<[WorkerMonitor]>,
    ) -> Self {
        assert!(id < monitors.len(), "worker {id} has no monitor slot");
        Self {
            id,
            dispatcher,
            coordinator,
            monitors,
        }
    }

    /// Runs until the registry is empty or the pool is shut down.
    ///
    /// Returns the number of successful dispatches.
    pub fn run(&self) -> u64 {
        let monitor = &self.monitors[self.id];
        let mut dispatched = 0u64;
        loop {
            if self.dispatcher.dispatch_one(monitor) {
                dispatched += 1;
                continue;
            }
            if self.dispatcher.actor_count() == 0 || self.coordinator.is_shutdown() {
                break;
            }
            trace!(worker = self.id, "no work, sleeping");
            // Whatever woke us, go back to the dispatcher before deciding
            // anything.
            self.coordinator.sleep();
        }
        debug!(worker = self.id, dispatched, "worker loop finished");
        dispatched
    }
}
