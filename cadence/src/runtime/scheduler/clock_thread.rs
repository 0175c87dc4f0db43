//! Clock thread: advances the timer wheel and keeps a worker available.

use std::sync::Arc;
use std::time::Duration;

use crate::net::SocketPoller;
use crate::runtime::actor::Dispatcher;
use crate::runtime::scheduler::wake::{WakeCoordinator, WakePolicy};
use crate::runtime::timer::TimerService;
use crate::runtime::timing::TimerEvent;
use crate::trace::{debug, trace};

pub struct ClockThread {
    timers: Arc<TimerService>,
    dispatcher: Arc<dyn Dispatcher>,
    coordinator: Arc<WakeCoordinator>,
    poller: Arc<dyn SocketPoller>,
    interval: Duration,
    fired: Vec<TimerEvent>,
}

impl ClockThread {
    pub fn new(
        timers: Arc<TimerService>,
        dispatcher: Arc<dyn Dispatcher>,
        coordinator: Arc<WakeCoordinator>,
        poller: Arc<dyn SocketPoller>,
        interval: Duration,
    ) -> Self {
        Self {
            timers,
            dispatcher,
            coordinator,
            poller,
            interval,
            fired: Vec::with_capacity(64),
        }
    }

    /// Ticks until the registry is empty, then stops the poller and releases
    /// every sleeping worker.
    pub fn run(&mut self) {
        loop {
            let ticks = self.timers.advance(&mut self.fired);
            if ticks > 0 {
                trace!(ticks, now = %self.timers.current_tick(), "clock advanced");
            }
            if self.dispatcher.actor_count() == 0 {
                break;
            }
            self.coordinator.wake(WakePolicy::KeepOneIdle);
            std::thread::sleep(self.interval);
        }

        debug!(pending = self.timers.pending(), "clock stopping, releasing workers");
        self.poller.request_exit();
        self.coordinator.shutdown();
    }
}
