//! Scheduler: the thread topology that runs an actor system.
//!
//! # Architecture
//!
//! [`Scheduler::spawn`] starts `3 + N` OS threads:
//! - **Monitor thread** (`cadence-monitor`): audits worker progress tokens
//!   and reports dispatches that look stuck.
//! - **Clock thread** (`cadence-clock`): advances the [`TimerService`], then
//!   makes sure a worker is awake to handle whatever fired.
//! - **Socket thread** (`cadence-socket`): pumps the host's
//!   [`SocketPoller`] and wakes a worker when the whole pool sleeps.
//! - **Worker threads** (`cadence-worker-{i}`): dispatch messages through the
//!   host's [`Dispatcher`] and park on the [`WakeCoordinator`] when idle.
//!
//! Mailboxes, actors and the registry belong to the host; the scheduler only
//! sees them through [`Dispatcher`] and [`MessageSink`].
//!
//! # Shutdown
//!
//! There is no stop button. Every loop exits once
//! [`Dispatcher::actor_count`] reaches zero. The clock thread, on its way
//! out, stops the poller and releases sleeping workers.
//!
//! # Example
//!
//! ```ignore
//! use cadence::runtime::scheduler::{Host, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default(), host)?;
//! let timers = scheduler.timers();
//! // ... hand `timers` to actors, launch the bootstrap actor ...
//! scheduler.start();
//! ```

pub mod clock_thread;
pub mod config;
pub mod monitor_thread;
pub mod socket_thread;
#[cfg(test)]
mod stub;
pub mod wake;
pub mod worker_thread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::net::SocketPoller;
use crate::runtime::actor::{Dispatcher, MessageSink};
use crate::runtime::timer::TimerService;
use crate::runtime::timing::{ClockSource, GlobalClock};
use crate::runtime::topology::{WorkerPlacement, pin_to_core};
use crate::trace::{debug, error, info, warn};

use clock_thread::ClockThread;
use monitor_thread::MonitorThread;
use socket_thread::SocketThread;
use worker_thread::WorkerThread;

pub use config::{ConfigError, SchedulerConfig};
pub use monitor_thread::{DeadlockMonitor, StuckDispatch, WorkerMonitor};
pub use wake::{WakeCoordinator, WakePolicy, WakeStats};

/// Error constructing a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// What the host plugs into the scheduler.
pub struct Host {
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Where expired timers are delivered.
    pub sink: Arc<dyn MessageSink>,
    pub poller: Arc<dyn SocketPoller>,
    pub clock: Box<dyn ClockSource>,
}

/// A configured, not yet running, scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    dispatcher: Arc<dyn Dispatcher>,
    poller: Arc<dyn SocketPoller>,
    timers: Arc<TimerService>,
    coordinator: Arc<WakeCoordinator>,
    monitors: Arc<[WorkerMonitor]>,
    deadlock: Arc<DeadlockMonitor>,
}

impl Scheduler {
    /// Builds the shared state. No thread is started yet.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if `config` fails validation.
    pub fn new(config: SchedulerConfig, host: Host) -> Result<Self, SchedulerError> {
        config.validate()?;

        let Host {
            dispatcher,
            sink,
            poller,
            clock,
        } = host;

        let timers = Arc::new(TimerService::new(
            GlobalClock::new(clock),
            sink,
            config.timer_capacity,
        ));
        let coordinator = Arc::new(WakeCoordinator::new(config.worker_count));
        let monitors: Arc<[WorkerMonitor]> = (0..config.worker_count)
            .map(|_| WorkerMonitor::new())
            .collect();
        let deadlock = Arc::new(DeadlockMonitor::new(Arc::clone(&monitors)));

        Ok(Self {
            config,
            dispatcher,
            poller,
            timers,
            coordinator,
            monitors,
            deadlock,
        })
    }

    /// The timer service, for actors that arm timeouts.
    #[must_use]
    pub fn timers(&self) -> Arc<TimerService> {
        Arc::clone(&self.timers)
    }

    #[must_use]
    pub fn coordinator(&self) -> Arc<WakeCoordinator> {
        Arc::clone(&self.coordinator)
    }

    #[must_use]
    pub fn deadlock_monitor(&self) -> Arc<DeadlockMonitor> {
        Arc::clone(&self.deadlock)
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Starts every thread and returns immediately.
    ///
    /// Failing to start a thread aborts the process; a scheduler missing its
    /// clock or part of its pool cannot make progress.
    #[must_use = "join the handle to wait for shutdown"]
    pub fn spawn(self) -> SchedulerHandle {
        let workers = self.config.worker_count;
        let placement = self.config.cpu.resolve(workers);
        info!(
            workers,
            clock_interval_ms = self.config.clock_interval.as_millis() as u64,
            monitor_interval_ms = self.config.monitor_interval.as_millis() as u64,
            placement = %placement.strategy,
            "scheduler starting"
        );

        let mut threads = Vec::with_capacity(workers + 3);

        let monitor = MonitorThread::new(
            Arc::clone(&self.deadlock),
            Arc::clone(&self.dispatcher),
            self.config.monitor_interval,
            self.config.monitor_poll,
        );
        threads.push(spawn_named("cadence-monitor".into(), move || monitor.run()));

        let mut clock = ClockThread::new(
            Arc::clone(&self.timers),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.poller),
            self.config.clock_interval,
        );
        threads.push(spawn_named("cadence-clock".into(), move || clock.run()));

        let socket = SocketThread::new(
            Arc::clone(&self.poller),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.coordinator),
        );
        threads.push(spawn_named("cadence-socket".into(), move || socket.run()));

        for id in 0..workers {
            let worker = WorkerThread::new(
                id,
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.coordinator),
                Arc::clone(&self.monitors),
            );
            let core = placement.core_for(id);
            threads.push(spawn_named(format!("cadence-worker-{id}"), move || {
                if let Some(core) = core {
                    pin_worker(id, core);
                }
                worker.run();
            }));
        }

        debug!(threads = threads.len(), "scheduler threads spawned");

        SchedulerHandle {
            threads,
            coordinator: self.coordinator,
            placement,
        }
    }

    /// Runs the scheduler on the calling thread's behalf and returns after
    /// every thread has exited.
    pub fn start(self) {
        self.spawn().join();
    }
}

fn pin_worker(id: usize, core: usize) {
    if pin_to_core(core) {
        debug!(worker = id, core, "worker pinned");
    } else {
        warn!(worker = id, core, "failed to pin worker");
    }
}

fn spawn_named(name: String, body: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
        debug!("thread started");
        body();
        debug!("thread exiting");
    });
    match spawned {
        Ok(handle) => handle,
        Err(e) => {
            error!(thread = %name, error = %e, "failed to spawn scheduler thread");
            std::process::abort();
        }
    }
}

/// Handle to a running scheduler.
///
/// Dropping it detaches the threads; they still exit once the registry
/// empties.
pub struct SchedulerHandle {
    threads: Vec<JoinHandle<()>>,
    coordinator: Arc<WakeCoordinator>,
    placement: WorkerPlacement,
}

impl SchedulerHandle {
    /// Waits for every scheduler thread to exit.
    pub fn join(self) {
        for handle in self.threads {
            let name = handle.thread().name().unwrap_or("cadence").to_owned();
            if handle.join().is_err() {
                error!(thread = %name, "scheduler thread panicked");
            }
        }
        info!(wake = ?self.coordinator.stats(), "scheduler stopped");
    }

    #[must_use]
    pub fn placement(&self) -> &WorkerPlacement {
        &self.placement
    }

    #[must_use]
    pub fn wake_stats(&self) -> WakeStats {
        self.coordinator.stats()
    }
}
