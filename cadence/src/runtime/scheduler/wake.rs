//! Sleep/wakeup protocol shared by the worker pool.
//!
//! Workers that find nothing to dispatch park on one condition variable and
//! are counted while they sleep. Producers of work (the clock and the socket
//! poller) decide from that count whether a signal is worth sending, so a
//! burst of events does not turn into a burst of context switches.
//!
//! A wakeup never means there is work. Workers always go back to the
//! dispatcher after waking, so spurious and redundant wakeups are harmless,
//! and a signal lost between a worker's last dispatch attempt and its sleep is
//! made good by the clock thread's next periodic wake.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// How many workers a waker wants to keep busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakePolicy {
    /// Signal only when the whole pool is asleep. Used by the socket poller so
    /// that one readiness event cannot fan out into several wakeups.
    IdleOnly,
    /// Signal whenever at least one worker sleeps. Used by the clock thread on
    /// every advance so a worker is always at hand for freshly fired timers.
    KeepOneIdle,
}

impl WakePolicy {
    /// Workers this policy tolerates being active without signaling.
    #[must_use]
    pub const fn target_active(self, pool_size: usize) -> usize {
        match self {
            Self::IdleOnly => 0,
            Self::KeepOneIdle => pool_size.saturating_sub(1),
        }
    }
}

#[derive(Debug)]
struct SleepState {
    sleeping: usize,
    shutdown: bool,
}

/// Counters for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeStats {
    /// `notify_one` calls issued by [`WakeCoordinator::wake`].
    pub signals: u64,
    /// Times a worker went to sleep.
    pub sleeps: u64,
}

/// Mutex/condvar pair plus the sleeping-worker count.
#[derive(Debug)]
pub struct WakeCoordinator {
    pool_size: usize,
    state: Mutex<SleepState>,
    cond: Condvar,
    signals: AtomicU64,
    sleeps: AtomicU64,
}

impl WakeCoordinator {
    #[must_use]
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            state: Mutex::new(SleepState {
                sleeping: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
            signals: AtomicU64::new(0),
            sleeps: AtomicU64::new(0),
        }
    }

    // The guarded data is a counter and a flag; a panic elsewhere cannot
    // leave it inconsistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, SleepState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Workers currently parked.
    #[must_use]
    pub fn sleeping(&self) -> usize {
        self.lock().sleeping
    }

    /// Signals one sleeper iff `sleeping >= pool_size - target_active`.
    /// Returns whether a signal was sent.
    pub fn wake(&self, policy: WakePolicy) -> bool {
        let threshold = self.pool_size - policy.target_active(self.pool_size);
        let state = self.lock();
        if state.sleeping >= threshold && state.sleeping > 0 {
            self.cond.notify_one();
            self.signals.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Parks the calling worker until signaled (or spuriously woken).
    ///
    /// Returns immediately once [`shutdown`](Self::shutdown) has been called.
    pub fn sleep(&self) {
        let mut state = self.lock();
        if state.shutdown {
            return;
        }
        state.sleeping += 1;
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        let mut state = self
            .cond
            .wait(state)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.sleeping -= 1;
    }

    /// Marks the pool as shutting down and releases every sleeper.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        self.cond.notify_all();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    #[must_use]
    pub fn stats(&self) -> WakeStats {
        WakeStats {
            signals: self.signals.load(Ordering::Relaxed),
            sleeps: self.sleeps.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for_sleepers(coordinator: &WakeCoordinator, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while coordinator.sleeping() < n {
            assert!(Instant::now() < deadline, "workers never went to sleep");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn park(coordinator: &Arc<WakeCoordinator>, n: usize) -> Vec<thread::JoinHandle<()>> {
        (0..n)
            .map(|_| {
                let c = Arc::clone(coordinator);
                thread::spawn(move || c.sleep())
            })
            .collect()
    }

    #[test]
    fn idle_only_does_not_signal_a_busy_pool() {
        let c = WakeCoordinator::new(4);
        assert!(!c.wake(WakePolicy::IdleOnly));
        assert_eq!(c.stats().signals, 0);
    }

    #[test]
    fn idle_only_signals_once_when_all_sleep() {
        let c = Arc::new(WakeCoordinator::new(4));
        let handles = park(&c, 4);
        wait_for_sleepers(&c, 4);

        assert!(c.wake(WakePolicy::IdleOnly));
        assert_eq!(c.stats().signals, 1);

        c.shutdown();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn keep_one_idle_signals_with_a_single_sleeper() {
        let c = Arc::new(WakeCoordinator::new(4));
        let handles = park(&c, 1);
        wait_for_sleepers(&c, 1);

        assert!(!c.wake(WakePolicy::IdleOnly), "three workers still busy");
        assert!(c.wake(WakePolicy::KeepOneIdle));

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.sleeping(), 0);
    }

    #[test]
    fn nobody_asleep_means_no_signal_for_any_policy() {
        let c = WakeCoordinator::new(1);
        assert!(!c.wake(WakePolicy::KeepOneIdle));
        assert!(!c.wake(WakePolicy::IdleOnly));
    }

    #[test]
    fn sleep_after_shutdown_returns_immediately() {
        let c = WakeCoordinator::new(2);
        c.shutdown();
        c.sleep();
        assert!(c.is_shutdown());
        assert_eq!(c.stats().sleeps, 0);
    }

    #[test]
    fn target_active_per_policy() {
        assert_eq!(WakePolicy::IdleOnly.target_active(8), 0);
        assert_eq!(WakePolicy::KeepOneIdle.target_active(8), 7);
    }
}
