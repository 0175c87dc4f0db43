//! Socket thread: pumps the poller and wakes a worker when everyone sleeps.

use std::sync::Arc;

use crate::net::{PollOutcome, SocketPoller};
use crate::runtime::actor::Dispatcher;
use crate::runtime::scheduler::wake::{WakeCoordinator, WakePolicy};
use crate::trace::{debug, trace};

pub struct SocketThread {
    poller: Arc<dyn SocketPoller>,
    dispatcher: Arc<dyn Dispatcher>,
    coordinator: Arc<WakeCoordinator>,
}

impl SocketThread {
    pub fn new(
        poller: Arc<dyn SocketPoller>,
        dispatcher: Arc<dyn Dispatcher>,
        coordinator: Arc<WakeCoordinator>,
    ) -> Self {
        Self {
            poller,
            dispatcher,
            coordinator,
        }
    }

    pub fn run(&self) {
        loop {
            match self.poller.poll() {
                PollOutcome::Exit => break,
                PollOutcome::Transient => {
                    if self.dispatcher.actor_count() == 0 {
                        break;
                    }
                    trace!("transient poll error, retrying");
                }
                PollOutcome::Processed => {
                    self.coordinator.wake(WakePolicy::IdleOnly);
                }
            }
        }
        debug!("socket loop finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::scheduler::stub::{StubDispatcher, wait_until};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Replays a fixed list of outcomes, then reports `Exit`.
    struct ScriptedPoller {
        script: Mutex<VecDeque<PollOutcome>>,
        polls: AtomicUsize,
    }

    impl ScriptedPoller {
        fn new(script: impl IntoIterator<Item = PollOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                polls: AtomicUsize::new(0),
            })
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl SocketPoller for ScriptedPoller {
        fn poll(&self) -> PollOutcome {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PollOutcome::Exit)
        }

        fn request_exit(&self) {}
    }

    fn socket(poller: &Arc<ScriptedPoller>, alive: usize, coordinator: &Arc<WakeCoordinator>) -> SocketThread {
        SocketThread::new(
            Arc::clone(poller) as Arc<dyn SocketPoller>,
            Arc::new(StubDispatcher::with_actors(alive)),
            Arc::clone(coordinator),
        )
    }

    fn park(coordinator: &Arc<WakeCoordinator>, n: usize) -> Vec<thread::JoinHandle<()>> {
        (0..n)
            .map(|_| {
                let c = Arc::clone(coordinator);
                thread::spawn(move || {
                    while !c.is_shutdown() {
                        c.sleep();
                    }
                })
            })
            .collect()
    }

    #[test]
    fn transient_error_stops_once_registry_is_empty() {
        let poller = ScriptedPoller::new([PollOutcome::Transient, PollOutcome::Transient]);
        let coordinator = Arc::new(WakeCoordinator::new(1));
        socket(&poller, 0, &coordinator).run();
        assert_eq!(poller.polls(), 1);
    }

    #[test]
    fn transient_error_retries_while_actors_live() {
        let poller = ScriptedPoller::new([PollOutcome::Transient, PollOutcome::Transient]);
        let coordinator = Arc::new(WakeCoordinator::new(1));
        socket(&poller, 1, &coordinator).run();
        assert_eq!(poller.polls(), 3);
        assert_eq!(coordinator.stats().signals, 0);
    }

    #[test]
    fn processed_event_wakes_an_idle_pool() {
        let coordinator = Arc::new(WakeCoordinator::new(1));
        let sleepers = park(&coordinator, 1);
        wait_until("one sleeper", || coordinator.sleeping() == 1);

        let poller = ScriptedPoller::new([PollOutcome::Processed]);
        socket(&poller, 1, &coordinator).run();
        assert_eq!(coordinator.stats().signals, 1);

        coordinator.shutdown();
        for s in sleepers {
            s.join().unwrap();
        }
    }

    #[test]
    fn processed_event_leaves_a_busy_pool_alone() {
        let coordinator = Arc::new(WakeCoordinator::new(2));
        let sleepers = park(&coordinator, 1);
        wait_until("one sleeper", || coordinator.sleeping() == 1);

        let poller = ScriptedPoller::new([PollOutcome::Processed]);
        socket(&poller, 1, &coordinator).run();
        assert_eq!(coordinator.stats().signals, 0);

        coordinator.shutdown();
        for s in sleepers {
            s.join().unwrap();
        }
    }
}
