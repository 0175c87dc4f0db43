//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::thread;
use std::time::Duration;

use cadence::runtime::actor::{ActorHandle, Dispatcher, Dropped, Message, MessageSink, Session};
use cadence::runtime::scheduler::{StuckDispatch, WorkerMonitor};
use cadence::runtime::timer::TimerService;

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        cadence::trace::init_tracing_with("cadence=debug");
    });
}

/// What a fake actor does with each message it receives.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Arms a timeout to itself after every message until `rounds` messages
    /// have been handled, then retires.
    PingSelf { rounds: u32, delay_centis: u32 },
    /// Blocks its worker for the given time on the first message, then
    /// retires.
    Stall(Duration),
    /// Retires on the first message.
    RetireOnMessage,
}

struct Actor {
    behavior: Behavior,
    handled: u32,
}

/// In-memory registry: one global run queue, actors keyed by handle.
#[derive(Default)]
pub struct FakeRegistry {
    queue: Mutex<VecDeque<(ActorHandle, Message)>>,
    actors: Mutex<HashMap<ActorHandle, Actor>>,
    received: Mutex<Vec<(ActorHandle, Message)>>,
    endless: Mutex<Vec<StuckDispatch>>,
    timers: OnceLock<Arc<TimerService>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn(&self, raw: u32, behavior: Behavior) -> ActorHandle {
        let handle = ActorHandle::new(raw);
        self.actors.lock().unwrap().insert(
            handle,
            Actor {
                behavior,
                handled: 0,
            },
        );
        handle
    }

    pub fn attach_timers(&self, timers: Arc<TimerService>) {
        assert!(self.timers.set(timers).is_ok(), "timers attached twice");
    }

    /// Every message dispatched so far, in dispatch order.
    pub fn received(&self) -> Vec<(ActorHandle, Message)> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_by(&self, handle: ActorHandle) -> Vec<Message> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Stalls the monitor thread flagged, in report order.
    pub fn endless(&self) -> Vec<StuckDispatch> {
        self.endless.lock().unwrap().clone()
    }

    fn handle(&self, target: ActorHandle, message: &Message) {
        let (behavior, handled) = {
            let mut actors = self.actors.lock().unwrap();
            let Some(actor) = actors.get_mut(&target) else {
                return;
            };
            actor.handled += 1;
            (actor.behavior, actor.handled)
        };

        let retire = match behavior {
            Behavior::PingSelf {
                rounds,
                delay_centis,
            } => {
                if handled >= rounds {
                    true
                } else {
                    let timers = self.timers.get().expect("timers attached");
                    let next = Session::new(message.session.get() + 1);
                    timers
                        .schedule_timeout(target, delay_centis, next)
                        .expect("schedule timeout");
                    false
                }
            }
            Behavior::Stall(duration) => {
                thread::sleep(duration);
                true
            }
            Behavior::RetireOnMessage => true,
        };

        if retire {
            self.actors.lock().unwrap().remove(&target);
        }
    }
}

impl MessageSink for FakeRegistry {
    fn push_message(&self, target: ActorHandle, message: Message) -> Result<(), Dropped> {
        if !self.actors.lock().unwrap().contains_key(&target) {
            return Err(Dropped(target));
        }
        self.queue.lock().unwrap().push_back((target, message));
        Ok(())
    }
}

impl Dispatcher for FakeRegistry {
    fn dispatch_one(&self, monitor: &WorkerMonitor) -> bool {
        let Some((target, message)) = self.queue.lock().unwrap().pop_front() else {
            return false;
        };
        monitor.trigger(message.source, target);
        self.received
            .lock()
            .unwrap()
            .push((target, message.clone()));
        self.handle(target, &message);
        monitor.trigger(ActorHandle::SYSTEM, ActorHandle::SYSTEM);
        true
    }

    fn actor_count(&self) -> usize {
        self.actors.lock().unwrap().len()
    }

    fn mark_endless(&self, stuck: &StuckDispatch) {
        self.endless.lock().unwrap().push(*stuck);
    }
}

/// Sink that records every delivery and refuses nothing.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(ActorHandle, Message)>>,
}

impl RecordingSink {
    pub fn count_for(&self, handle: ActorHandle) -> usize {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == handle)
            .count()
    }
}

impl MessageSink for RecordingSink {
    fn push_message(&self, target: ActorHandle, message: Message) -> Result<(), Dropped> {
        self.delivered.lock().unwrap().push((target, message));
        Ok(())
    }
}
