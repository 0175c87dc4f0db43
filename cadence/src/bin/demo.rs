//! Runs the full scheduler against a toy actor registry.
//!
//! Every actor pings itself through the timer service a fixed number of
//! times, then retires. The process exits once the last actor is gone.
//!
//! # Usage
//!
//! ```sh
//! cadence-demo --workers 4 --actors 100 --rounds 20
//! ```
//!
//! `CADENCE_WORKERS` sets the worker count when `--workers` is absent.
//! Build with `--features tracing` and set `RUST_LOG` to watch the threads.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use cadence::net::NullPoller;
use cadence::runtime::actor::{
    ActorHandle, Dispatcher, Dropped, Message, MessageSink, Session,
};
use cadence::runtime::scheduler::{
    Host, Scheduler, SchedulerConfig, SchedulerError, StuckDispatch, WorkerMonitor,
};
use cadence::runtime::timer::TimerService;
use cadence::runtime::timing::MonotonicSource;

const DEFAULT_ACTORS: u32 = 16;
const DEFAULT_ROUNDS: u32 = 10;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("{0}")]
    Usage(String),
    #[error("timer service attached twice")]
    TimersAttached,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

struct Options {
    workers: Option<usize>,
    actors: u32,
    rounds: u32,
}

/// One global run queue, one counter of remaining pings per actor.
#[derive(Default)]
struct ToyRegistry {
    queue: Mutex<VecDeque<(ActorHandle, Message)>>,
    remaining: Mutex<HashMap<ActorHandle, u32>>,
    timers: OnceLock<Arc<TimerService>>,
}

impl ToyRegistry {
    fn attach_timers(&self, timers: Arc<TimerService>) -> Result<(), DemoError> {
        self.timers
            .set(timers)
            .map_err(|_| DemoError::TimersAttached)
    }

    fn spawn_actor(&self, handle: ActorHandle, rounds: u32) {
        self.remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, rounds);
    }

    fn handle(&self, target: ActorHandle, message: &Message) {
        let left = {
            let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(left) = remaining.get_mut(&target) else {
                return;
            };
            *left = left.saturating_sub(1);
            if *left == 0 {
                remaining.remove(&target);
                return;
            }
            *left
        };

        let Some(timers) = self.timers.get() else {
            return;
        };
        let delay = target.get() % 5 + 1;
        let session = Session::new(message.session.get().wrapping_add(1));
        if let Err(e) = timers.schedule_timeout(target, delay, session) {
            eprintln!("cadence-demo: {target} failed to arm timeout ({left} left): {e}");
        }
    }
}

impl MessageSink for ToyRegistry {
    fn push_message(&self, target: ActorHandle, message: Message) -> Result<(), Dropped> {
        let alive = self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&target);
        if !alive {
            return Err(Dropped(target));
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((target, message));
        Ok(())
    }
}

impl Dispatcher for ToyRegistry {
    fn dispatch_one(&self, monitor: &WorkerMonitor) -> bool {
        let next = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((target, message)) = next else {
            return false;
        };
        monitor.trigger(message.source, target);
        self.handle(target, &message);
        monitor.trigger(ActorHandle::SYSTEM, ActorHandle::SYSTEM);
        true
    }

    fn actor_count(&self) -> usize {
        self.remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn mark_endless(&self, stuck: &StuckDispatch) {
        eprintln!(
            "cadence-demo: worker {} stuck dispatching {} -> {}",
            stuck.worker, stuck.source, stuck.destination
        );
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("cadence-demo: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    cadence::init_tracing();

    let mut config = SchedulerConfig::default();
    if let Some(workers) = options.workers {
        config.worker_count = workers;
    }

    let registry = Arc::new(ToyRegistry::default());
    for raw in 1..=options.actors {
        registry.spawn_actor(ActorHandle::new(raw), options.rounds);
    }

    let scheduler = Scheduler::new(
        config,
        Host {
            dispatcher: registry.clone(),
            sink: registry.clone(),
            poller: Arc::new(NullPoller::new()),
            clock: Box::new(MonotonicSource::new()),
        },
    )?;
    let timers = scheduler.timers();
    registry.attach_timers(Arc::clone(&timers))?;

    // Kick every actor once; from then on they drive themselves.
    for raw in 1..=options.actors {
        let handle = ActorHandle::new(raw);
        if let Err(e) = timers.schedule_timeout(handle, 0, Session::new(0)) {
            eprintln!("cadence-demo: {e}");
        }
    }

    eprintln!(
        "cadence-demo: {} actors x {} rounds on {} workers",
        options.actors,
        options.rounds,
        scheduler.config().worker_count
    );

    let started = minstant::Instant::now();
    let coordinator = scheduler.coordinator();
    scheduler.start();
    let wake = coordinator.stats();

    let stats = timers.stats();
    eprintln!(
        "cadence-demo: done in {:?}: {} timeouts scheduled, {} delivered, {} dropped",
        started.elapsed(),
        stats.scheduled,
        stats.delivered,
        stats.dropped
    );
    eprintln!(
        "cadence-demo: {} wake signals, {} sleeps, final tick {}",
        wake.signals,
        wake.sleeps,
        timers.current_tick()
    );
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Options, DemoError> {
    let mut options = Options {
        workers: std::env::var("CADENCE_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok()),
        actors: DEFAULT_ACTORS,
        rounds: DEFAULT_ROUNDS,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--workers" | "-w" => options.workers = Some(value(args, i, flag)?),
            "--actors" | "-a" => options.actors = value(args, i, flag)?,
            "--rounds" | "-r" => options.rounds = value(args, i, flag)?,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            arg => return Err(DemoError::Usage(format!("unknown argument: {arg}"))),
        }
        i += 2;
    }
    Ok(options)
}

fn value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, DemoError>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(i + 1)
        .ok_or_else(|| DemoError::Usage(format!("missing value for {flag}")))?;
    raw.parse()
        .map_err(|e| DemoError::Usage(format!("invalid value for {flag}: {e}")))
}

fn print_usage() {
    eprintln!(
        "Usage: cadence-demo [OPTIONS]

Options:
  -w, --workers <N>   Worker threads (default: $CADENCE_WORKERS or all cores)
  -a, --actors <N>    Actors to spawn (default: {DEFAULT_ACTORS})
  -r, --rounds <N>    Timeouts each actor arms before retiring (default: {DEFAULT_ROUNDS})
  -h, --help          Print this help"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::runtime::timing::{GlobalClock, ManualSource};
    use core::num::NonZeroUsize;

    #[test]
    fn second_timer_attach_is_refused() {
        let registry = Arc::new(ToyRegistry::default());
        let timers = Arc::new(TimerService::new(
            GlobalClock::new(Box::new(ManualSource::new(0, 0))),
            registry.clone(),
            NonZeroUsize::new(8).unwrap(),
        ));
        assert!(registry.attach_timers(Arc::clone(&timers)).is_ok());
        assert!(matches!(
            registry.attach_timers(timers),
            Err(DemoError::TimersAttached)
        ));
    }

    #[test]
    fn rejects_unknown_arguments() {
        let args = vec!["cadence-demo".to_owned(), "--bogus".to_owned()];
        assert!(matches!(parse_args(&args), Err(DemoError::Usage(_))));
    }
}
