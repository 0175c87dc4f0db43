//! Scheduler configuration.
//!
//! # Tuning Guidelines
//!
//! - `clock_interval` bounds both timer resolution and how long a lost wakeup
//!   can leave work sitting in a mailbox. The default matches the
//!   centisecond tick.
//! - `monitor_interval` is how long a dispatch must run before it is reported.
//!   `monitor_poll` only affects how quickly the monitor notices shutdown.

use core::num::NonZeroUsize;
use std::time::Duration;

use crate::runtime::timing::wheel::DEFAULT_CAPACITY;
use crate::runtime::topology::CpuConfig;

const RESPONSIVE_CAPACITY: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Invalid [`SchedulerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("worker count must be > 0")]
    NoWorkers,
    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),
    #[error("monitor poll step {poll:?} exceeds monitor interval {interval:?}")]
    PollExceedsInterval { poll: Duration, interval: Duration },
    #[error("manual placement lists {cores} cores for {workers} workers")]
    CoreCountMismatch { cores: usize, workers: usize },
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    ///
    /// **Default**: available parallelism.
    pub worker_count: usize,

    /// Sleep between clock advances. Every advance also nudges one worker.
    ///
    /// **Default**: 10ms
    pub clock_interval: Duration,

    /// How often the deadlock monitor audits the workers. A dispatch is
    /// reported once it has made no progress across one full interval.
    ///
    /// **Default**: 5s
    pub monitor_interval: Duration,

    /// Granularity at which the monitor checks for shutdown while waiting.
    ///
    /// **Default**: 1s
    pub monitor_poll: Duration,

    /// Initial timer slot count. The wheel grows past it on demand.
    ///
    /// **Default**: 1024
    pub timer_capacity: NonZeroUsize,

    /// Worker CPU placement.
    ///
    /// **Default**: [`CpuConfig::Auto`]
    pub cpu: CpuConfig,
}

impl SchedulerConfig {
    /// Default configuration with an explicit worker count.
    #[must_use]
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Short intervals and no pinning, so a scheduler in a test shuts down
    /// within milliseconds of its registry emptying.
    #[must_use]
    pub fn responsive() -> Self {
        Self {
            worker_count: 2,
            clock_interval: Duration::from_millis(1),
            monitor_interval: Duration::from_millis(50),
            monitor_poll: Duration::from_millis(5),
            timer_capacity: RESPONSIVE_CAPACITY,
            cpu: CpuConfig::Disabled,
        }
    }

    /// # Errors
    ///
    /// Returns the first problem found, see [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        for (name, interval) in [
            ("clock_interval", self.clock_interval),
            ("monitor_interval", self.monitor_interval),
            ("monitor_poll", self.monitor_poll),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.monitor_poll > self.monitor_interval {
            return Err(ConfigError::PollExceedsInterval {
                poll: self.monitor_poll,
                interval: self.monitor_interval,
            });
        }
        if let CpuConfig::Manual(cores) = &self.cpu {
            if cores.len() != self.worker_count {
                return Err(ConfigError::CoreCountMismatch {
                    cores: cores.len(),
                    workers: self.worker_count,
                });
            }
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            clock_interval: Duration::from_millis(10),
            monitor_interval: Duration::from_secs(5),
            monitor_poll: Duration::from_secs(1),
            timer_capacity: DEFAULT_CAPACITY,
            cpu: CpuConfig::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.clock_interval, Duration::from_millis(10));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn responsive_is_valid() {
        assert_eq!(SchedulerConfig::responsive().validate(), Ok(()));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = SchedulerConfig::with_workers(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::NoWorkers);
    }

    #[test]
    fn zero_interval_rejected() {
        let config = SchedulerConfig {
            clock_interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval("clock_interval"))
        );
    }

    #[test]
    fn poll_longer_than_interval_rejected() {
        let config = SchedulerConfig {
            monitor_interval: Duration::from_millis(100),
            monitor_poll: Duration::from_millis(200),
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PollExceedsInterval { .. })
        ));
    }

    #[test]
    fn manual_core_list_must_match_workers() {
        let config = SchedulerConfig {
            cpu: CpuConfig::Manual(vec![0, 1]),
            ..SchedulerConfig::with_workers(3)
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::CoreCountMismatch { cores: 2, workers: 3 })
        );
    }
}
