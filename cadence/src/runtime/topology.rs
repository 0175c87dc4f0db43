//! CPU topology detection and worker placement.
//!
//! Only worker threads are ever pinned. The monitor, clock and socket threads
//! spend nearly all their time asleep and are left to the OS scheduler.
//!
//! # Placement Strategy
//!
//! - **Spread**: at least as many physical cores as workers. Worker `i` gets
//!   core `i`; on most systems core IDs 0..N are distinct physical cores
//!   before SMT siblings are enumerated.
//! - **SmtShare**: enough logical cores but not enough physical ones. Same
//!   assignment, some workers end up on SMT siblings.
//! - **NoPin**: more workers than logical cores. Pinning would only stack
//!   workers on the same core.
//!
//! # Detection
//!
//! Uses `num_cpus` for physical/logical core counts and `core_affinity` for
//! the available core IDs and for pinning.

use core_affinity::CoreId;

/// CPU topology information detected at runtime.
#[derive(Debug, Clone)]
pub struct CpuTopology {
    /// Total logical cores (including SMT/hyperthreads).
    pub logical_cores: usize,
    /// Total physical cores.
    pub physical_cores: usize,
    /// Available core IDs for pinning.
    pub available_cores: Vec<usize>,
}

impl CpuTopology {
    /// Detects the CPU topology of the current system.
    #[must_use]
    pub fn detect() -> Self {
        let logical_cores = num_cpus::get();
        let physical_cores = num_cpus::get_physical();

        let available_cores = core_affinity::get_core_ids()
            .map(|ids| ids.into_iter().map(|id| id.id).collect())
            .unwrap_or_else(|| (0..logical_cores).collect());

        Self {
            logical_cores,
            physical_cores,
            available_cores,
        }
    }

    #[must_use]
    pub fn has_smt(&self) -> bool {
        self.logical_cores > self.physical_cores
    }

    /// Chooses a core (or none) for each of `workers` worker threads.
    #[must_use]
    pub fn select_placement(&self, workers: usize) -> WorkerPlacement {
        let available = &self.available_cores;
        let strategy = if workers > available.len() {
            PlacementStrategy::NoPin
        } else if workers <= self.physical_cores {
            PlacementStrategy::Spread
        } else {
            PlacementStrategy::SmtShare
        };

        let cores = match strategy {
            PlacementStrategy::Spread | PlacementStrategy::SmtShare => {
                available.iter().take(workers).copied().map(Some).collect()
            }
            _ => vec![None; workers],
        };

        WorkerPlacement { cores, strategy }
    }
}

/// Core assignment for every worker, by worker index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlacement {
    cores: Vec<Option<usize>>,
    pub strategy: PlacementStrategy,
}

impl WorkerPlacement {
    #[must_use]
    pub fn unpinned(workers: usize) -> Self {
        Self {
            cores: vec![None; workers],
            strategy: PlacementStrategy::NoPin,
        }
    }

    #[must_use]
    pub fn manual(cores: &[usize]) -> Self {
        Self {
            cores: cores.iter().copied().map(Some).collect(),
            strategy: PlacementStrategy::Manual,
        }
    }

    /// Core for worker `worker`, `None` if it runs unpinned.
    #[must_use]
    pub fn core_for(&self, worker: usize) -> Option<usize> {
        self.cores.get(worker).copied().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

/// Strategy used for worker placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// One worker per physical core.
    Spread,
    /// One worker per logical core, sharing physical cores via SMT.
    SmtShare,
    /// No pinning (fallback).
    NoPin,
    /// Manual assignment by user.
    Manual,
}

impl std::fmt::Display for PlacementStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spread => write!(f, "spread"),
            Self::SmtShare => write!(f, "smt-share"),
            Self::NoPin => write!(f, "no-pin"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Configuration for CPU pinning behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CpuConfig {
    /// Auto-detect topology and choose a placement.
    #[default]
    Auto,
    /// One core per worker, by worker index.
    Manual(Vec<usize>),
    /// Disable CPU pinning entirely.
    Disabled,
}

impl CpuConfig {
    /// Resolves the config to a concrete placement for `workers` workers.
    #[must_use]
    pub fn resolve(&self, workers: usize) -> WorkerPlacement {
        match self {
            Self::Auto => CpuTopology::detect().select_placement(workers),
            Self::Manual(cores) => WorkerPlacement::manual(cores),
            Self::Disabled => WorkerPlacement::unpinned(workers),
        }
    }
}

/// Pins the current thread to the specified core.
///
/// Returns `true` if pinning succeeded, `false` otherwise.
/// Pinning may fail if the core ID is invalid or the OS denies the request.
pub fn pin_to_core(core_id: usize) -> bool {
    core_affinity::set_for_current(CoreId { id: core_id })
}
