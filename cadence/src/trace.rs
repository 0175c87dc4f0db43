//! Logging for the scheduler threads.
//!
//! Built on `tracing` when the `tracing` feature is enabled. Without the
//! feature every log macro expands to dead code that is type-checked but never
//! run, so the hot dispatch and tick paths carry no logging cost in default
//! builds.

/// Installs a `tracing-subscriber` formatter for the process.
///
/// Honors `RUST_LOG`; falls back to `cadence=info`. Safe to call more than
/// once: later calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    init_tracing_with("cadence=info");
}

/// Like [`init_tracing`], with an explicit fallback directive used when
/// `RUST_LOG` is unset or invalid.
#[cfg(feature = "tracing")]
pub fn init_tracing_with(default_directive: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing_with(_default_directive: &str) {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

// Type-checks and borrows every argument without evaluating it, so values
// that only feed log statements stay "used" with the feature off.
#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    (@split [$($field:tt)*] , $($rest:tt)*) => {
        $crate::trace::discard!(@field $($field)*);
        $crate::trace::discard!(@split [] $($rest)*);
    };
    (@split [$($field:tt)*] $next:tt $($rest:tt)*) => {
        $crate::trace::discard!(@split [$($field)* $next] $($rest)*);
    };
    (@split [$($field:tt)*]) => {
        $crate::trace::discard!(@field $($field)*);
    };
    (@field) => {};
    (@field $name:ident = % $($value:tt)+) => { let _ = &($($value)+); };
    (@field $name:ident = ? $($value:tt)+) => { let _ = &($($value)+); };
    (@field $name:ident = $($value:tt)+) => { let _ = &($($value)+); };
    (@field % $($value:tt)+) => { let _ = &($($value)+); };
    (@field ? $($value:tt)+) => { let _ = &($($value)+); };
    (@field $($value:tt)+) => { let _ = &($($value)+); };
    ($($arg:tt)*) => {
        if false {
            $crate::trace::discard!(@split [] $($arg)*);
        }
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard;

#[cfg(not(feature = "tracing"))]
pub(crate) use {
    discard as debug, discard as error, discard as info, discard as trace, discard as warn,
};

#[cfg(all(test, not(feature = "tracing")))]
mod tests {
    #[test]
    fn disabled_macros_do_not_evaluate_arguments() {
        let mut calls = 0;
        let mut bump = || {
            calls += 1;
            calls
        };
        crate::trace::info!(value = bump(), "message {}", 1);
        crate::trace::debug!(%calls, "plain message");
        assert_eq!(calls, 0);
    }
}
