//! # Injector options.
//!
//! Provides [`InjectorOpts`], the process-wide settings attached to a root scope
//! and inherited read-only by every descendant.
//!
//! Options are used in two ways:
//! 1. **Root creation**: `RootScope::with_opts(opts)` (fixed for the root's lifetime)
//! 2. **Cloning**: `RootScope::clone_root()` copies them, `clone_with_opts()` replaces them
//!
//! ## Sentinel values
//! - `health_check_parallelism = 0` → unbounded (no worker pool created)
//! - `health_check_timeout = 0s` → no per-check bound
//! - `health_check_global_timeout = 0s` → no global bound

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::scope::Scope;

/// Observability hook invoked with the scope and the service name.
///
/// Hooks run inline on the calling task: keep them short and non-blocking.
pub type Hook = Arc<dyn Fn(&Scope, &str) + Send + Sync>;

/// Formatted logging sink.
pub type LogSink = Arc<dyn Fn(fmt::Arguments<'_>) + Send + Sync>;

/// Process-wide configuration of a scope tree.
///
/// ## Field semantics
/// - `health_check_parallelism`: max concurrent health checks (`0` = unbounded)
/// - `health_check_global_timeout`: bound for a whole health-check round (`0s` = none)
/// - `health_check_timeout`: bound for each individual check (`0s` = none)
/// - `hook_after_registration`: called after a service is provided
/// - `hook_after_shutdown`: called after each service's shutdown attempt
/// - `logf`: diagnostic sink, never absent
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone)]
pub struct InjectorOpts {
    /// Maximum number of health checks executing at any instant.
    ///
    /// - `0` = unbounded (every check starts immediately)
    /// - `n > 0` = at most `n` checks run; the rest wait FIFO for a permit
    pub health_check_parallelism: usize,

    /// Bound applied to a whole `health_check_with_context` round.
    pub health_check_global_timeout: Duration,

    /// Bound applied to each individual check.
    pub health_check_timeout: Duration,

    /// Invoked with `(scope, service name)` after a service is registered.
    pub hook_after_registration: Option<Hook>,

    /// Invoked with `(scope, service name)` after a service's shutdown attempt.
    pub hook_after_shutdown: Option<Hook>,

    /// Diagnostic sink. Defaults to [`default_logf`].
    pub logf: LogSink,
}

impl InjectorOpts {
    /// Returns the health-check concurrency limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` concurrent checks
    #[inline]
    pub fn parallelism_limit(&self) -> Option<usize> {
        if self.health_check_parallelism == 0 {
            None
        } else {
            Some(self.health_check_parallelism)
        }
    }

    /// Returns the per-check timeout as an `Option`.
    #[inline]
    pub fn check_timeout(&self) -> Option<Duration> {
        if self.health_check_timeout == Duration::ZERO {
            None
        } else {
            Some(self.health_check_timeout)
        }
    }

    /// Returns the global timeout as an `Option`.
    #[inline]
    pub fn global_timeout(&self) -> Option<Duration> {
        if self.health_check_global_timeout == Duration::ZERO {
            None
        } else {
            Some(self.health_check_global_timeout)
        }
    }

    /// Writes one formatted line to the configured sink.
    #[inline]
    pub(crate) fn log(&self, args: fmt::Arguments<'_>) {
        (self.logf)(args);
    }

    pub(crate) fn after_registration(&self, scope: &Scope, service: &str) {
        if let Some(hook) = &self.hook_after_registration {
            hook(scope, service);
        }
    }

    pub(crate) fn after_shutdown(&self, scope: &Scope, service: &str) {
        if let Some(hook) = &self.hook_after_shutdown {
            hook(scope, service);
        }
    }
}

impl Default for InjectorOpts {
    /// Default configuration:
    ///
    /// - `health_check_parallelism = 0` (unbounded)
    /// - `health_check_global_timeout = 0s` (none)
    /// - `health_check_timeout = 0s` (none)
    /// - no hooks
    /// - `logf = default_logf()`
    fn default() -> Self {
        Self {
            health_check_parallelism: 0,
            health_check_global_timeout: Duration::ZERO,
            health_check_timeout: Duration::ZERO,
            hook_after_registration: None,
            hook_after_shutdown: None,
            logf: default_logf(),
        }
    }
}

impl fmt::Debug for InjectorOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorOpts")
            .field("health_check_parallelism", &self.health_check_parallelism)
            .field(
                "health_check_global_timeout",
                &self.health_check_global_timeout,
            )
            .field("health_check_timeout", &self.health_check_timeout)
            .field(
                "hook_after_registration",
                &self.hook_after_registration.is_some(),
            )
            .field("hook_after_shutdown", &self.hook_after_shutdown.is_some())
            .finish_non_exhaustive()
    }
}

/// Default log sink.
///
/// Forwards to `tracing::debug!` (target `scopevisor`) with the `logging` feature,
/// discards otherwise.
pub fn default_logf() -> LogSink {
    #[cfg(feature = "logging")]
    {
        Arc::new(|args: fmt::Arguments<'_>| {
            tracing::debug!(target: "scopevisor", "{}", args);
        })
    }
    #[cfg(not(feature = "logging"))]
    {
        Arc::new(|_args: fmt::Arguments<'_>| {})
    }
}
