//! Error types used by the scope tree, the health-check orchestrator and the shutdown coordinator.
//!
//! This module defines:
//!
//! - [`ScopeError`] - scope tree contract violations (invalid name, destroyed scope).
//! - [`ServiceError`] - registration and resolution failures.
//! - [`HealthCheckError`] - per-service health-check outcomes other than success.
//! - [`ShutdownError`] - per-service shutdown failures.
//! - [`RuntimeError`] - process-level failures (aggregate shutdown failure, signal wiring).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

use crate::deadline::DeadlineReason;

/// # Errors produced by scope tree operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Scope names must be non-empty and must not contain `/` (used as path separator).
    #[error("invalid scope name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The scope was destroyed by a shutdown of one of its ancestors.
    #[error("scope `{name}` has been destroyed")]
    Destroyed {
        /// Name of the destroyed scope.
        name: String,
    },
}

impl ScopeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScopeError::InvalidName { .. } => "scope_invalid_name",
            ScopeError::Destroyed { .. } => "scope_destroyed",
        }
    }
}

/// # Errors produced by service registration and resolution.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Service names must be non-empty and must not contain `/` (used as path separator).
    #[error("invalid service name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A service with the same name already exists in this scope.
    #[error("service `{name}` has already been declared")]
    AlreadyDeclared {
        /// Service name.
        name: String,
    },

    /// No scope in the ancestor chain provides the service.
    #[error("could not find service `{name}`, available services: {available:?}")]
    NotFound {
        /// Requested service name.
        name: String,
        /// Names visible from the requesting scope (sorted).
        available: Vec<String>,
    },

    /// The service exists but holds a value of another type.
    #[error("service `{name}` is not of type `{expected}`")]
    TypeMismatch {
        /// Service name.
        name: String,
        /// Requested type name.
        expected: &'static str,
    },

    /// A lazy provider returned an error while building the service.
    #[error("provider of service `{name}` failed: {source}")]
    Provider {
        /// Service name.
        name: String,
        /// Error returned by the provider.
        #[source]
        source: anyhow::Error,
    },

    /// The owning scope has been destroyed.
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::InvalidName { .. } => "service_invalid_name",
            ServiceError::AlreadyDeclared { .. } => "service_already_declared",
            ServiceError::NotFound { .. } => "service_not_found",
            ServiceError::TypeMismatch { .. } => "service_type_mismatch",
            ServiceError::Provider { .. } => "service_provider_failed",
            ServiceError::Scope(e) => e.as_label(),
        }
    }
}

/// # Non-successful outcome of a single health check.
///
/// Timeouts are terminal for the invocation that produced them; nothing is retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HealthCheckError {
    /// The per-check or the global deadline fired before the capability returned.
    #[error("health check timeout: {reason}")]
    Timeout {
        /// Which kind of cancellation ended the check.
        reason: DeadlineReason,
    },

    /// The capability reported its own error.
    #[error("health check failed: {source}")]
    Failure {
        /// Error returned by the capability.
        #[source]
        source: anyhow::Error,
    },

    /// The capability panicked; the panic was caught and reported here.
    #[error("health check panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },

    /// The service to check is not registered in the scope or its ancestors.
    #[error("health check target `{name}` not found")]
    NotFound {
        /// Service name.
        name: String,
    },

    /// The root was shut down and its worker pool no longer accepts checks.
    #[error("health check pool closed")]
    PoolClosed,
}

impl HealthCheckError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use scopevisor::{DeadlineReason, HealthCheckError};
    ///
    /// let err = HealthCheckError::Timeout { reason: DeadlineReason::Expired };
    /// assert_eq!(err.as_label(), "health_check_timeout");
    /// assert_eq!(err.to_string(), "health check timeout: deadline exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HealthCheckError::Timeout { .. } => "health_check_timeout",
            HealthCheckError::Failure { .. } => "health_check_failure",
            HealthCheckError::Panicked { .. } => "health_check_panicked",
            HealthCheckError::NotFound { .. } => "health_check_not_found",
            HealthCheckError::PoolClosed => "health_check_pool_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HealthCheckError::Timeout { reason } => format!("timeout: {reason}"),
            HealthCheckError::Failure { source } => format!("error: {source:#}"),
            HealthCheckError::Panicked { reason } => format!("panic: {reason}"),
            HealthCheckError::NotFound { name } => format!("not found: {name}"),
            HealthCheckError::PoolClosed => "pool closed".to_string(),
        }
    }

    /// True for [`HealthCheckError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, HealthCheckError::Timeout { .. })
    }
}

/// # Failure of a single service's shutdown capability.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The capability returned an error.
    #[error("shutdown of `{service}` failed: {source}")]
    Failed {
        /// Service name.
        service: String,
        /// Error returned by the capability.
        #[source]
        source: anyhow::Error,
    },

    /// The capability panicked.
    #[error("shutdown of `{service}` panicked: {reason}")]
    Panicked {
        /// Service name.
        service: String,
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::Failed { .. } => "shutdown_failed",
            ShutdownError::Panicked { .. } => "shutdown_panicked",
        }
    }
}

/// # Process-level errors.
///
/// Produced by the thin wrappers around the core (signal wiring, exit status translation).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// One or more services failed to shut down.
    #[error("shutdown finished with {} failed service(s): {failed:?}", failed.len())]
    ShutdownFailed {
        /// Fully-qualified names of the failed services.
        failed: Vec<String>,
    },

    /// OS signal listeners could not be registered.
    #[error("failed to register signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ShutdownFailed { .. } => "runtime_shutdown_failed",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
