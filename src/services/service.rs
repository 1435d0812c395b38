//! # Service capabilities.
//!
//! Every value registered in a scope implements [`Service`]. The trait's two
//! default methods advertise optional capabilities:
//!
//! ```text
//! Service::as_health_check() ──► Some(&dyn HealthCheck) → included in health-check rounds
//!                            └─► None                   → absent from health-check results
//! Service::as_shutdown()     ──► Some(&dyn Shutdown)    → awaited during shutdown
//!                            └─► None                   → visited, nothing to call
//! ```
//!
//! Capabilities return `anyhow::Result<()>`; the runtime wraps the error into its
//! own typed report ([`HealthCheckError`](crate::HealthCheckError) /
//! [`ShutdownError`](crate::ShutdownError)).

use async_trait::async_trait;

use crate::deadline::Deadline;

/// # A value that can live in a scope's registry.
///
/// Override [`as_health_check`](Service::as_health_check) and/or
/// [`as_shutdown`](Service::as_shutdown) to expose capabilities.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use scopevisor::{Deadline, HealthCheck, Service};
///
/// struct Db;
///
/// #[async_trait]
/// impl HealthCheck for Db {
///     async fn health_check(&self, _ctx: Deadline) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// impl Service for Db {
///     fn as_health_check(&self) -> Option<&dyn HealthCheck> {
///         Some(self)
///     }
/// }
/// ```
pub trait Service: Send + Sync + 'static {
    /// Health-check capability, if any.
    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        None
    }

    /// Shutdown capability, if any.
    fn as_shutdown(&self) -> Option<&dyn Shutdown> {
        None
    }
}

/// # Asynchronous health check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Reports whether the service is healthy.
    ///
    /// `ctx` fires when the per-check or global bound elapses; the runtime stops
    /// waiting at that point, so long checks should watch `ctx.done()` and bail out.
    async fn health_check(&self, ctx: Deadline) -> anyhow::Result<()>;
}

/// # Asynchronous release of a service's resources.
#[async_trait]
pub trait Shutdown: Send + Sync {
    /// Releases resources. Called at most once per registration.
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// Default service name for `T` (its fully-qualified type name).
///
/// ```
/// struct Cache;
/// assert!(scopevisor::name_of::<Cache>().ends_with("Cache"));
/// ```
pub fn name_of<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}
