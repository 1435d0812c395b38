//! # Shutdown coordinator: ordered release of every service in a subtree.
//!
//! ## Flow
//! ```text
//! scope.shutdown()
//!   ├─► drain registries of scope + descendants (atomically empties each one)
//!   ├─► sort slots by registration seq, newest first
//!   ├─► for each slot (sequential):
//!   │     ├─► built + Shutdown capability → await capability (panics caught)
//!   │     ├─► record visit / error in ShutdownReport
//!   │     └─► hook_after_shutdown(owner scope, name)
//!   ├─► destroy descendant scopes
//!   └─► [root] close the health-check pool and drain in-flight checks
//! ```
//!
//! ## Rules
//! - Strict reverse registration order across the whole subtree.
//! - A failing service never stops the walk; every failure is reported.
//! - Draining makes the operation idempotent: a second call visits nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::core::scope::{Scope, ScopeId};
use crate::error::{RuntimeError, ShutdownError, panic_message};
use crate::services::slot::ServiceSlot;

/// Identity of a service inside a tree: owning scope plus service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRef {
    /// Owning scope id.
    pub scope_id: ScopeId,
    /// Owning scope name.
    pub scope: String,
    /// Service name.
    pub service: String,
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.service)
    }
}

/// Outcome of one [`Scope::shutdown`] call.
#[derive(Debug, Default)]
#[must_use = "shutdown failures are reported, not raised"]
pub struct ShutdownReport {
    visited: Vec<ServiceRef>,
    errors: BTreeMap<ServiceRef, ShutdownError>,
}

impl ShutdownReport {
    /// True if no service failed.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if no service was visited (nothing registered, or already shut down).
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Services in the order they were shut down.
    pub fn visited(&self) -> &[ServiceRef] {
        &self.visited
    }

    /// Failures keyed by scope and service.
    pub fn errors(&self) -> &BTreeMap<ServiceRef, ShutdownError> {
        &self.errors
    }

    /// First failure recorded for a service named `service`, in any scope.
    pub fn error_for(&self, service: &str) -> Option<&ShutdownError> {
        self.errors
            .iter()
            .find(|(key, _)| key.service == service)
            .map(|(_, err)| err)
    }

    /// Collapses the report into a process-level result.
    pub fn into_result(self) -> Result<(), RuntimeError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(RuntimeError::ShutdownFailed {
            failed: self.errors.keys().map(ToString::to_string).collect(),
        })
    }
}

impl Scope {
    /// Shuts down every service of this scope and its descendants, newest first.
    ///
    /// Descendant scopes are destroyed afterwards; this scope stays attached to
    /// its parent with an empty registry. Shutting down the root also stops the
    /// health-check pool. Calling it again returns an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut slots: Vec<(Scope, Arc<ServiceSlot>)> = self
            .subtree()
            .into_iter()
            .flat_map(|(scope, registry)| {
                registry
                    .drain()
                    .into_iter()
                    .map(move |slot| (scope.clone(), slot))
            })
            .collect();
        slots.sort_unstable_by_key(|(_, slot)| std::cmp::Reverse(slot.seq()));

        let opts = self.opts();
        opts.log(format_args!(
            "shutdown of scope `{}`: {} service(s)",
            self.name(),
            slots.len()
        ));

        let mut report = ShutdownReport::default();
        for (owner, slot) in slots {
            let key = ServiceRef {
                scope_id: owner.id(),
                scope: owner.name().to_string(),
                service: slot.name().to_string(),
            };
            if let Err(err) = shutdown_slot(&slot).await {
                opts.log(format_args!("shutdown of `{key}` failed [{}]: {err}", err.as_label()));
                report.errors.insert(key.clone(), err);
            } else {
                opts.log(format_args!("service `{key}` shut down"));
            }
            report.visited.push(key);
            opts.after_shutdown(&owner, slot.name());
        }

        let destroyed = self.destroy_descendants();
        if destroyed > 0 {
            opts.log(format_args!(
                "scope `{}`: {destroyed} descendant scope(s) destroyed",
                self.name()
            ));
        }

        if self.is_root() {
            if let Some(pool) = self.tree().pool() {
                opts.log(format_args!(
                    "stopping health-check pool ({} check(s) in flight)",
                    pool.in_flight()
                ));
                pool.shutdown().await;
            }
        }
        report
    }
}

/// Invokes the slot's shutdown capability, if the service was built and has one.
async fn shutdown_slot(slot: &ServiceSlot) -> Result<(), ShutdownError> {
    let Some(service) = slot.built_service() else {
        return Ok(());
    };
    let Some(capability) = service.as_shutdown() else {
        return Ok(());
    };
    match AssertUnwindSafe(capability.shutdown()).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ShutdownError::Failed {
            service: slot.name().to_string(),
            source,
        }),
        Err(panic) => Err(ShutdownError::Panicked {
            service: slot.name().to_string(),
            reason: panic_message(panic.as_ref()),
        }),
    }
}
