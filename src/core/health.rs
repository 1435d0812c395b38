//! # Health-check orchestrator: fan-out/fan-in over every health-checkable service.
//!
//! ## Flow
//! ```text
//! health_check_with_context(ctx)
//!   ├─► global = ctx.with_timeout(health_check_global_timeout)
//!   ├─► enumerate subtree (pre-order), slots in registration order,
//!   │   keep built slots exposing HealthCheck
//!   ├─► per slot: dispatch(global, svc)
//!   │       ├─► check = global.with_timeout(health_check_timeout)
//!   │       ├─► [pool] acquire permit  ◄── races check.done()
//!   │       └─► capability.health_check(check) ◄── races check.done()
//!   │             └─► exactly one value sent into the HealthCheckSlot
//!   └─► collect: each slot raced against global.done()
//!         └─► HashMap<qualified name, Result<(), HealthCheckError>>
//! ```
//!
//! ## Rules
//! - Every dispatched check reports exactly one value, including on panic or cancellation.
//! - A check still pending when either bound fires resolves with `HealthCheckError::Timeout`;
//!   its deadline token is cancelled so the capability can observe it.
//! - Services without the capability (or lazy services never built) are absent from results.
//! - Under bounded parallelism, checks acquire permits FIFO in dispatch order.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use tokio::sync::{Semaphore, oneshot};

use crate::core::scope::{RootScope, Scope};
use crate::deadline::{Deadline, DeadlineReason};
use crate::error::{HealthCheckError, panic_message};
use crate::services::Service;

/// Per-service health-check outcome keyed by qualified service name.
pub type HealthReport = HashMap<String, Result<(), HealthCheckError>>;

/// Single-value asynchronous result of one queued health check.
///
/// Resolves exactly once. A check whose task was torn down before reporting
/// (runtime shutdown) resolves as a cancellation timeout.
#[derive(Debug)]
#[must_use = "a queued health check reports through this slot"]
pub struct HealthCheckSlot {
    rx: oneshot::Receiver<Result<(), HealthCheckError>>,
}

impl HealthCheckSlot {
    fn ready(result: Result<(), HealthCheckError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for HealthCheckSlot {
    type Output = Result<(), HealthCheckError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_dropped) => Poll::Ready(Err(HealthCheckError::Timeout {
                reason: DeadlineReason::Cancelled,
            })),
        }
    }
}

impl RootScope {
    /// Queues the health check of `service_name` as seen from `scope`.
    ///
    /// The service is resolved in `scope` then its ancestors. The check is bounded by
    /// `ctx` and, if configured, by `health_check_timeout`. Must be called from
    /// within a tokio runtime.
    ///
    /// - not registered → `Err(NotFound)`
    /// - registered without capability, or lazy and not yet built → `Ok(())`
    pub fn queue_service_healthcheck(
        &self,
        ctx: &Deadline,
        scope: &Scope,
        service_name: &str,
    ) -> HealthCheckSlot {
        let Some((_, slot)) = scope.lookup(service_name) else {
            return HealthCheckSlot::ready(Err(HealthCheckError::NotFound {
                name: service_name.to_string(),
            }));
        };
        match slot.built_service() {
            Some(service) if service.as_health_check().is_some() => {
                self.dispatch(ctx, scope.qualify(service_name), service)
            }
            _ => HealthCheckSlot::ready(Ok(())),
        }
    }

    /// Spawns one check (through the pool when bounded) and returns its result slot.
    fn dispatch(&self, ctx: &Deadline, key: String, service: Arc<dyn Service>) -> HealthCheckSlot {
        let opts = self.opts();
        let deadline = match opts.check_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.child(),
        };
        let logf = Arc::clone(&opts.logf);
        let (tx, rx) = oneshot::channel();

        let gate = match self.tree().pool() {
            Some(pool) if pool.is_closed() => {
                return HealthCheckSlot::ready(Err(HealthCheckError::PoolClosed));
            }
            Some(pool) => Some(pool.gate()),
            None => None,
        };

        let task = async move {
            let result = run_check(service, deadline, gate).await;
            if let Err(err) = &result {
                logf(format_args!(
                    "health check `{key}` failed [{}]: {}",
                    err.as_label(),
                    err.as_message()
                ));
            }
            let _ = tx.send(result);
        };

        match self.tree().pool() {
            Some(pool) => pool.spawn(task),
            None => {
                tokio::spawn(task);
            }
        }
        HealthCheckSlot { rx }
    }
}

/// Executes one check: optional permit, then the capability, both racing the deadline.
async fn run_check(
    service: Arc<dyn Service>,
    deadline: Deadline,
    gate: Option<Arc<Semaphore>>,
) -> Result<(), HealthCheckError> {
    let _permit = match gate {
        Some(sem) => {
            tokio::select! {
                res = sem.acquire_owned() => match res {
                    Ok(permit) => Some(permit),
                    Err(_closed) => return Err(HealthCheckError::PoolClosed),
                },
                reason = deadline.done() => {
                    deadline.cancel();
                    return Err(HealthCheckError::Timeout { reason });
                }
            }
        }
        None => None,
    };

    let Some(check) = service.as_health_check() else {
        return Ok(());
    };

    let pending = AssertUnwindSafe(check.health_check(deadline.clone())).catch_unwind();
    tokio::select! {
        biased;
        res = pending => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(HealthCheckError::Failure { source }),
            Err(panic) => Err(HealthCheckError::Panicked {
                reason: panic_message(panic.as_ref()),
            }),
        },
        reason = deadline.done() => {
            deadline.cancel();
            Err(HealthCheckError::Timeout { reason })
        }
    }
}

impl Scope {
    /// Checks every health-checkable service of this scope and its descendants
    /// with no caller deadline.
    pub async fn health_check(&self) -> HealthReport {
        self.health_check_with_context(&Deadline::background())
            .await
    }

    /// Checks every health-checkable service of this scope and its descendants.
    ///
    /// The round is bounded by `ctx` and by `health_check_global_timeout`; each
    /// check is additionally bounded by `health_check_timeout`. The result has
    /// exactly one entry per health-checkable service, keyed by its name qualified
    /// with the scope path below the root (`"svc"`, `"api/db/svc"`).
    pub async fn health_check_with_context(&self, ctx: &Deadline) -> HealthReport {
        let root = self.root_scope();
        let global = match self.opts().global_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.child(),
        };

        let targets: Vec<(String, Arc<dyn Service>)> = self
            .subtree()
            .into_iter()
            .flat_map(|(scope, registry)| {
                registry
                    .slots()
                    .into_iter()
                    .filter(|slot| slot.is_health_checkable())
                    .filter_map(|slot| {
                        slot.built_service()
                            .map(|svc| (scope.qualify(slot.name()), svc))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        self.opts().log(format_args!(
            "health check of scope `{}`: {} service(s)",
            self.name(),
            targets.len()
        ));

        let pending: Vec<(String, HealthCheckSlot)> = targets
            .into_iter()
            .map(|(key, svc)| {
                let slot = root.dispatch(&global, key.clone(), svc);
                (key, slot)
            })
            .collect();

        let mut report = HashMap::with_capacity(pending.len());
        for (key, slot) in pending {
            let result = tokio::select! {
                biased;
                res = slot => res,
                reason = global.done() => Err(HealthCheckError::Timeout { reason }),
            };
            report.insert(key, result);
        }
        // Releases capabilities that only watch the token.
        global.cancel();
        report
    }

    /// Checks a single service, resolved in this scope then its ancestors.
    pub async fn health_check_named(
        &self,
        ctx: &Deadline,
        service_name: &str,
    ) -> Result<(), HealthCheckError> {
        self.root_scope()
            .queue_service_healthcheck(ctx, self, service_name)
            .await
    }
}
