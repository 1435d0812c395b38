//! # Health-check worker pool.
//!
//! Bounded execution resource owned by a root scope when
//! `health_check_parallelism > 0`.
//!
//! ```text
//! queue_service_healthcheck ──► tracker.spawn(check)
//!                                   └─► gate.acquire_owned()  (FIFO, cancellable by the check's deadline)
//!                                         └─► capability.health_check(..)
//!                                               └─► permit dropped → next waiter starts
//! ```
//!
//! ## Rules
//! - At most `size` checks hold a permit at any instant.
//! - `shutdown()` closes the gate (queued checks resolve with `PoolClosed`) and
//!   waits until every in-flight check has reported.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Counting gate plus a tracker of spawned checks.
#[derive(Debug)]
pub(crate) struct HealthCheckPool {
    gate: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl HealthCheckPool {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    /// Concurrency gate shared by every check dispatched through this pool.
    pub(crate) fn gate(&self) -> Arc<Semaphore> {
        Arc::clone(&self.gate)
    }

    /// Spawns a check on the current runtime and tracks it until completion.
    pub(crate) fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut);
    }

    /// Number of checks currently holding a permit.
    pub(crate) fn in_flight(&self) -> usize {
        self.size.saturating_sub(self.gate.available_permits())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Stops accepting checks and waits for in-flight ones to drain. Idempotent.
    pub(crate) async fn shutdown(&self) {
        self.gate.close();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
