//! # Cross-platform OS signal handling.
//!
//! Provides [`RootScope::shutdown_on_signals`], which parks until the process
//! receives a termination signal and then shuts the whole tree down, and
//! [`RootScope::shutdown_on_signals_with_context`], which also gives up waiting
//! once a [`Deadline`] fires.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use crate::core::scope::RootScope;
use crate::core::shutdown::ShutdownReport;
use crate::deadline::Deadline;
use crate::error::RuntimeError;

impl RootScope {
    /// Waits for a termination signal, then runs [`shutdown`](crate::Scope::shutdown)
    /// on the root.
    ///
    /// Returns `Err(RuntimeError::Signal)` if the listeners cannot be registered;
    /// in that case nothing is shut down.
    ///
    /// # Example
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), scopevisor::RuntimeError> {
    /// let root = scopevisor::RootScope::new();
    /// // ... provide services ...
    /// root.shutdown_on_signals().await?.into_result()
    /// # }
    /// ```
    pub async fn shutdown_on_signals(&self) -> Result<ShutdownReport, RuntimeError> {
        self.shutdown_on_signals_with_context(&Deadline::background()).await
    }

    /// Like [`shutdown_on_signals`](RootScope::shutdown_on_signals), but stops
    /// waiting when `ctx` is cancelled or expires. Shutdown runs in both cases.
    pub async fn shutdown_on_signals_with_context(
        &self,
        ctx: &Deadline,
    ) -> Result<ShutdownReport, RuntimeError> {
        tokio::select! {
            biased;
            received = wait_for_shutdown_signal() => {
                received?;
                self.opts().log(format_args!("termination signal received, shutting down"));
            }
            reason = ctx.done() => {
                self.opts().log(format_args!("signal wait ended ({reason:?}), shutting down"));
            }
        }
        Ok(self.shutdown().await)
    }
}

/// Completes when any termination signal is received.
///
/// Each call creates independent signal listeners.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::services::{Service, Shutdown};

    struct Counted(Arc<AtomicUsize>);

    impl Service for Counted {
        fn as_shutdown(&self) -> Option<&dyn Shutdown> {
            Some(self)
        }
    }

    #[async_trait]
    impl Shutdown for Counted {
        async fn shutdown(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_triggers_shutdown() {
        let closed = Arc::new(AtomicUsize::new(0));
        let root = RootScope::new();
        root.provide_named_value("svc", Counted(closed.clone())).unwrap();

        let ctx = Deadline::background();
        ctx.cancel();
        let report = root.shutdown_on_signals_with_context(&ctx).await.unwrap();
        assert!(report.is_ok());
        assert_eq!(report.visited().len(), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(root.provided_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_context_triggers_shutdown() {
        let closed = Arc::new(AtomicUsize::new(0));
        let root = RootScope::new();
        root.provide_named_value("svc", Counted(closed.clone())).unwrap();

        let ctx = Deadline::background().with_timeout(Duration::from_millis(20));
        let start = tokio::time::Instant::now();
        let report = root.shutdown_on_signals_with_context(&ctx).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(20));
        assert_eq!(report.visited().len(), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
