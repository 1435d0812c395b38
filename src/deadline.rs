//! # Composable deadline tokens.
//!
//! [`Deadline`] pairs a [`CancellationToken`] with an optional point in time.
//! It is the handle passed through every asynchronous operation of the container
//! (health checks in particular).
//!
//! ## Composition
//! ```text
//! Deadline::background()                  token T0, no time bound
//!   └─► with_timeout(500ms)               token T1 = T0.child_token(), at = now+500ms
//!         └─► with_timeout(10ms)          token T2 = T1.child_token(), at = min(T1.at, now+10ms)
//! ```
//!
//! ## Rules
//! - Cancelling a deadline cancels every deadline derived from it (never the parent).
//! - A derived deadline can only be **tighter** than its parent (`at` is the minimum).
//! - [`Deadline::done`] resolves with the first source to fire: explicit cancellation
//!   or the time bound. Cancellation wins ties.
//! - [`Deadline::race`] waits on several unrelated deadlines and reports the first to fire.
//! - Time is measured with [`tokio::time::Instant`] so paused-clock tests are deterministic.

use std::fmt;
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`Deadline`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineReason {
    /// The time bound elapsed.
    Expired,
    /// The token (or one of its ancestors) was cancelled explicitly.
    Cancelled,
}

impl fmt::Display for DeadlineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineReason::Expired => f.write_str("deadline exceeded"),
            DeadlineReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Cancellable, composable time-bound handle.
///
/// Cheap to clone: clones share the same underlying token.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use scopevisor::Deadline;
///
/// let parent = Deadline::background();
/// let child = parent.with_timeout(Duration::from_secs(5));
/// parent.cancel();
/// assert!(child.is_done());
/// ```
#[derive(Clone, Debug)]
pub struct Deadline {
    token: CancellationToken,
    at: Option<Instant>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::background()
    }
}

impl Deadline {
    /// Root deadline: never expires, only fires on explicit [`cancel`](Deadline::cancel).
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            at: None,
        }
    }

    /// Derives a deadline further bounded by `timeout` from now.
    ///
    /// `Duration::ZERO` means "no additional bound": the result only inherits
    /// the parent's bound and cancellation. So does a timeout too large to be
    /// represented as an instant.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return self.child();
        }
        match Instant::now().checked_add(timeout) {
            Some(at) => self.with_deadline(at),
            None => self.child(),
        }
    }

    /// Derives a deadline bounded by the absolute instant `at`.
    pub fn with_deadline(&self, at: Instant) -> Self {
        let at = match self.at {
            Some(parent) => parent.min(at),
            None => at,
        };
        Self {
            token: self.token.child_token(),
            at: Some(at),
        }
    }

    /// Derives an independently cancellable deadline with the same time bound.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            at: self.at,
        }
    }

    /// Cancels this deadline and every deadline derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Underlying cancellation token.
    ///
    /// The token is cancelled by [`cancel`](Deadline::cancel) and by the health-check
    /// orchestrator when the time bound fires; on its own it does not observe time.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Absolute time bound, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before expiry (`None` = unbounded). Saturates at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns why the deadline fired, or `None` if it is still live.
    pub fn reason(&self) -> Option<DeadlineReason> {
        if self.token.is_cancelled() {
            return Some(DeadlineReason::Cancelled);
        }
        match self.at {
            Some(at) if Instant::now() >= at => Some(DeadlineReason::Expired),
            _ => None,
        }
    }

    /// True once the deadline was cancelled or has expired.
    pub fn is_done(&self) -> bool {
        self.reason().is_some()
    }

    /// Completes when the deadline fires, returning the first source that fired.
    pub async fn done(&self) -> DeadlineReason {
        match self.at {
            Some(at) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => DeadlineReason::Cancelled,
                    _ = time::sleep_until(at) => DeadlineReason::Expired,
                }
            }
            None => {
                self.token.cancelled().await;
                DeadlineReason::Cancelled
            }
        }
    }

    /// Completes when the first of `sources` fires.
    ///
    /// Returns the index of the winning source with its reason. Sources that are
    /// already done win in iteration order. An empty set never completes.
    ///
    /// # Example
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use scopevisor::{Deadline, DeadlineReason};
    ///
    /// let request = Deadline::background();
    /// let server = Deadline::background();
    /// server.cancel();
    /// assert_eq!(Deadline::race([&request, &server]).await, (1, DeadlineReason::Cancelled));
    /// # }
    /// ```
    pub async fn race<'a, I>(sources: I) -> (usize, DeadlineReason)
    where
        I: IntoIterator<Item = &'a Deadline>,
    {
        let sources: Vec<&Deadline> = sources.into_iter().collect();
        if let Some(hit) = sources
            .iter()
            .enumerate()
            .find_map(|(i, d)| d.reason().map(|r| (i, r)))
        {
            return hit;
        }
        if sources.is_empty() {
            return future::pending().await;
        }
        let waiters = sources.iter().map(|d| d.done().boxed());
        let (reason, index, _rest) = future::select_all(waiters).await;
        (index, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_background_never_expires() {
        let d = Deadline::background();
        assert_eq!(d.remaining(), None);
        time::advance(Duration::from_secs(3600)).await;
        assert!(!d.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires() {
        let d = Deadline::background().with_timeout(Duration::from_millis(10));
        assert!(!d.is_done());
        assert_eq!(d.done().await, DeadlineReason::Expired);
        assert_eq!(d.reason(), Some(DeadlineReason::Expired));
        assert_eq!(d.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_cannot_outlive_parent() {
        let parent = Deadline::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let start = Instant::now();
        assert_eq!(child.done().await, DeadlineReason::Expired);
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_is_unbounded() {
        let d = Deadline::background().with_timeout(Duration::MAX);
        assert_eq!(d.deadline(), None);
        assert!(!d.is_done());

        let parent = Deadline::background().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(child.deadline(), parent.deadline());
        assert_eq!(child.done().await, DeadlineReason::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_inherits_bound() {
        let parent = Deadline::background().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::ZERO);
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_cancel_is_transitive_downwards_only() {
        let parent = Deadline::background();
        let child = parent.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        child.cancel();
        assert_eq!(grandchild.done().await, DeadlineReason::Cancelled);
        assert!(!parent.is_done());

        parent.cancel();
        assert_eq!(parent.reason(), Some(DeadlineReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_reports_first_source() {
        let slow = Deadline::background().with_timeout(Duration::from_millis(50));
        let fast = Deadline::background().with_timeout(Duration::from_millis(10));

        let start = Instant::now();
        assert_eq!(
            Deadline::race([&slow, &fast]).await,
            (1, DeadlineReason::Expired)
        );
        assert_eq!(start.elapsed(), Duration::from_millis(10));
        assert!(!slow.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_observes_cancellation() {
        let timed = Deadline::background().with_timeout(Duration::from_secs(60));
        let manual = Deadline::background();

        let m = manual.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(3)).await;
            m.cancel();
        });
        assert_eq!(
            Deadline::race([&timed, &manual]).await,
            (1, DeadlineReason::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_elapsed_bound() {
        let d = Deadline::background().with_timeout(Duration::from_millis(1));
        time::advance(Duration::from_millis(5)).await;
        d.cancel();
        assert_eq!(d.done().await, DeadlineReason::Cancelled);
    }
}
