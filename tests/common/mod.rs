#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scopevisor::{Deadline, HealthCheck, Service, Shutdown};

/// Shared, ordered record of events written by fixtures.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Service without any capability.
pub struct Plain;

impl Service for Plain {}

/// Health-checkable service that sleeps for `delay` and ignores its deadline.
pub struct Sleeper {
    pub delay: Duration,
}

impl Sleeper {
    pub fn ms(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl HealthCheck for Sleeper {
    async fn health_check(&self, _ctx: Deadline) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

impl Service for Sleeper {
    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

/// Health-checkable service that always reports an error.
pub struct Unhealthy;

#[async_trait]
impl HealthCheck for Unhealthy {
    async fn health_check(&self, _ctx: Deadline) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

impl Service for Unhealthy {
    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

/// Tracks how many checks run at the same time.
#[derive(Clone, Default)]
pub struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Health-checkable service that records concurrency in a [`Gauge`].
pub struct Metered {
    pub gauge: Gauge,
    pub delay: Duration,
}

#[async_trait]
impl HealthCheck for Metered {
    async fn health_check(&self, _ctx: Deadline) -> anyhow::Result<()> {
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Service for Metered {
    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

/// Service with a shutdown capability that writes its name to a [`Journal`].
pub struct Closer {
    pub name: &'static str,
    pub journal: Journal,
    pub fail: bool,
}

impl Closer {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(name: &'static str, journal: &Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(name, journal)
        }
    }
}

#[async_trait]
impl Shutdown for Closer {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.journal.push(self.name);
        if self.fail {
            anyhow::bail!("{} could not flush", self.name);
        }
        Ok(())
    }
}

impl Service for Closer {
    fn as_shutdown(&self) -> Option<&dyn Shutdown> {
        Some(self)
    }
}
