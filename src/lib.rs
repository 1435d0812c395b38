//! # scopevisor
//!
//! **Scopevisor** is an in-process service container for async Rust.
//!
//! It holds a tree of nested scopes, each owning a registry of named services,
//! and provides two cross-cutting runtime operations over that tree: concurrent
//! health verification of every registered service, and ordered graceful shutdown.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                ┌──────────────────────────────────────────────┐
//!                │  RootScope "[root]"                          │
//!                │  - InjectorOpts (timeouts, hooks, logf)      │
//!                │  - HealthCheckPool (iff parallelism > 0)     │
//!                │  - Registry { config, metrics, ... }         │
//!                └──────┬───────────────────────────┬───────────┘
//!                       ▼                           ▼
//!                ┌──────────────┐            ┌──────────────┐
//!                │ Scope "api"  │            │ Scope "jobs" │
//!                │  Registry    │            │  Registry    │
//!                └──────┬───────┘            └──────────────┘
//!                       ▼
//!                ┌──────────────┐
//!                │ Scope "db"   │
//!                │  Registry    │
//!                └──────────────┘
//!
//! health_check_with_context(ctx)                 shutdown()
//!   │ fan-out over the subtree                     │ reverse registration order
//!   ▼                                              ▼
//! ┌──────────────────────────────┐       ┌──────────────────────────────┐
//! │ per check:                   │       │ per service (sequential):    │
//! │  permit ◄── pool (FIFO)      │       │  Shutdown::shutdown().await  │
//! │  HealthCheck::health_check   │       │  hook_after_shutdown         │
//! │  bounded by per-check and    │       │ then: destroy descendants,   │
//! │  global deadlines            │       │       drain pool (root)      │
//! └──────────────┬───────────────┘       └──────────────┬───────────────┘
//!                ▼                                      ▼
//!   HashMap<name, Result<(), HealthCheckError>>   ShutdownReport
//! ```
//!
//! ### Health-check lifecycle
//! ```text
//! HealthCheckSlot ◄── queue_service_healthcheck(ctx, scope, name)
//!
//!   ├─► check = ctx.with_timeout(health_check_timeout)
//!   ├─► acquire pool permit (optional, cancellable by `check`)
//!   ├─► capability.health_check(check)   (panics caught)
//!   │       ├─ Ok           ─► Ok(())
//!   │       ├─ Err(e)       ─► HealthCheckError::Failure
//!   │       └─ panic        ─► HealthCheckError::Panicked
//!   └─► deadline fired first ─► HealthCheckError::Timeout, `check` cancelled
//! ```
//!
//! ## Features
//! | Area               | Description                                                  | Key types / traits                         |
//! |--------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Scopes**         | Hierarchical namespaces, resolution through ancestors.       | [`RootScope`], [`Scope`]                   |
//! | **Services**       | Eager values and lazy providers with optional capabilities.  | [`Service`], [`HealthCheck`], [`Shutdown`] |
//! | **Health checks**  | Concurrent, bounded, deadline-aware fan-out.                 | [`HealthCheckSlot`], [`Deadline`]          |
//! | **Shutdown**       | Strict reverse-order release with aggregated failures.       | [`ShutdownReport`]                         |
//! | **Errors**         | Typed errors for every layer.                                | [`HealthCheckError`], [`RuntimeError`]     |
//! | **Configuration**  | Timeouts, parallelism, hooks and log sink.                   | [`InjectorOpts`]                           |
//!
//! ## Optional features
//! - `logging`: the default log sink forwards to [`tracing`](https://docs.rs/tracing) (target `scopevisor`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use scopevisor::{Deadline, HealthCheck, InjectorOpts, RootScope, Service, Shutdown};
//!
//! struct Database;
//!
//! #[async_trait]
//! impl HealthCheck for Database {
//!     async fn health_check(&self, _ctx: Deadline) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Shutdown for Database {
//!     async fn shutdown(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Database {
//!     fn as_health_check(&self) -> Option<&dyn HealthCheck> { Some(self) }
//!     fn as_shutdown(&self) -> Option<&dyn Shutdown> { Some(self) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = RootScope::with_opts(InjectorOpts {
//!         health_check_parallelism: 4,
//!         health_check_timeout: Duration::from_secs(1),
//!         ..InjectorOpts::default()
//!     });
//!
//!     let storage = root.scope("storage")?;
//!     storage.provide_named_value("db", Database)?;
//!
//!     let report = root.health_check().await;
//!     assert!(report["storage/db"].is_ok());
//!
//!     root.shutdown().await.into_result()?;
//!     Ok(())
//! }
//! ```

mod core;
mod deadline;
mod error;
mod services;

// ---- Public re-exports ----

pub use self::core::{
    HealthCheckSlot, HealthReport, Hook, InjectorOpts, LogSink, ROOT_SCOPE_NAME, RootScope, Scope,
    ScopeId, ServiceRef, ShutdownReport, default_logf,
};
pub use deadline::{Deadline, DeadlineReason};
pub use error::{HealthCheckError, RuntimeError, ScopeError, ServiceError, ShutdownError};
pub use services::{HealthCheck, Service, Shutdown, name_of};
