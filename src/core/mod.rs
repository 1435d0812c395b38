//! Runtime core: scope tree and lifecycle.
//!
//! Internal modules:
//! - [`scope`]: arena-backed scope tree, root creation and cloning;
//! - [`registry`]: per-scope service registry (provide / invoke);
//! - [`config`]: injector options shared by a tree;
//! - [`pool`]: bounded health-check worker pool;
//! - [`health`]: health-check orchestrator (fan-out, deadlines, fan-in);
//! - [`shutdown`]: shutdown coordinator (reverse registration order);
//! - [`signals`]: OS signal wiring for process shutdown.

mod config;
mod health;
mod pool;
pub(crate) mod registry;
mod scope;
mod shutdown;
mod signals;

pub use config::{Hook, InjectorOpts, LogSink, default_logf};
pub use health::{HealthCheckSlot, HealthReport};
pub use scope::{ROOT_SCOPE_NAME, RootScope, Scope, ScopeId};
pub use shutdown::{ServiceRef, ShutdownReport};
