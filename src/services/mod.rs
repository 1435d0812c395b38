//! # Service abstractions and registration slots.
//!
//! This module provides the service-related types:
//! - [`Service`] - marker trait every registered value implements (capability discovery)
//! - [`HealthCheck`] - optional async health-check capability
//! - [`Shutdown`] - optional async shutdown capability
//! - [`ServiceSlot`](slot::ServiceSlot) - one registered entry (eager value or lazy provider)

mod service;
pub(crate) mod slot;

pub use service::{HealthCheck, Service, Shutdown, name_of};
