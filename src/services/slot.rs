//! # Service slot: one registered entry.
//!
//! A slot is created by `provide*` and owned by a scope's registry until shutdown.
//!
//! ```text
//! eager:  provide_value(v)  ──► instance set immediately
//! lazy:   provide(factory)  ──► instance built on first invoke (at most once)
//! ```
//!
//! ## Rules
//! - `seq` is unique and increasing across the whole tree (registration order).
//! - Capabilities are only visible once the instance exists: an unbuilt lazy slot
//!   is neither health-checked nor shut down.
//! - Building re-entrantly from the same slot (a provider resolving itself) is a
//!   dependency cycle and blocks forever.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::core::Scope;
use crate::error::ServiceError;
use crate::services::Service;

/// Built service: the same allocation seen as `Any` (for typed resolution) and as `Service`.
#[derive(Clone)]
pub(crate) struct Instance {
    any: Arc<dyn Any + Send + Sync>,
    service: Arc<dyn Service>,
}

impl Instance {
    fn new<T: Service>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            any: value.clone(),
            service: value,
        }
    }

    /// Typed view of the instance.
    pub(crate) fn downcast<T: Service>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}

type Provider = Box<dyn Fn(&Scope) -> anyhow::Result<Instance> + Send + Sync>;

/// One registered service.
pub(crate) struct ServiceSlot {
    name: Arc<str>,
    seq: u64,
    instance: OnceCell<Instance>,
    provider: Option<Provider>,
}

impl ServiceSlot {
    /// Slot holding a precomputed value.
    pub(crate) fn eager<T: Service>(name: Arc<str>, seq: u64, value: T) -> Self {
        Self {
            name,
            seq,
            instance: OnceCell::with_value(Instance::new(value)),
            provider: None,
        }
    }

    /// Slot built on first resolution by `factory`.
    pub(crate) fn lazy<T, F>(name: Arc<str>, seq: u64, factory: F) -> Self
    where
        T: Service,
        F: Fn(&Scope) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            name,
            seq,
            instance: OnceCell::new(),
            provider: Some(Box::new(move |scope| factory(scope).map(Instance::new))),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn is_lazy(&self) -> bool {
        self.provider.is_some()
    }

    pub(crate) fn is_built(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Returns the instance, building it with `scope` (the owning scope) if needed.
    pub(crate) fn instance(&self, scope: &Scope) -> Result<&Instance, ServiceError> {
        self.instance.get_or_try_init(|| match &self.provider {
            Some(provider) => {
                let built = provider(scope).map_err(|source| ServiceError::Provider {
                    name: self.name.to_string(),
                    source,
                })?;
                scope
                    .opts()
                    .log(format_args!("service `{}` built in scope `{}`", self.name, scope.name()));
                Ok(built)
            }
            // Eager slots are initialized at construction.
            None => Err(ServiceError::NotFound {
                name: self.name.to_string(),
                available: Vec::new(),
            }),
        })
    }

    /// The service behind this slot, if it has been built.
    pub(crate) fn built_service(&self) -> Option<Arc<dyn Service>> {
        self.instance.get().map(|i| Arc::clone(&i.service))
    }

    /// True if the slot is built and exposes a health-check capability.
    pub(crate) fn is_health_checkable(&self) -> bool {
        self.instance
            .get()
            .is_some_and(|i| i.service.as_health_check().is_some())
    }
}

impl fmt::Debug for ServiceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSlot")
            .field("name", &self.name)
            .field("seq", &self.seq)
            .field("lazy", &self.is_lazy())
            .field("built", &self.is_built())
            .finish()
    }
}
