//! # Service registry: per-scope mapping from service name to slot.
//!
//! Each scope node owns one [`Registry`]. Registration and resolution are exposed
//! as methods on [`Scope`]:
//!
//! ```text
//! Scope::provide_value(v)        ──► Registry.insert(ServiceSlot::eager)  ──► hook_after_registration
//! Scope::provide(factory)        ──► Registry.insert(ServiceSlot::lazy)   ──► hook_after_registration
//! Scope::invoke::<T>()           ──► self → parent → … → root (first match wins)
//!                                      └─► slot.instance(owner) → downcast::<T>()
//! ```
//!
//! ## Rules
//! - Names are unique within one registry (not across scopes: a child may shadow).
//! - Every slot carries a tree-wide registration `seq`; shutdown walks it in reverse.
//! - Snapshots (`slots`, `drain`) are returned in registration order.
//! - The registry lock is never held while providers run.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::scope::Scope;
use crate::error::ServiceError;
use crate::services::slot::ServiceSlot;
use crate::services::{Service, name_of};

/// Registry of services owned by one scope.
pub(crate) struct Registry {
    slots: RwLock<HashMap<Arc<str>, Arc<ServiceSlot>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a slot; rejects duplicate names.
    fn insert(&self, slot: ServiceSlot) -> Result<(), ServiceError> {
        let mut slots = self.slots.write();
        if slots.contains_key(slot.name()) {
            return Err(ServiceError::AlreadyDeclared {
                name: slot.name().to_string(),
            });
        }
        slots.insert(slot.name().into(), Arc::new(slot));
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<ServiceSlot>> {
        self.slots.read().get(name).cloned()
    }

    /// Returns sorted list of provided service names.
    pub(crate) fn names(&self) -> Vec<String> {
        let slots = self.slots.read();
        let mut names: Vec<String> = slots.keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Snapshot of all slots in registration order.
    pub(crate) fn slots(&self) -> Vec<Arc<ServiceSlot>> {
        let mut slots: Vec<Arc<ServiceSlot>> = self.slots.read().values().cloned().collect();
        slots.sort_unstable_by_key(|s| s.seq());
        slots
    }

    /// Atomically removes every slot, in registration order.
    pub(crate) fn drain(&self) -> Vec<Arc<ServiceSlot>> {
        let mut slots: Vec<Arc<ServiceSlot>> = {
            let mut map = self.slots.write();
            map.drain().map(|(_, slot)| slot).collect()
        };
        slots.sort_unstable_by_key(|s| s.seq());
        slots
    }
}

impl Scope {
    /// Registers a precomputed value under its type name.
    pub fn provide_value<T: Service>(&self, value: T) -> Result<(), ServiceError> {
        self.provide_named_value(name_of::<T>(), value)
    }

    /// Registers a precomputed value under `name`.
    pub fn provide_named_value<T: Service>(
        &self,
        name: impl Into<Arc<str>>,
        value: T,
    ) -> Result<(), ServiceError> {
        let name = name.into();
        let slot = ServiceSlot::eager(name, self.tree().next_seq(), value);
        self.register(slot)
    }

    /// Registers a lazy factory under the type name of `T`.
    ///
    /// The factory runs on first [`invoke`](Scope::invoke) and receives the scope
    /// that owns the registration.
    pub fn provide<T, F>(&self, factory: F) -> Result<(), ServiceError>
    where
        T: Service,
        F: Fn(&Scope) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.provide_named(name_of::<T>(), factory)
    }

    /// Registers a lazy factory under `name`.
    pub fn provide_named<T, F>(
        &self,
        name: impl Into<Arc<str>>,
        factory: F,
    ) -> Result<(), ServiceError>
    where
        T: Service,
        F: Fn(&Scope) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let slot = ServiceSlot::lazy(name, self.tree().next_seq(), factory);
        self.register(slot)
    }

    /// Resolves the service registered under the type name of `T`.
    pub fn invoke<T: Service>(&self) -> Result<Arc<T>, ServiceError> {
        self.invoke_named(name_of::<T>())
    }

    /// Resolves the service named `name`, searching this scope then its ancestors.
    pub fn invoke_named<T: Service>(&self, name: &str) -> Result<Arc<T>, ServiceError> {
        let Some((owner, slot)) = self.lookup(name) else {
            return Err(ServiceError::NotFound {
                name: name.to_string(),
                available: self.visible_names(),
            });
        };
        let instance = slot.instance(&owner)?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ServiceError::TypeMismatch {
                name: name.to_string(),
                expected: name_of::<T>(),
            })
    }

    /// Sorted names of the services provided directly in this scope.
    pub fn provided_names(&self) -> Vec<String> {
        self.registry().map(|r| r.names()).unwrap_or_default()
    }

    /// First slot named `name` in this scope or its ancestors, with its owning scope.
    pub(crate) fn lookup(&self, name: &str) -> Option<(Scope, Arc<ServiceSlot>)> {
        self.lineage()
            .into_iter()
            .find_map(|(scope, registry)| registry.get(name).map(|slot| (scope, slot)))
    }

    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lineage()
            .iter()
            .flat_map(|(_, registry)| registry.names())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn register(&self, slot: ServiceSlot) -> Result<(), ServiceError> {
        let name: Arc<str> = slot.name().into();
        if name.is_empty() || name.contains('/') {
            return Err(ServiceError::InvalidName {
                name: name.to_string(),
            });
        }
        self.registry()?.insert(slot)?;

        self.opts().log(format_args!("service `{}` provided in scope `{}`", name, self.name()));
        self.opts().after_registration(self, &name);
        Ok(())
    }
}
