//! Controller registry
//!
//! Lazy singleton table keyed by controller type. The first
//! [`ControllerRegistry::get_or_create`] for a type builds and starts the
//! controller and assigns it an identity token; [`ControllerRegistry::remove`]
//! disposes it and forgets the token, so the next `get_or_create` yields
//! a fresh instance under a new token.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::ActionBus;
use crate::controller::{start, Controller};
use crate::remote::Instance;

struct Entry {
    token: u64,
    name: &'static str,
    instance: Instance,
    dispose: fn(&Instance) -> bool,
}

fn dispose_as<C: Controller>(instance: &Instance) -> bool {
    (**instance)
        .downcast_ref::<C>()
        .is_some_and(|controller| controller.dispose())
}

fn downcast<C: Controller>(instance: &Instance) -> Option<Arc<C>> {
    Arc::clone(instance).downcast::<C>().ok()
}

struct RegistryInner {
    bus: ActionBus,
    entries: Mutex<HashMap<TypeId, Entry>>,
    next_token: AtomicU64,
}

/// Shared handle to the controller table
#[derive(Clone)]
pub struct ControllerRegistry {
    inner: Arc<RegistryInner>,
}

impl ControllerRegistry {
    pub fn new(bus: &ActionBus) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                bus: bus.clone(),
                entries: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn bus(&self) -> &ActionBus {
        &self.inner.bus
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TypeId, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The live `C`, created and started on first use
    ///
    /// Construction runs outside the table lock, so a controller may use
    /// the registry while being built. If two callers race, the loser's
    /// instance is disposed and both get the winner.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn get_or_create<C: Controller>(&self) -> Arc<C> {
        self.get_or_insert_with(C::create)
    }

    /// Like [`get_or_create`](Self::get_or_create) with a custom
    /// constructor, for controllers that need more than the bus
    pub fn get_or_insert_with<C, F>(&self, create: F) -> Arc<C>
    where
        C: Controller,
        F: FnOnce(&ActionBus) -> C,
    {
        if let Some(existing) = self.get::<C>() {
            return existing;
        }

        let created = start(create(&self.inner.bus));

        let mut entries = self.entries();
        if let Some(existing) = entries
            .get(&TypeId::of::<C>())
            .and_then(|entry| downcast::<C>(&entry.instance))
        {
            drop(entries);
            created.dispose();
            return existing;
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        entries.insert(
            TypeId::of::<C>(),
            Entry {
                token,
                name: C::name(),
                instance: Arc::clone(&created) as Instance,
                dispose: dispose_as::<C>,
            },
        );
        drop(entries);

        tracing::debug!(target: "statebus", controller = C::name(), token, "controller registered");
        created
    }

    /// The live `C`, if any, without creating one
    pub fn get<C: Controller>(&self) -> Option<Arc<C>> {
        self.entries()
            .get(&TypeId::of::<C>())
            .and_then(|entry| downcast::<C>(&entry.instance))
    }

    /// Dispose and forget the live `C`
    ///
    /// Returns `false` if there was none.
    pub fn remove<C: Controller>(&self) -> bool {
        let removed = self.entries().remove(&TypeId::of::<C>());
        match removed {
            Some(entry) => {
                (entry.dispose)(&entry.instance);
                tracing::debug!(target: "statebus", controller = entry.name, token = entry.token, "controller removed");
                true
            }
            None => false,
        }
    }

    /// Identity token of the live `C`
    pub fn identity<C: Controller>(&self) -> Option<u64> {
        self.entries()
            .get(&TypeId::of::<C>())
            .map(|entry| entry.token)
    }

    pub fn contains<C: Controller>(&self) -> bool {
        self.entries().contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose and forget every controller; returns how many there were
    pub fn clear(&self) -> usize {
        let drained: Vec<Entry> = self.entries().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            (entry.dispose)(&entry.instance);
        }
        if !drained.is_empty() {
            tracing::debug!(target: "statebus", count = drained.len(), "registry cleared");
        }
        drained.len()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.entries().values().map(|e| e.name).collect();
        f.debug_struct("ControllerRegistry")
            .field("controllers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    struct Alpha {
        store: Store<u32>,
    }

    impl Controller for Alpha {
        type State = u32;

        fn create(bus: &ActionBus) -> Self {
            Alpha {
                store: Store::named("Alpha", bus, 0),
            }
        }

        fn store(&self) -> &Store<u32> {
            &self.store
        }
    }

    struct Beta {
        store: Store<bool>,
    }

    impl Controller for Beta {
        type State = bool;

        fn create(bus: &ActionBus) -> Self {
            Beta {
                store: Store::named("Beta", bus, false),
            }
        }

        fn store(&self) -> &Store<bool> {
            &self.store
        }
    }

    #[tokio::test]
    async fn test_get_or_create_returns_singleton() {
        let registry = ControllerRegistry::new(&ActionBus::new());

        let first = registry.get_or_create::<Alpha>();
        let second = registry.get_or_create::<Alpha>();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_uses_custom_constructor() {
        let registry = ControllerRegistry::new(&ActionBus::new());

        let alpha = registry.get_or_insert_with(|bus| Alpha {
            store: Store::named("Alpha", bus, 42),
        });
        let again = registry.get_or_insert_with(|bus| Alpha {
            store: Store::named("Alpha", bus, 7),
        });

        assert!(Arc::ptr_eq(&alpha, &again));
        assert_eq!(again.store().state(), 42);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let registry = ControllerRegistry::new(&ActionBus::new());

        assert!(registry.get::<Alpha>().is_none());
        assert!(registry.identity::<Alpha>().is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_disposes_and_issues_new_identity() {
        let registry = ControllerRegistry::new(&ActionBus::new());
        let old = registry.get_or_create::<Alpha>();
        let old_token = registry.identity::<Alpha>();
        old.store().emit(9);

        assert!(registry.remove::<Alpha>());
        assert!(!registry.remove::<Alpha>());
        assert!(old.store().is_disposed());
        assert!(registry.identity::<Alpha>().is_none());

        let fresh = registry.get_or_create::<Alpha>();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.store().is_disposed());
        assert_eq!(fresh.store().state(), 0);
        assert_ne!(registry.identity::<Alpha>(), old_token);
    }

    #[tokio::test]
    async fn test_types_are_independent() {
        let registry = ControllerRegistry::new(&ActionBus::new());
        registry.get_or_create::<Alpha>();
        registry.get_or_create::<Beta>();

        registry.remove::<Alpha>();

        assert!(!registry.contains::<Alpha>());
        assert!(registry.contains::<Beta>());
    }

    #[tokio::test]
    async fn test_clear_disposes_everything() {
        let bus = ActionBus::new();
        let registry = ControllerRegistry::new(&bus);
        let alpha = registry.get_or_create::<Alpha>();
        let beta = registry.get_or_create::<Beta>();

        assert_eq!(registry.clear(), 2);

        assert!(alpha.store().is_disposed());
        assert!(beta.store().is_disposed());
        assert!(registry.is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
