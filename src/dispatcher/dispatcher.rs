use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use super::context::DispatcherContext;
use crate::error::{FluxError, FluxResult};
use crate::extensions::Extensions;
use crate::store::StoreDefinition;

#[derive(Default)]
struct Registry {
    stores: IndexMap<String, StoreDefinition>,
    events: Option<HashSet<String>>,
}

/// Application-wide registry of store definitions.
///
/// Cloning shares the registry. Store instances never live here; they are
/// owned by the [`DispatcherContext`] created for each request or session.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<RwLock<Registry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher that only accepts the listed events.
    ///
    /// Registering a store that handles an event outside the catalogue, or
    /// dispatching one, fails with [`FluxError::UnknownEvent`].
    pub fn with_events<I, E>(events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        let dispatcher = Self::new();
        dispatcher.registry.write().events = Some(events.into_iter().map(Into::into).collect());
        dispatcher
    }

    /// Register a store definition.
    ///
    /// Registering the same definition again is a no-op; a different
    /// definition under a taken name is rejected.
    pub fn register_store(&self, definition: StoreDefinition) -> FluxResult<()> {
        let mut registry = self.registry.write();

        if let Some(existing) = registry.stores.get(definition.name()) {
            if existing.same_as(&definition) {
                return Ok(());
            }
            return Err(FluxError::DuplicateStore(definition.name().to_string()));
        }

        if let Some(events) = &registry.events {
            if let Some(unknown) = definition.events().iter().find(|e| !events.contains(*e)) {
                return Err(FluxError::UnknownEvent(unknown.clone()));
            }
        }

        tracing::debug!(store = definition.name(), "registered store");
        registry
            .stores
            .insert(definition.name().to_string(), definition);
        Ok(())
    }

    pub fn has_store(&self, name: &str) -> bool {
        self.registry.read().stores.contains_key(name)
    }

    /// Names of registered stores, in registration order.
    pub fn store_names(&self) -> Vec<String> {
        self.registry.read().stores.keys().cloned().collect()
    }

    /// Create a context with no plugin-contributed store extensions.
    pub fn create_context(&self) -> DispatcherContext {
        self.create_context_with(Extensions::new())
    }

    /// Create a context whose stores receive `store_extensions`.
    pub fn create_context_with(&self, store_extensions: Extensions) -> DispatcherContext {
        DispatcherContext::new(self.clone(), store_extensions)
    }

    pub(crate) fn definition(&self, name: &str) -> FluxResult<StoreDefinition> {
        self.registry
            .read()
            .stores
            .get(name)
            .cloned()
            .ok_or_else(|| FluxError::UnknownStore(name.to_string()))
    }

    pub(crate) fn check_event(&self, event: &str) -> FluxResult<()> {
        if event.is_empty() {
            return Err(FluxError::InvalidEventName);
        }
        match &self.registry.read().events {
            Some(events) if !events.contains(event) => Err(FluxError::UnknownEvent(event.to_string())),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stores", &self.store_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreBuilder;

    fn named(name: &str, event: &str) -> StoreDefinition {
        StoreBuilder::new(name, || 0i64)
            .on(event, |_, _, _| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn registering_same_definition_twice_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let def = named("Counter", "INCREMENT");

        dispatcher.register_store(def.clone()).unwrap();
        dispatcher.register_store(def).unwrap();

        assert_eq!(dispatcher.store_names(), vec!["Counter".to_string()]);
    }

    #[test]
    fn different_definition_with_same_name_is_rejected() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(named("Counter", "A")).unwrap();

        let err = dispatcher.register_store(named("Counter", "B")).unwrap_err();
        assert!(matches!(err, FluxError::DuplicateStore(ref name) if name == "Counter"));
    }

    #[test]
    fn event_catalogue_rejects_unknown_handlers() {
        let dispatcher = Dispatcher::with_events(["INCREMENT"]);
        dispatcher.register_store(named("Counter", "INCREMENT")).unwrap();

        let err = dispatcher.register_store(named("Other", "DECREMENT")).unwrap_err();
        assert!(matches!(err, FluxError::UnknownEvent(ref e) if e == "DECREMENT"));
        assert!(!dispatcher.has_store("Other"));
    }

    #[test]
    fn check_event_validates_names() {
        let open = Dispatcher::new();
        assert!(open.check_event("ANYTHING").is_ok());
        assert!(matches!(open.check_event(""), Err(FluxError::InvalidEventName)));

        let closed = Dispatcher::with_events(["A"]);
        assert!(closed.check_event("A").is_ok());
        assert!(matches!(closed.check_event("B"), Err(FluxError::UnknownEvent(_))));
    }
}
