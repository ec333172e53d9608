use std::sync::Arc;

use super::store::Store;
use crate::context::StoreContext;

type Factory = Arc<dyn Fn(StoreContext) -> Arc<dyn Store> + Send + Sync>;

/// Registration record for a store type.
///
/// Carries the store's name, the events it declares handlers for, and the
/// factory used to create one instance per context. Clones of a definition
/// are the same store type; registering a clone twice is a no-op.
#[derive(Clone)]
pub struct StoreDefinition {
    name: Arc<str>,
    events: Arc<[String]>,
    handles_all: bool,
    factory: Factory,
}

impl StoreDefinition {
    /// Define a store from a hand-written [`Store`] implementation.
    pub fn new<I, E, F, S>(name: impl Into<String>, events: I, factory: F) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
        F: Fn(StoreContext) -> S + Send + Sync + 'static,
        S: Store,
    {
        Self {
            name: Arc::from(name.into()),
            events: events.into_iter().map(Into::into).collect(),
            handles_all: false,
            factory: Arc::new(move |context| Arc::new(factory(context)) as Arc<dyn Store>),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        events: Vec<String>,
        handles_all: bool,
        factory: Factory,
    ) -> Self {
        Self {
            name: Arc::from(name),
            events: events.into(),
            handles_all,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Events this store declares handlers for.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Whether the store has a catch-all handler.
    pub fn handles_all(&self) -> bool {
        self.handles_all
    }

    /// Whether both definitions describe the same store type.
    pub fn same_as(&self, other: &StoreDefinition) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }

    pub(crate) fn instantiate(&self, context: StoreContext) -> Arc<dyn Store> {
        (self.factory)(context)
    }
}

impl std::fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("handles_all", &self.handles_all)
            .finish()
    }
}
