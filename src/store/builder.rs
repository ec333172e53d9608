use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::definition::StoreDefinition;
use super::emitter::ChangeEmitter;
use super::state::StoreState;
use super::store::Store;
use crate::context::StoreContext;
use crate::dispatcher::DispatchScope;
use crate::error::{FluxError, FluxResult};

type Handler<S> = Arc<dyn Fn(&BuiltStore<S>, &Value, &DispatchScope<'_>) -> FluxResult<()> + Send + Sync>;
type Initializer<S> = Arc<dyn Fn(&BuiltStore<S>) + Send + Sync>;
type Dehydrator<S> = Arc<dyn Fn(&S) -> FluxResult<Value> + Send + Sync>;
type Rehydrator<S> = Arc<dyn Fn(Value) -> FluxResult<S> + Send + Sync>;

struct StoreBlueprint<S> {
    init: Arc<dyn Fn() -> S + Send + Sync>,
    handlers: IndexMap<String, Handler<S>>,
    fallback: Option<Handler<S>>,
    initialize: Option<Initializer<S>>,
    dehydrate: Dehydrator<S>,
    rehydrate: Rehydrator<S>,
}

/// Builds a [`StoreDefinition`] from a state type and a map of handlers.
///
/// ```
/// use fluxkit::store::StoreBuilder;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Default, Serialize, Deserialize)]
/// struct Counter {
///     count: i64,
/// }
///
/// let definition = StoreBuilder::new("Counter", Counter::default)
///     .on("INCREMENT", |store, _payload, _scope| {
///         store.state().update(|s| s.count += 1);
///         store.emit_change();
///         Ok(())
///     })
///     .build()
///     .unwrap();
/// assert_eq!(definition.events(), ["INCREMENT".to_string()]);
/// ```
pub struct StoreBuilder<S> {
    name: String,
    blueprint: StoreBlueprint<S>,
    error: Option<FluxError>,
}

impl<S> StoreBuilder<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Start a store named `name` whose fresh state comes from `init`.
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let name = name.into();
        let target = name.clone();
        Self {
            name,
            blueprint: StoreBlueprint {
                init: Arc::new(init),
                handlers: IndexMap::new(),
                fallback: None,
                initialize: None,
                dehydrate: Arc::new(|state: &S| Ok(serde_json::to_value(state)?)),
                rehydrate: Arc::new(move |value: Value| {
                    serde_json::from_value(value).map_err(|e| FluxError::rehydrate(target.as_str(), e))
                }),
            },
            error: None,
        }
    }

    /// Handle `event` with `handler`.
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&BuiltStore<S>, &Value, &DispatchScope<'_>) -> FluxResult<()> + Send + Sync + 'static,
    {
        let event = event.into();
        if self.blueprint.handlers.contains_key(&event) {
            self.error.get_or_insert(FluxError::DuplicateHandler {
                store: self.name.clone(),
                event,
            });
            return self;
        }
        self.blueprint.handlers.insert(event, Arc::new(handler));
        self
    }

    /// Handle every event that has no dedicated handler.
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BuiltStore<S>, &Value, &DispatchScope<'_>) -> FluxResult<()> + Send + Sync + 'static,
    {
        self.blueprint.fallback = Some(Arc::new(handler));
        self
    }

    /// Run `f` once, right after the store is instantiated in a context.
    pub fn initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&BuiltStore<S>) + Send + Sync + 'static,
    {
        self.blueprint.initialize = Some(Arc::new(f));
        self
    }

    /// Replace the default serde dehydration.
    pub fn dehydrate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> FluxResult<Value> + Send + Sync + 'static,
    {
        self.blueprint.dehydrate = Arc::new(f);
        self
    }

    /// Replace the default serde rehydration.
    pub fn rehydrate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> FluxResult<S> + Send + Sync + 'static,
    {
        self.blueprint.rehydrate = Arc::new(f);
        self
    }

    /// Finish the store. Fails if an event was given two handlers.
    pub fn build(self) -> FluxResult<StoreDefinition> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let events: Vec<String> = self.blueprint.handlers.keys().cloned().collect();
        let handles_all = self.blueprint.fallback.is_some();
        let name: Arc<str> = Arc::from(self.name.as_str());
        let blueprint = Arc::new(self.blueprint);

        let factory = Arc::new(move |context: StoreContext| {
            let store = Arc::new(BuiltStore {
                name: Arc::clone(&name),
                state: StoreState::new((blueprint.init)()),
                emitter: ChangeEmitter::new(),
                context,
                blueprint: Arc::clone(&blueprint),
            });
            if let Some(initialize) = &blueprint.initialize {
                initialize(store.as_ref());
            }
            store as Arc<dyn Store>
        });

        Ok(StoreDefinition::from_parts(self.name, events, handles_all, factory))
    }
}

/// Store instance produced by a [`StoreBuilder`].
pub struct BuiltStore<S> {
    name: Arc<str>,
    state: StoreState<S>,
    emitter: ChangeEmitter,
    context: StoreContext,
    blueprint: Arc<StoreBlueprint<S>>,
}

impl<S> std::fmt::Debug for BuiltStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltStore").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<S> BuiltStore<S> {
    pub fn state(&self) -> &StoreState<S> {
        &self.state
    }

    /// Read the state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        self.state.read(f)
    }

    /// Notify change listeners.
    pub fn emit_change(&self) {
        self.emitter.emit();
    }

    /// The plugin-augmented context this store was created with.
    pub fn context(&self) -> &StoreContext {
        &self.context
    }
}

impl<S: Clone> BuiltStore<S> {
    /// Clone of the current state.
    pub fn get(&self) -> S {
        self.state.get()
    }
}

impl<S> Store for BuiltStore<S>
where
    S: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, event: &str) -> bool {
        self.blueprint.handlers.contains_key(event) || self.blueprint.fallback.is_some()
    }

    fn handle(&self, event: &str, payload: &Value, scope: &DispatchScope<'_>) -> FluxResult<()> {
        match self.blueprint.handlers.get(event).or(self.blueprint.fallback.as_ref()) {
            Some(handler) => handler(self, payload, scope),
            None => Ok(()),
        }
    }

    fn dehydrate(&self) -> FluxResult<Value> {
        self.state.read(|state| (self.blueprint.dehydrate)(state))
    }

    fn rehydrate(&self, state: Value) -> FluxResult<()> {
        let next = (self.blueprint.rehydrate)(state)?;
        self.state.set(next);
        Ok(())
    }

    fn emitter(&self) -> &ChangeEmitter {
        &self.emitter
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
