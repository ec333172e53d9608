use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};

use super::dispatcher::Dispatcher;
use super::scope::{DispatchScope, HandlerStatus};
use crate::context::StoreContext;
use crate::error::{FluxError, FluxResult};
use crate::extensions::Extensions;
use crate::store::Store;

/// Bookkeeping for the dispatch currently on the stack.
struct ActiveDispatch {
    event: String,
    status: IndexMap<String, HandlerStatus>,
    // Stores whose handler is running, outermost first.
    handling: Vec<String>,
}

struct ContextInner {
    dispatcher: Dispatcher,
    store_extensions: Extensions,
    stores: Mutex<IndexMap<String, Arc<dyn Store>>>,
    // Held for a whole dispatch. Other threads queue behind it; the owning
    // thread re-enters and is turned away by `active`.
    serial: ReentrantMutex<()>,
    active: Mutex<Option<ActiveDispatch>>,
}

/// Per-context store registry and dispatch engine.
///
/// Owns exactly one instance of each store that has been asked for, in the
/// order they were first accessed. Cloning shares the same registry.
#[derive(Clone)]
pub struct DispatcherContext {
    inner: Arc<ContextInner>,
}

/// Non-owning handle to a [`DispatcherContext`], held by stores.
#[derive(Clone)]
pub struct WeakDispatcherContext {
    inner: Weak<ContextInner>,
}

impl WeakDispatcherContext {
    /// Handle that never upgrades; used before a context exists.
    pub(crate) fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    pub fn upgrade(&self) -> Option<DispatcherContext> {
        self.inner.upgrade().map(|inner| DispatcherContext { inner })
    }
}

/// Clears the active dispatch even when a handler fails.
struct ActiveGuard<'a>(&'a Mutex<Option<ActiveDispatch>>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl DispatcherContext {
    pub(crate) fn new(dispatcher: Dispatcher, store_extensions: Extensions) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                dispatcher,
                store_extensions,
                stores: Mutex::new(IndexMap::new()),
                serial: ReentrantMutex::new(()),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn downgrade(&self) -> WeakDispatcherContext {
        WeakDispatcherContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Get the instance of a store, creating it on first access.
    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        if let Some(store) = self.inner.stores.lock().get(name) {
            return Ok(Arc::clone(store));
        }

        let definition = self.inner.dispatcher.definition(name)?;
        let context = StoreContext::new(self.inner.store_extensions.clone(), self.downgrade());
        // No lock is held here: initialisers may look up peer stores.
        let created = definition.instantiate(context);

        let mut stores = self.inner.stores.lock();
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(store = name, "instantiated store");
                created
            });
        Ok(Arc::clone(store))
    }

    /// Get a store by its concrete type.
    pub fn get_typed<T: Store>(&self, name: &str) -> FluxResult<Arc<T>> {
        self.get_store(name)?
            .into_any()
            .downcast::<T>()
            .map_err(|_| FluxError::StoreTypeMismatch(name.to_string()))
    }

    /// Names of the stores instantiated so far, in first-access order.
    pub fn instantiated_stores(&self) -> Vec<String> {
        self.inner.stores.lock().keys().cloned().collect()
    }

    pub fn is_instantiated(&self, name: &str) -> bool {
        self.inner.stores.lock().contains_key(name)
    }

    /// Event currently being dispatched, if any.
    pub fn current_event(&self) -> Option<String> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|active| active.event.clone())
    }

    /// Deliver `event` to every instantiated store that handles it.
    ///
    /// Handlers run synchronously in first-access order. Stores that have
    /// not been instantiated in this context are not notified. The first
    /// handler error stops the fan-out and is returned; stores after it do
    /// not see the event.
    ///
    /// Dispatches from different threads run one after another. Dispatching
    /// from inside a handler of the same context fails with
    /// [`FluxError::DispatchInProgress`].
    pub fn dispatch(&self, event: &str, payload: Value) -> FluxResult<()> {
        self.inner.dispatcher.check_event(event)?;

        let _serial = self.inner.serial.lock();
        let participants: Vec<(String, Arc<dyn Store>)> = {
            let mut active = self.inner.active.lock();
            if let Some(current) = active.as_ref() {
                return Err(FluxError::DispatchInProgress {
                    attempted: event.to_string(),
                    current: current.event.clone(),
                });
            }

            let participants: Vec<_> = self
                .inner
                .stores
                .lock()
                .iter()
                .filter(|(_, store)| store.handles(event))
                .map(|(name, store)| (name.clone(), Arc::clone(store)))
                .collect();

            *active = Some(ActiveDispatch {
                event: event.to_string(),
                status: participants
                    .iter()
                    .map(|(name, _)| (name.clone(), HandlerStatus::NotStarted))
                    .collect(),
                handling: Vec::new(),
            });
            participants
        };
        let _guard = ActiveGuard(&self.inner.active);

        tracing::debug!(event, stores = participants.len(), "dispatching");
        for (name, store) in &participants {
            self.run_handler(name, store, event, &payload)?;
        }
        tracing::debug!(event, "dispatch complete");
        Ok(())
    }

    /// Status of `store` in the running dispatch.
    pub fn handler_status(&self, store: &str) -> Option<HandlerStatus> {
        self.inner
            .active
            .lock()
            .as_ref()
            .and_then(|active| active.status.get(store).copied())
    }

    pub(super) fn wait_for_store(&self, name: &str, event: &str, payload: &Value) -> FluxResult<()> {
        if !self.inner.dispatcher.has_store(name) {
            return Err(FluxError::UnknownStore(name.to_string()));
        }
        let store = match self.inner.stores.lock().get(name) {
            Some(store) => Arc::clone(store),
            None => return Ok(()),
        };
        tracing::debug!(event, store = name, "waiting for store");
        self.run_handler(name, &store, event, payload)
    }

    fn run_handler(
        &self,
        name: &str,
        store: &Arc<dyn Store>,
        event: &str,
        payload: &Value,
    ) -> FluxResult<()> {
        {
            let mut guard = self.inner.active.lock();
            let Some(active) = guard.as_mut() else {
                return Err(FluxError::NotDispatching {
                    stores: vec![name.to_string()],
                });
            };
            match active.status.get(name).copied() {
                // A handler runs at most once per dispatch, even if it failed.
                None | Some(HandlerStatus::Done) | Some(HandlerStatus::Failed) => return Ok(()),
                Some(HandlerStatus::Handling) => {
                    let start = active
                        .handling
                        .iter()
                        .position(|s| s == name)
                        .unwrap_or(0);
                    let mut chain = active.handling[start..].to_vec();
                    chain.push(name.to_string());
                    return Err(FluxError::CircularWait {
                        event: event.to_string(),
                        chain,
                    });
                }
                Some(HandlerStatus::NotStarted) => {
                    active
                        .status
                        .insert(name.to_string(), HandlerStatus::Handling);
                    active.handling.push(name.to_string());
                }
            }
        }

        let scope = DispatchScope {
            context: self,
            event,
            payload,
            store: name,
        };
        let result = store.handle(event, payload, &scope);

        if let Some(active) = self.inner.active.lock().as_mut() {
            active.handling.pop();
            let status = if result.is_ok() {
                HandlerStatus::Done
            } else {
                HandlerStatus::Failed
            };
            active.status.insert(name.to_string(), status);
        }
        result
    }

    /// Serialise every instantiated store, keyed by store name.
    pub fn dehydrate(&self) -> FluxResult<Map<String, Value>> {
        let stores: Vec<(String, Arc<dyn Store>)> = self
            .inner
            .stores
            .lock()
            .iter()
            .map(|(name, store)| (name.clone(), Arc::clone(store)))
            .collect();

        let mut out = Map::new();
        for (name, store) in stores {
            out.insert(name, store.dehydrate()?);
        }
        Ok(out)
    }

    /// Restore store states produced by [`dehydrate`](Self::dehydrate).
    ///
    /// Every named store is instantiated and rehydrated; registered stores
    /// missing from `states` keep their fresh state.
    pub fn rehydrate(&self, states: Map<String, Value>) -> FluxResult<()> {
        for (name, state) in states {
            let store = self.get_store(&name)?;
            store.rehydrate(state).map_err(|err| match err {
                err @ FluxError::Rehydrate { .. } => err,
                other => FluxError::rehydrate(name.as_str(), other),
            })?;
            tracing::debug!(store = %name, "rehydrated store");
        }
        Ok(())
    }
}

impl std::fmt::Debug for DispatcherContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherContext")
            .field("stores", &self.instantiated_stores())
            .field("dispatching", &self.current_event())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BuiltStore, StoreBuilder};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Flags {
        ready: bool,
        saw_peer_ready: Option<bool>,
    }

    fn counter_store() -> crate::store::StoreDefinition {
        StoreBuilder::new("Counter", Counter::default)
            .on("INCREMENT", |store, _, _| {
                store.state().update(|s| s.count += 1);
                Ok(())
            })
            .build()
            .unwrap()
    }

    fn context_with(defs: Vec<crate::store::StoreDefinition>) -> DispatcherContext {
        let dispatcher = Dispatcher::new();
        for def in defs {
            dispatcher.register_store(def).unwrap();
        }
        dispatcher.create_context()
    }

    #[test]
    fn increment_three_times() {
        let cx = context_with(vec![counter_store()]);
        let store = cx.get_typed::<BuiltStore<Counter>>("Counter").unwrap();

        for _ in 0..3 {
            cx.dispatch("INCREMENT", json!(null)).unwrap();
        }

        assert_eq!(store.get().count, 3);
    }

    #[test]
    fn stores_not_yet_accessed_are_not_notified() {
        let cx = context_with(vec![counter_store()]);

        cx.dispatch("INCREMENT", json!(null)).unwrap();
        assert!(!cx.is_instantiated("Counter"));

        // The first access creates a fresh store that missed the earlier event.
        let store = cx.get_typed::<BuiltStore<Counter>>("Counter").unwrap();
        assert_eq!(store.get().count, 0);

        cx.dispatch("INCREMENT", json!(null)).unwrap();
        assert_eq!(store.get().count, 1);
    }

    #[test]
    fn one_instance_per_context() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(counter_store()).unwrap();
        let a = dispatcher.create_context();
        let b = dispatcher.create_context();

        let first = a.get_store("Counter").unwrap();
        let again = a.get_store("Counter").unwrap();
        let other = b.get_store("Counter").unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn unknown_store_is_an_error() {
        let cx = context_with(vec![]);
        assert!(matches!(cx.get_store("Nope"), Err(FluxError::UnknownStore(_))));
    }

    #[test]
    fn typed_lookup_checks_state_type() {
        let cx = context_with(vec![counter_store()]);
        let err = cx.get_typed::<BuiltStore<Flags>>("Counter").unwrap_err();
        assert!(matches!(err, FluxError::StoreTypeMismatch(_)));
    }

    #[test]
    fn handlers_run_in_first_access_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let make = |name: &'static str| {
            let order = order.clone();
            StoreBuilder::new(name, || 0u8)
                .on("PING", move |_, _, scope| {
                    order.lock().push(scope.store_name().to_string());
                    Ok(())
                })
                .build()
                .unwrap()
        };
        let cx = context_with(vec![make("A"), make("B"), make("C")]);
        cx.get_store("C").unwrap();
        cx.get_store("A").unwrap();
        cx.get_store("B").unwrap();

        cx.dispatch("PING", json!(null)).unwrap();

        assert_eq!(*order.lock(), vec!["C", "A", "B"]);
    }

    #[test]
    fn wait_for_runs_dependency_first() {
        let a = StoreBuilder::new("A", Flags::default)
            .on("SYNC", |store, _, scope| {
                scope.wait_for(["B"])?;
                let peer = scope.get_typed::<BuiltStore<Flags>>("B")?;
                let ready = peer.read(|f| f.ready);
                store.state().update(|s| s.saw_peer_ready = Some(ready));
                Ok(())
            })
            .build()
            .unwrap();
        let b = StoreBuilder::new("B", Flags::default)
            .on("SYNC", |store, _, _| {
                store.state().update(|s| s.ready = true);
                Ok(())
            })
            .build()
            .unwrap();
        let cx = context_with(vec![a, b]);
        // A is accessed first so it would run first without wait_for.
        let a = cx.get_typed::<BuiltStore<Flags>>("A").unwrap();
        cx.get_store("B").unwrap();

        cx.dispatch("SYNC", json!(null)).unwrap();

        assert_eq!(a.get().saw_peer_ready, Some(true));
    }

    #[test]
    fn waited_store_handles_event_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let a = StoreBuilder::new("A", || 0u8)
            .on("SYNC", |_, _, scope| scope.wait_for(["B"]))
            .build()
            .unwrap();
        let b = StoreBuilder::new("B", || 0u8)
            .on("SYNC", move |_, _, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        let cx = context_with(vec![a, b]);
        cx.get_store("A").unwrap();
        cx.get_store("B").unwrap();

        cx.dispatch("SYNC", json!(null)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn circular_wait_is_reported() {
        let a = StoreBuilder::new("A", || 0u8)
            .on("SYNC", |_, _, scope| scope.wait_for(["B"]))
            .build()
            .unwrap();
        let b = StoreBuilder::new("B", || 0u8)
            .on("SYNC", |_, _, scope| scope.wait_for(["A"]))
            .build()
            .unwrap();
        let cx = context_with(vec![a, b]);
        cx.get_store("A").unwrap();
        cx.get_store("B").unwrap();

        let err = cx.dispatch("SYNC", json!(null)).unwrap_err();

        match err {
            FluxError::CircularWait { event, chain } => {
                assert_eq!(event, "SYNC");
                assert_eq!(chain, vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The context is usable again afterwards.
        assert!(cx.current_event().is_none());
    }

    fn waiting_store(name: &'static str, waits_on: &'static str) -> crate::store::StoreDefinition {
        StoreBuilder::new(name, || 0u8)
            .on("SYNC", move |_, _, scope| scope.wait_for([waits_on]))
            .build()
            .unwrap()
    }

    fn wait_chain(err: FluxError) -> Vec<String> {
        match err {
            FluxError::CircularWait { chain, .. } => chain,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transitive_circular_wait_reports_full_chain() {
        let cx = context_with(vec![
            waiting_store("A", "B"),
            waiting_store("B", "C"),
            waiting_store("C", "A"),
        ]);
        for name in ["A", "B", "C"] {
            cx.get_store(name).unwrap();
        }

        let err = cx.dispatch("SYNC", json!(null)).unwrap_err();

        assert_eq!(wait_chain(err), vec!["A", "B", "C", "A"]);
        assert!(cx.current_event().is_none());
    }

    #[test]
    fn store_waiting_for_itself_is_circular() {
        let cx = context_with(vec![waiting_store("A", "A")]);
        cx.get_store("A").unwrap();

        let err = cx.dispatch("SYNC", json!(null)).unwrap_err();

        assert_eq!(wait_chain(err), vec!["A", "A"]);
    }

    #[test]
    fn failed_dependency_is_not_rerun_or_reported_as_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let a = StoreBuilder::new("A", || 0u8)
            .on("SYNC", |_, _, scope| {
                // The dependency's failure is tolerated here.
                let _ = scope.wait_for(["B"]);
                Ok(())
            })
            .build()
            .unwrap();
        let b = StoreBuilder::new("B", || 0u8)
            .on("SYNC", move |_, _, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Err(FluxError::Action(anyhow::anyhow!("b failed")))
            })
            .build()
            .unwrap();
        let cx = context_with(vec![a, b]);
        cx.get_store("A").unwrap();
        cx.get_store("B").unwrap();

        cx.dispatch("SYNC", json!(null)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatches_from_other_threads_wait_their_turn() {
        let slow = StoreBuilder::new("Counter", Counter::default)
            .on("TICK", |store, _, _| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                store.state().update(|s| s.count += 1);
                Ok(())
            })
            .build()
            .unwrap();
        let cx = context_with(vec![slow]);
        let store = cx.get_typed::<BuiltStore<Counter>>("Counter").unwrap();

        let results: Vec<FluxResult<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(|| cx.dispatch("TICK", json!(null))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(Result::is_ok), "{results:?}");
        assert_eq!(store.get().count, 2);
        assert!(cx.current_event().is_none());
    }

    #[test]
    fn wait_for_unknown_store_fails() {
        let a = StoreBuilder::new("A", || 0u8)
            .on("SYNC", |_, _, scope| scope.wait_for(["Ghost"]))
            .build()
            .unwrap();
        let cx = context_with(vec![a]);
        cx.get_store("A").unwrap();

        let err = cx.dispatch("SYNC", json!(null)).unwrap_err();
        assert!(matches!(err, FluxError::UnknownStore(ref s) if s == "Ghost"));
    }

    #[test]
    fn wait_for_skips_stores_outside_the_dispatch() {
        let a = StoreBuilder::new("A", || 0u8)
            .on("SYNC", |_, _, scope| scope.wait_for(["B"]))
            .build()
            .unwrap();
        let b = StoreBuilder::new("B", || 0u8)
            .on("OTHER", |_, _, _| Ok(()))
            .build()
            .unwrap();
        let cx = context_with(vec![a, b]);
        cx.get_store("A").unwrap();

        cx.dispatch("SYNC", json!(null)).unwrap();
    }

    #[test]
    fn handler_error_aborts_remaining_stores() {
        let failing = StoreBuilder::new("Failing", || 0u8)
            .on("INCREMENT", |_, _, _| {
                Err(FluxError::Action(anyhow::anyhow!("boom")))
            })
            .build()
            .unwrap();
        let cx = context_with(vec![failing, counter_store()]);
        cx.get_store("Failing").unwrap();
        let counter = cx.get_typed::<BuiltStore<Counter>>("Counter").unwrap();

        let err = cx.dispatch("INCREMENT", json!(null)).unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(counter.get().count, 0);
        assert!(cx.current_event().is_none());
    }

    #[test]
    fn nested_dispatch_is_rejected() {
        let slot: Arc<Mutex<Option<DispatcherContext>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let def = StoreBuilder::new("Reentrant", || 0u8)
            .on("OUTER", move |_, _, _| {
                let cx = slot_clone.lock().clone();
                match cx {
                    Some(cx) => cx.dispatch("INNER", json!(null)),
                    None => Ok(()),
                }
            })
            .build()
            .unwrap();
        let cx = context_with(vec![def]);
        *slot.lock() = Some(cx.clone());
        cx.get_store("Reentrant").unwrap();

        let err = cx.dispatch("OUTER", json!(null)).unwrap_err();
        assert!(matches!(
            err,
            FluxError::DispatchInProgress { ref attempted, ref current }
                if attempted == "INNER" && current == "OUTER"
        ));
        *slot.lock() = None;
    }

    #[test]
    fn empty_event_name_is_rejected() {
        let cx = context_with(vec![counter_store()]);
        assert!(matches!(cx.dispatch("", json!(null)), Err(FluxError::InvalidEventName)));
    }

    #[test]
    fn dehydrate_then_rehydrate_round_trips() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(counter_store()).unwrap();

        let server = dispatcher.create_context();
        server.get_store("Counter").unwrap();
        for _ in 0..5 {
            server.dispatch("INCREMENT", json!(null)).unwrap();
        }
        let state = server.dehydrate().unwrap();
        assert_eq!(Value::Object(state.clone()), json!({ "Counter": { "count": 5 } }));

        let client = dispatcher.create_context();
        client.rehydrate(state).unwrap();
        let store = client.get_typed::<BuiltStore<Counter>>("Counter").unwrap();
        assert_eq!(store.get().count, 5);
    }

    #[test]
    fn rehydrate_rejects_unregistered_store() {
        let cx = context_with(vec![counter_store()]);
        let mut states = Map::new();
        states.insert("Ghost".to_string(), json!({}));

        assert!(matches!(cx.rehydrate(states), Err(FluxError::UnknownStore(_))));
    }
}
