use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::builder::StoreBuilder;
use super::definition::StoreDefinition;
use crate::error::FluxResult;

type Reducer<S> = Arc<dyn Fn(&S, &Value) -> S + Send + Sync>;

/// Store whose handlers are pure reducers: `(state, payload) -> state`.
///
/// A change is emitted only when the reducer returns a state different from
/// the current one.
pub struct ReducerStore<S> {
    name: String,
    initial: S,
    reducers: Vec<(String, Reducer<S>)>,
}

impl<S> ReducerStore<S>
where
    S: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        Self {
            name: name.into(),
            initial,
            reducers: Vec::new(),
        }
    }

    /// Reduce `event` with `reducer`.
    pub fn reducer<F>(mut self, event: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&S, &Value) -> S + Send + Sync + 'static,
    {
        self.reducers.push((event.into(), Arc::new(reducer)));
        self
    }

    pub fn build(self) -> FluxResult<StoreDefinition> {
        let initial = self.initial;
        let mut builder = StoreBuilder::new(self.name, move || initial.clone());

        for (event, reducer) in self.reducers {
            builder = builder.on(event, move |store, payload, _scope| {
                // The reducer sees a snapshot; no lock is held while it runs.
                let current = store.get();
                let next = reducer(&current, payload);
                if next != current {
                    store.state().set(next);
                    store.emit_change();
                }
                Ok(())
            });
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::store::{BuiltStore, Store};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn todos() -> StoreDefinition {
        ReducerStore::new("Todos", Vec::<String>::new())
            .reducer("ADD_TODO", |state, payload| {
                let mut next = state.clone();
                if let Some(text) = payload["text"].as_str() {
                    next.push(text.to_string());
                }
                next
            })
            .reducer("NOOP", |state, _| state.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn reducers_replace_state() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(todos()).unwrap();
        let cx = dispatcher.create_context();
        let store = cx.get_typed::<BuiltStore<Vec<String>>>("Todos").unwrap();

        cx.dispatch("ADD_TODO", json!({ "text": "write tests" })).unwrap();

        assert_eq!(store.get(), vec!["write tests".to_string()]);
    }

    #[test]
    fn change_emitted_only_when_state_differs() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(todos()).unwrap();
        let cx = dispatcher.create_context();
        let store = cx.get_typed::<BuiltStore<Vec<String>>>("Todos").unwrap();

        let changes = Arc::new(AtomicUsize::new(0));
        let changes_clone = changes.clone();
        store.emitter().subscribe(move || {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        cx.dispatch("NOOP", json!(null)).unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        cx.dispatch("ADD_TODO", json!({ "text": "a" })).unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reducer_may_read_its_own_store() {
        let slot: Arc<parking_lot::Mutex<Option<Arc<BuiltStore<Vec<String>>>>>> = Arc::default();
        let handle = slot.clone();
        let def = ReducerStore::new("Log", Vec::<String>::new())
            .reducer("APPEND", move |state, _| {
                let seen = handle
                    .lock()
                    .as_ref()
                    .map(|store| store.read(|entries| entries.len()))
                    .unwrap_or_default();
                let mut next = state.clone();
                next.push(format!("entry {seen}"));
                next
            })
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new();
        dispatcher.register_store(def).unwrap();
        let cx = dispatcher.create_context();
        let store = cx.get_typed::<BuiltStore<Vec<String>>>("Log").unwrap();
        *slot.lock() = Some(store.clone());

        cx.dispatch("APPEND", json!(null)).unwrap();
        cx.dispatch("APPEND", json!(null)).unwrap();

        assert_eq!(store.get(), vec!["entry 0".to_string(), "entry 1".to_string()]);
        *slot.lock() = None;
    }
}
