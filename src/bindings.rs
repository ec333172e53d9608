//! Store-to-component bindings.
//!
//! A [`StoreConnection`] keeps a value derived from one or more stores up to
//! date for a UI component. It is the connect-to-stores pattern without a
//! UI library: whatever renders the component receives each recomputed value
//! through the `on_state` callback.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use crate::context::ComponentContext;
use crate::error::FluxResult;
use crate::store::{ListenerId, Store};

type GetState<P, S> = Box<dyn Fn(&ComponentContext, &P) -> S + Send + Sync>;
type OnState<S> = Box<dyn Fn(&S) + Send + Sync>;

struct Connection<P, S> {
    component: ComponentContext,
    props: RwLock<P>,
    state: RwLock<S>,
    get_state: GetState<P, S>,
    on_state: OnState<S>,
}

impl<P: Clone, S: Clone> Connection<P, S> {
    fn refresh(&self) {
        let props = self.props.read().clone();
        let state = (self.get_state)(&self.component, &props);
        *self.state.write() = state.clone();
        (self.on_state)(&state);
    }
}

/// A live subscription of a component to a set of stores.
///
/// Dropping the connection removes its store listeners.
pub struct StoreConnection<P, S> {
    connection: Arc<Connection<P, S>>,
    subscriptions: Vec<(Arc<dyn Store>, ListenerId)>,
}

impl<P, S> StoreConnection<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Connect to `stores`.
    ///
    /// `get_state_from_stores` runs once now and again whenever one of the
    /// stores changes or the props are replaced; `on_state` receives every
    /// recomputed value after the initial one. Fails if a store name is not
    /// registered.
    pub fn connect<G, F>(
        component: &ComponentContext,
        stores: &[&str],
        props: P,
        get_state_from_stores: G,
        on_state: F,
    ) -> FluxResult<Self>
    where
        G: Fn(&ComponentContext, &P) -> S + Send + Sync + 'static,
        F: Fn(&S) + Send + Sync + 'static,
    {
        let targets = stores
            .iter()
            .map(|name| component.get_store(name))
            .collect::<FluxResult<Vec<_>>>()?;

        let initial = get_state_from_stores(component, &props);
        let connection = Arc::new(Connection {
            component: component.clone(),
            props: RwLock::new(props),
            state: RwLock::new(initial),
            get_state: Box::new(get_state_from_stores),
            on_state: Box::new(on_state),
        });

        let subscriptions = targets
            .into_iter()
            .map(|store| {
                let weak: Weak<Connection<P, S>> = Arc::downgrade(&connection);
                let id = store.emitter().subscribe(move || {
                    if let Some(connection) = weak.upgrade() {
                        connection.refresh();
                    }
                });
                (store, id)
            })
            .collect();

        Ok(Self {
            connection,
            subscriptions,
        })
    }

    /// The most recently computed state.
    pub fn state(&self) -> S {
        self.connection.state.read().clone()
    }

    pub fn props(&self) -> P {
        self.connection.props.read().clone()
    }

    /// Replace the props and recompute.
    pub fn set_props(&self, props: P) {
        *self.connection.props.write() = props;
        self.connection.refresh();
    }

    /// Names of the stores this connection listens to.
    pub fn stores(&self) -> Vec<&str> {
        self.subscriptions
            .iter()
            .map(|(store, _)| store.name())
            .collect()
    }
}

impl<P, S> Drop for StoreConnection<P, S> {
    fn drop(&mut self) {
        for (store, id) in self.subscriptions.drain(..) {
            store.emitter().unsubscribe(id);
        }
    }
}

impl<P, S> std::fmt::Debug for StoreConnection<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, FluxContext, Fluxible};
    use crate::error::FluxError;
    use crate::store::{BuiltStore, StoreBuilder};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    fn context() -> FluxContext {
        let counter = StoreBuilder::new("Counter", Counter::default)
            .on("INCREMENT", |store, _, _| {
                store.state().update(|s| s.count += 1);
                store.emit_change();
                Ok(())
            })
            .build()
            .unwrap();
        Fluxible::builder()
            .store(counter)
            .build()
            .unwrap()
            .create_context(ContextOptions::default())
    }

    fn scaled_count(cx: &ComponentContext, factor: &i64) -> i64 {
        cx.get_typed::<BuiltStore<Counter>>("Counter")
            .map(|store| store.read(|s| s.count) * factor)
            .unwrap_or_default()
    }

    #[test]
    fn recomputes_on_store_change_and_props() {
        let cx = context();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let connection = StoreConnection::connect(
            &cx.get_component_context(),
            &["Counter"],
            10,
            scaled_count,
            move |state: &i64| sink.write().push(*state),
        )
        .unwrap();
        assert_eq!(connection.state(), 0);
        assert!(seen.read().is_empty());

        cx.get_action_context().dispatch("INCREMENT", json!({})).unwrap();
        assert_eq!(connection.state(), 10);

        connection.set_props(3);
        assert_eq!(connection.state(), 3);
        assert_eq!(connection.props(), 3);
        assert_eq!(*seen.read(), vec![10, 3]);
    }

    #[test]
    fn drop_unsubscribes() {
        let cx = context();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let connection = StoreConnection::connect(
            &cx.get_component_context(),
            &["Counter"],
            1,
            scaled_count,
            move |_: &i64| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        assert_eq!(connection.stores(), vec!["Counter"]);

        let store = cx.get_store("Counter").unwrap();
        assert_eq!(store.emitter().listener_count(), 1);

        drop(connection);
        assert_eq!(store.emitter().listener_count(), 0);

        cx.get_action_context().dispatch("INCREMENT", json!({})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_store_fails_to_connect() {
        let cx = context();
        let result = StoreConnection::connect(
            &cx.get_component_context(),
            &["Counter", "Missing"],
            (),
            |_, _| 0,
            |_: &i32| {},
        );
        assert!(matches!(result, Err(FluxError::UnknownStore(ref name)) if name == "Missing"));
    }
}
