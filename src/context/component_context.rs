use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::flux_context::ContextShared;
use crate::action::Action;
use crate::error::FluxResult;
use crate::extensions::Extensions;
use crate::store::{ListenerId, Store};

/// Facade handed to UI components.
///
/// Components read stores, subscribe to their changes and start actions,
/// but never receive action results: failures go to the application's
/// component action error handler.
#[derive(Clone)]
pub struct ComponentContext {
    shared: Arc<ContextShared>,
    extensions: Extensions,
}

impl ComponentContext {
    pub(crate) fn new(shared: Arc<ContextShared>) -> Self {
        Self {
            shared,
            extensions: Extensions::new(),
        }
    }

    /// Start an action on behalf of a component.
    ///
    /// The action starts when the returned future is first polled; a future
    /// that is dropped unpolled never runs it. Spawn it when the component
    /// does not wait for the result. The future resolves once the action
    /// settles. A failure is passed to the configured error handler, or
    /// logged when there is none.
    pub fn execute_action(&self, action: &Action, payload: Value) -> impl Future<Output = ()> + Send + 'static {
        let component = self.clone();
        let action = action.clone();
        async move {
            let name = action.name().to_string();
            let shared = Arc::clone(&component.shared);
            if let Err(err) = shared.execute(None, action, payload).await {
                match &component.shared.error_handler {
                    Some(handler) => handler(&component, &name, err),
                    None => tracing::warn!(action = %name, error = %err, "component action failed"),
                }
            }
        }
    }

    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        self.shared.dispatcher.get_store(name)
    }

    pub fn get_typed<T: Store>(&self, name: &str) -> FluxResult<Arc<T>> {
        self.shared.dispatcher.get_typed(name)
    }

    /// Subscribe to change notifications of the named store.
    pub fn on_store_change<F>(&self, store: &str, listener: F) -> FluxResult<ListenerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Ok(self.get_store(store)?.emitter().subscribe(listener))
    }

    /// Undo [`on_store_change`](Self::on_store_change).
    pub fn off_store_change(&self, store: &str, id: ListenerId) -> FluxResult<bool> {
        Ok(self.get_store(store)?.emitter().unsubscribe(id))
    }

    /// Plugin member of type `T`, if one was contributed.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("extensions", &self.extensions)
            .finish()
    }
}
