use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use super::action_context::{ActionContext, ActionRecord};
use super::app::ComponentErrorHandler;
use super::component_context::ComponentContext;
use super::options::ContextOptions;
use super::store_context::StoreContext;
use crate::action::{Action, ActionCall};
use crate::clock::IdSource;
use crate::dehydrate::DehydratedState;
use crate::dispatcher::DispatcherContext;
use crate::error::{FluxError, FluxResult};
use crate::extensions::Extensions;
use crate::plugin::ContextPlugin;
use crate::store::Store;

/// State shared by every facade of one context.
pub(crate) struct ContextShared {
    pub(crate) dispatcher: DispatcherContext,
    pub(crate) plugins: Vec<(String, Box<dyn ContextPlugin>)>,
    pub(crate) ids: Arc<dyn IdSource>,
    pub(crate) options: ContextOptions,
    pub(crate) error_handler: Option<ComponentErrorHandler>,
}

impl ContextShared {
    /// New action context for `display_name`, run through every plugin.
    pub(crate) fn action_context(self: &Arc<Self>, parent: Option<&ActionRecord>, display_name: &str) -> ActionContext {
        let record = ActionRecord::child(parent, self.ids.next_id(), display_name);
        let mut context = ActionContext::new(Arc::clone(self), record);
        for (_, plugin) in &self.plugins {
            plugin.plug_action_context(&mut context);
        }
        context
    }

    pub(crate) async fn execute(
        self: Arc<Self>,
        parent: Option<ActionRecord>,
        action: Action,
        payload: Value,
    ) -> FluxResult<Value> {
        let context = self.action_context(parent.as_ref(), action.name());
        let mut call = ActionCall {
            action,
            context,
            payload,
        };
        for (_, plugin) in &self.plugins {
            call = plugin.plug_execute_action(call);
        }

        let record = call.context.record();
        let span = tracing::debug_span!(
            "action",
            action = %record.display_name,
            id = %record.id,
            root_id = %record.root_id,
        );
        call.action
            .invoke(call.context, call.payload)
            .instrument(span)
            .await
    }
}

/// One request's (server) or page session's (client) Flux context.
///
/// Owns the dispatcher context and the per-context plugin instances. Clones
/// share the same stores.
#[derive(Clone)]
pub struct FluxContext {
    shared: Arc<ContextShared>,
    component: ComponentContext,
    store_extensions: Extensions,
}

impl FluxContext {
    pub(crate) fn new(shared: Arc<ContextShared>, component: ComponentContext, store_extensions: Extensions) -> Self {
        Self {
            shared,
            component,
            store_extensions,
        }
    }

    /// Execute a top-level action.
    ///
    /// The returned future settles exactly once with the action's result.
    /// It is lazy: the action starts on the first poll.
    pub fn execute_action(
        &self,
        action: &Action,
        payload: Value,
    ) -> impl Future<Output = FluxResult<Value>> + Send + 'static {
        Arc::clone(&self.shared).execute(None, action.clone(), payload)
    }

    /// A root action context, for callers that need to dispatch directly.
    pub fn get_action_context(&self) -> ActionContext {
        self.shared.action_context(None, "context")
    }

    pub fn get_component_context(&self) -> ComponentContext {
        self.component.clone()
    }

    pub fn get_store_context(&self) -> StoreContext {
        StoreContext::new(self.store_extensions.clone(), self.shared.dispatcher.downgrade())
    }

    pub fn dispatcher_context(&self) -> &DispatcherContext {
        &self.shared.dispatcher
    }

    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        self.shared.dispatcher.get_store(name)
    }

    pub fn get_typed<T: Store>(&self, name: &str) -> FluxResult<Arc<T>> {
        self.shared.dispatcher.get_typed(name)
    }

    pub fn options(&self) -> &ContextOptions {
        &self.shared.options
    }

    /// Names of the plugins applied to this context, in order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.shared
            .plugins
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serialise every instantiated store and every plugin that has state.
    pub fn dehydrate(&self) -> FluxResult<DehydratedState> {
        let mut state = DehydratedState {
            stores: self.shared.dispatcher.dehydrate()?,
            ..DehydratedState::default()
        };
        for (name, plugin) in &self.shared.plugins {
            if let Some(value) = plugin.dehydrate()? {
                state.plugins.insert(name.clone(), value);
            }
        }
        tracing::debug!(
            stores = state.stores.len(),
            plugins = state.plugins.len(),
            "dehydrated context"
        );
        Ok(state)
    }

    /// Apply dehydrated state: plugins first, in registration order, then
    /// stores.
    pub(crate) fn rehydrate(&self, mut state: DehydratedState) -> FluxResult<()> {
        for (name, plugin) in &self.shared.plugins {
            if let Some(value) = state.plugins.remove(name) {
                plugin.rehydrate(value).map_err(|err| match err {
                    err @ FluxError::Rehydrate { .. } => err,
                    other => FluxError::rehydrate(name.as_str(), other),
                })?;
            }
        }
        self.shared.dispatcher.rehydrate(state.stores)
    }
}

impl std::fmt::Debug for FluxContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluxContext")
            .field("dispatcher", &self.shared.dispatcher)
            .field("plugins", &self.plugin_names())
            .finish()
    }
}
