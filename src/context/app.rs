use parking_lot::RwLock;
use std::sync::Arc;

use super::component_context::ComponentContext;
use super::flux_context::{ContextShared, FluxContext};
use super::options::ContextOptions;
use super::store_context::StoreContext;
use crate::clock::{IdSource, UuidSource};
use crate::config::AppConfig;
use crate::dehydrate::DehydratedState;
use crate::dispatcher::{Dispatcher, WeakDispatcherContext};
use crate::error::{FluxError, FluxResult};
use crate::extensions::Extensions;
use crate::plugin::{ContextPlugin, Plugin};
use crate::store::StoreDefinition;

/// Receives failures of actions started from a [`ComponentContext`], along
/// with the failed action's name.
pub type ComponentErrorHandler = Arc<dyn Fn(&ComponentContext, &str, FluxError) + Send + Sync>;

struct AppInner {
    dispatcher: Dispatcher,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    ids: Arc<dyn IdSource>,
    error_handler: Option<ComponentErrorHandler>,
    config: AppConfig,
}

/// A Flux application: store definitions, plugins and context factory.
///
/// One instance is shared by all requests; every request gets its own
/// [`FluxContext`] from [`create_context`](Self::create_context).
#[derive(Clone)]
pub struct Fluxible {
    inner: Arc<AppInner>,
}

impl Default for Fluxible {
    fn default() -> Self {
        Self::new()
    }
}

impl Fluxible {
    pub fn new() -> Self {
        Self::from_config(AppConfig::default())
    }

    /// Application using `config`; the event catalogue, if any, is enforced.
    pub fn from_config(config: AppConfig) -> Self {
        Self::assemble(config, Arc::new(UuidSource), None)
    }

    pub fn builder() -> FluxibleBuilder {
        FluxibleBuilder::default()
    }

    fn assemble(config: AppConfig, ids: Arc<dyn IdSource>, error_handler: Option<ComponentErrorHandler>) -> Self {
        let dispatcher = match &config.events {
            Some(events) => Dispatcher::with_events(events.iter().cloned()),
            None => Dispatcher::new(),
        };
        Self {
            inner: Arc::new(AppInner {
                dispatcher,
                plugins: RwLock::new(Vec::new()),
                ids,
                error_handler,
                config,
            }),
        }
    }

    pub fn register_store(&self, definition: StoreDefinition) -> FluxResult<()> {
        self.inner.dispatcher.register_store(definition)
    }

    /// Add a plugin. Plugins apply to contexts created afterwards, in the
    /// order they were added.
    pub fn plug<P: Plugin + 'static>(&self, plugin: P) {
        tracing::debug!(plugin = plugin.name(), "plugged");
        self.inner.plugins.write().push(Arc::new(plugin));
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.inner
            .plugins
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Create a fresh context with its own stores and plugin instances.
    pub fn create_context(&self, options: ContextOptions) -> FluxContext {
        let plugins: Vec<Arc<dyn Plugin>> = self.inner.plugins.read().clone();
        let context_plugins: Vec<(String, Box<dyn ContextPlugin>)> = plugins
            .iter()
            .map(|plugin| (plugin.name().to_string(), plugin.plug_context(&options)))
            .collect();

        let mut store_context = StoreContext::new(Extensions::new(), WeakDispatcherContext::detached());
        for (_, plugin) in &context_plugins {
            plugin.plug_store_context(&mut store_context);
        }
        let store_extensions = store_context.into_extensions();

        let ids = options
            .ids
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.inner.ids));
        let shared = Arc::new(ContextShared {
            dispatcher: self.inner.dispatcher.create_context_with(store_extensions.clone()),
            plugins: context_plugins,
            ids,
            options,
            error_handler: self.inner.error_handler.clone(),
        });

        let mut component = ComponentContext::new(Arc::clone(&shared));
        for (_, plugin) in &shared.plugins {
            plugin.plug_component_context(&mut component);
        }

        tracing::debug!(plugins = shared.plugins.len(), "created context");
        FluxContext::new(shared, component, store_extensions)
    }

    /// Rebuild a context from dehydrated state.
    ///
    /// Plugins and stores are fully rehydrated before the context is
    /// returned. On error no context is returned.
    pub fn rehydrate(&self, state: DehydratedState) -> FluxResult<FluxContext> {
        self.rehydrate_with(state, ContextOptions::default())
    }

    pub fn rehydrate_with(&self, state: DehydratedState, options: ContextOptions) -> FluxResult<FluxContext> {
        let context = self.create_context(options);
        context.rehydrate(state)?;
        Ok(context)
    }

    /// Rehydrate from the JSON text produced on the server.
    pub fn rehydrate_json(&self, json: &str) -> FluxResult<FluxContext> {
        self.rehydrate(DehydratedState::from_json(json)?)
    }
}

impl std::fmt::Debug for Fluxible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fluxible")
            .field("dispatcher", &self.inner.dispatcher)
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

/// Builder for [`Fluxible`].
#[derive(Default)]
pub struct FluxibleBuilder {
    config: AppConfig,
    ids: Option<Arc<dyn IdSource>>,
    error_handler: Option<ComponentErrorHandler>,
    stores: Vec<StoreDefinition>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl FluxibleBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict the application to a fixed event catalogue.
    pub fn events<I, E>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.config.events = Some(events.into_iter().map(Into::into).collect());
        self
    }

    /// Id source for action records.
    pub fn id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn component_action_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ComponentContext, &str, FluxError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn store(mut self, definition: StoreDefinition) -> Self {
        self.stores.push(definition);
        self
    }

    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Build the application. Fails if a store is rejected by the registry.
    pub fn build(self) -> FluxResult<Fluxible> {
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidSource));
        let app = Fluxible::assemble(self.config, ids, self.error_handler);
        for definition in self.stores {
            app.register_store(definition)?;
        }
        app.inner.plugins.write().extend(self.plugins);
        Ok(app)
    }
}
