use std::sync::Arc;

use crate::dispatcher::WeakDispatcherContext;
use crate::error::{FluxError, FluxResult};
use crate::extensions::Extensions;
use crate::store::Store;

/// Facade handed to every store when it is instantiated.
///
/// Gives peer lookups within the same context and whatever members plugins
/// contributed through `plug_store_context`.
#[derive(Clone)]
pub struct StoreContext {
    extensions: Extensions,
    dispatcher: WeakDispatcherContext,
}

impl StoreContext {
    pub(crate) fn new(extensions: Extensions, dispatcher: WeakDispatcherContext) -> Self {
        Self {
            extensions,
            dispatcher,
        }
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

    /// Look up a peer store in the same context.
    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        match self.dispatcher.upgrade() {
            Some(dispatcher) => dispatcher.get_store(name),
            None => Err(FluxError::UnknownStore(name.to_string())),
        }
    }

    pub(crate) fn into_extensions(self) -> Extensions {
        self.extensions
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext")
            .field("extensions", &self.extensions)
            .finish()
    }
}
