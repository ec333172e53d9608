use serde_json::Value;
use std::sync::Arc;

use super::context::DispatcherContext;
use crate::error::FluxResult;
use crate::store::Store;

/// Progress of one store through the event currently being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    NotStarted,
    Handling,
    Done,
    /// The handler returned an error. It is not run again for this event.
    Failed,
}

/// View of the running dispatch handed to each store handler.
pub struct DispatchScope<'a> {
    pub(super) context: &'a DispatcherContext,
    pub(super) event: &'a str,
    pub(super) payload: &'a Value,
    pub(super) store: &'a str,
}

impl<'a> DispatchScope<'a> {
    /// Name of the event being dispatched.
    pub fn event(&self) -> &str {
        self.event
    }

    pub fn payload(&self) -> &Value {
        self.payload
    }

    /// Name of the store whose handler is running.
    pub fn store_name(&self) -> &str {
        self.store
    }

    /// Make sure the named stores finish handling the current event before
    /// the caller continues.
    ///
    /// Stores already done return immediately, stores not yet started run
    /// now, and a store that is itself waiting further up the chain is a
    /// cycle reported as [`FluxError::CircularWait`](crate::FluxError::CircularWait).
    /// Stores that do not take part in this dispatch (not instantiated, or
    /// no handler for the event) are skipped.
    pub fn wait_for<I, N>(&self, stores: I) -> FluxResult<()>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        for name in stores {
            self.context
                .wait_for_store(name.as_ref(), self.event, self.payload)?;
        }
        Ok(())
    }

    /// Look up a peer store in the same context.
    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        self.context.get_store(name)
    }

    /// Look up a peer store by concrete type.
    pub fn get_typed<T: Store>(&self, name: &str) -> FluxResult<Arc<T>> {
        self.context.get_typed(name)
    }
}
