use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::emitter::ChangeEmitter;
use crate::dispatcher::DispatchScope;
use crate::error::FluxResult;

/// Capability interface every store instance implements.
///
/// Most stores come from [`StoreBuilder`](super::StoreBuilder) or
/// [`ReducerStore`](super::ReducerStore); implement this directly when the
/// state is not serde friendly or needs custom dehydration.
pub trait Store: Send + Sync + 'static {
    /// Unique name within the application.
    fn name(&self) -> &str;

    /// Whether this store reacts to `event`.
    fn handles(&self, event: &str) -> bool;

    /// Handle one dispatched event.
    ///
    /// Called only by the dispatcher. `scope` gives access to `wait_for`.
    fn handle(&self, event: &str, payload: &Value, scope: &DispatchScope<'_>) -> FluxResult<()>;

    /// Serialise the store state for transfer to another context.
    fn dehydrate(&self) -> FluxResult<Value>;

    /// Replace the store state with a previously dehydrated value.
    fn rehydrate(&self, state: Value) -> FluxResult<()>;

    fn emitter(&self) -> &ChangeEmitter;

    /// Upcast used for typed access to a concrete store.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Notify change listeners.
    fn emit_change(&self) {
        self.emitter().emit();
    }
}
