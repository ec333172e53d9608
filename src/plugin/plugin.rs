use serde_json::Value;

use crate::action::ActionCall;
use crate::context::{ActionContext, ComponentContext, ContextOptions, StoreContext};
use crate::error::FluxResult;

/// Application-level plugin.
pub trait Plugin: Send + Sync {
    /// Unique name; also the plugin's key in dehydrated state.
    fn name(&self) -> &str;

    /// Create this plugin's per-context instance.
    fn plug_context(&self, options: &ContextOptions) -> Box<dyn ContextPlugin>;
}

/// Per-context plugin instance.
///
/// Every extension point is optional. Context plugins are applied in the
/// order their plugins were registered.
pub trait ContextPlugin: Send + Sync {
    /// Augment each new action context.
    fn plug_action_context(&self, _context: &mut ActionContext) {}

    /// Augment the context's component context (once per context).
    fn plug_component_context(&self, _context: &mut ComponentContext) {}

    /// Augment the context handed to stores (once per context).
    fn plug_store_context(&self, _context: &mut StoreContext) {}

    /// Wrap or replace an action execution before it runs.
    ///
    /// The result is handed to the next plugin's `plug_execute_action`.
    fn plug_execute_action(&self, call: ActionCall) -> ActionCall {
        call
    }

    /// State to carry to the client, if any.
    fn dehydrate(&self) -> FluxResult<Option<Value>> {
        Ok(None)
    }

    /// Restore state produced by [`dehydrate`](Self::dehydrate).
    fn rehydrate(&self, _state: Value) -> FluxResult<()> {
        Ok(())
    }
}
