use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::flux_context::ContextShared;
use crate::action::Action;
use crate::dispatcher::DispatcherContext;
use crate::error::FluxResult;
use crate::extensions::Extensions;
use crate::store::Store;

/// Bookkeeping entry for one action execution.
///
/// Nested actions get their own record linked to the parent; all records of
/// one top-level execution share its `root_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub display_name: String,
    /// Display names from the root action down to this one.
    pub stack: Vec<String>,
}

impl ActionRecord {
    pub(crate) fn child(parent: Option<&ActionRecord>, id: String, display_name: &str) -> Self {
        match parent {
            Some(parent) => {
                let mut stack = parent.stack.clone();
                stack.push(display_name.to_string());
                Self {
                    id,
                    root_id: parent.root_id.clone(),
                    parent_id: Some(parent.id.clone()),
                    display_name: display_name.to_string(),
                    stack,
                }
            }
            None => Self {
                root_id: id.clone(),
                id,
                parent_id: None,
                display_name: display_name.to_string(),
                stack: vec![display_name.to_string()],
            },
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Observer called before an action context dispatches an event.
pub type DispatchHook = Arc<dyn Fn(&ActionRecord, &str, &Value) + Send + Sync>;

/// Facade handed to actions.
///
/// Every execution gets its own action context (and record); all of them
/// share the single dispatcher context of their [`FluxContext`](super::FluxContext).
#[derive(Clone)]
pub struct ActionContext {
    shared: Arc<ContextShared>,
    record: ActionRecord,
    extensions: Extensions,
    dispatch_hooks: Vec<DispatchHook>,
}

impl ActionContext {
    pub(crate) fn new(shared: Arc<ContextShared>, record: ActionRecord) -> Self {
        Self {
            shared,
            record,
            extensions: Extensions::new(),
            dispatch_hooks: Vec::new(),
        }
    }

    /// Dispatch an event to the stores of this context.
    pub fn dispatch(&self, event: &str, payload: Value) -> FluxResult<()> {
        for hook in &self.dispatch_hooks {
            hook(&self.record, event, &payload);
        }
        tracing::debug!(action = %self.record.display_name, event, "action dispatch");
        self.shared.dispatcher.dispatch(event, payload)
    }

    /// Execute a nested action as a child of this one.
    ///
    /// Nothing runs until the returned future is first polled, so await it
    /// or hand it to an executor.
    pub fn execute_action(
        &self,
        action: &Action,
        payload: Value,
    ) -> impl Future<Output = FluxResult<Value>> + Send + 'static {
        Arc::clone(&self.shared).execute(Some(self.record.clone()), action.clone(), payload)
    }

    pub fn get_store(&self, name: &str) -> FluxResult<Arc<dyn Store>> {
        self.shared.dispatcher.get_store(name)
    }

    /// Look up a store by concrete type.
    pub fn get_typed<T: Store>(&self, name: &str) -> FluxResult<Arc<T>> {
        self.shared.dispatcher.get_typed(name)
    }

    pub fn dispatcher_context(&self) -> &DispatcherContext {
        &self.shared.dispatcher
    }

    pub fn record(&self) -> &ActionRecord {
        &self.record
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn root_id(&self) -> &str {
        &self.record.root_id
    }

    pub fn display_name(&self) -> &str {
        &self.record.display_name
    }

    pub fn stack(&self) -> &[String] {
        &self.record.stack
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

    /// Register an observer for this context's dispatches.
    pub fn on_dispatch(&mut self, hook: DispatchHook) {
        self.dispatch_hooks.push(hook);
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("record", &self.record)
            .field("extensions", &self.extensions)
            .field("dispatch_hooks", &self.dispatch_hooks.len())
            .finish()
    }
}
