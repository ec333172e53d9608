use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::done::Done;
use crate::context::ActionContext;
use crate::error::{FluxError, FluxResult};

/// Future returned by future-style actions.
pub type ActionFuture = BoxFuture<'static, anyhow::Result<Value>>;

type SyncFn = Arc<dyn Fn(&ActionContext, Value) -> anyhow::Result<Value> + Send + Sync>;
type CallbackFn = Arc<dyn Fn(&ActionContext, Value, Done) + Send + Sync>;
type FutureFn = Arc<dyn Fn(ActionContext, Value) -> ActionFuture + Send + Sync>;

#[derive(Clone)]
enum ActionKind {
    Sync(SyncFn),
    Callback(CallbackFn),
    Future(FutureFn),
}

/// A named action.
///
/// Cloning is cheap and keeps the same underlying function.
#[derive(Clone)]
pub struct Action {
    name: Arc<str>,
    kind: ActionKind,
}

impl Action {
    /// Action that completes when it returns.
    ///
    /// Return `Value::Null` when there is nothing meaningful to resolve with.
    pub fn sync<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            kind: ActionKind::Sync(Arc::new(f)),
        }
    }

    /// Action that completes through its [`Done`] handle.
    pub fn callback<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ActionContext, Value, Done) + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            kind: ActionKind::Callback(Arc::new(f)),
        }
    }

    /// Action that completes when its future resolves.
    pub fn future<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            kind: ActionKind::Future(Arc::new(move |cx, payload| f(cx, payload).boxed())),
        }
    }

    /// Display name used in action records and traces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action, settling exactly once.
    ///
    /// Errors the action returns, errors passed to its completion handle and
    /// panics all end up in the returned result.
    pub fn invoke(&self, cx: ActionContext, payload: Value) -> BoxFuture<'static, FluxResult<Value>> {
        let name = Arc::clone(&self.name);
        let kind = self.kind.clone();

        async move {
            match kind {
                ActionKind::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(&cx, payload))) {
                    Ok(result) => result.map_err(into_flux_error),
                    Err(panic) => Err(panicked(&name, panic)),
                },
                ActionKind::Callback(f) => {
                    let (done, rx) = Done::channel();
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(&cx, payload, done))) {
                        return Err(panicked(&name, panic));
                    }
                    match rx.await {
                        Ok(result) => result.map_err(into_flux_error),
                        Err(_) => Err(FluxError::CompletionDropped(name.to_string())),
                    }
                }
                ActionKind::Future(f) => {
                    let future = match catch_unwind(AssertUnwindSafe(|| f(cx, payload))) {
                        Ok(future) => future,
                        Err(panic) => return Err(panicked(&name, panic)),
                    };
                    match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(result) => result.map_err(into_flux_error),
                        Err(panic) => Err(panicked(&name, panic)),
                    }
                }
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ActionKind::Sync(_) => "sync",
            ActionKind::Callback(_) => "callback",
            ActionKind::Future(_) => "future",
        };
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// One pending action execution, as seen by `plug_execute_action`.
///
/// Plugins may wrap or replace any part before the action runs.
#[derive(Debug)]
pub struct ActionCall {
    pub action: Action,
    pub context: ActionContext,
    pub payload: Value,
}

/// Recover a framework error that travelled through application code as
/// `anyhow::Error`; anything else is an action failure.
pub(crate) fn into_flux_error(err: anyhow::Error) -> FluxError {
    match err.downcast::<FluxError>() {
        Ok(err) => err,
        Err(err) => FluxError::Action(err),
    }
}

fn panicked(action: &str, panic: Box<dyn Any + Send>) -> FluxError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    FluxError::ActionPanicked {
        action: action.to_string(),
        message,
    }
}
