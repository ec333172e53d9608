//! Event routing from actions to stores.
//!
//! [`Dispatcher`] is the application-wide registry of store definitions.
//! Each request or page session gets its own [`DispatcherContext`], which
//! owns the store instances and runs dispatches synchronously, honouring
//! `wait_for` dependencies between stores.

mod context;
mod dispatcher;
mod scope;

pub use context::{DispatcherContext, WeakDispatcherContext};
pub use dispatcher::Dispatcher;
pub use scope::{DispatchScope, HandlerStatus};
