//! Plugins extend every context an application creates.
//!
//! An application-level [`Plugin`] produces one [`ContextPlugin`] per
//! context. Context plugins augment the action, component and store facades,
//! may wrap action executions, and take part in dehydration.

mod devtools;
mod plugin;
mod query;
mod service;

pub use devtools::{ActionNode, ActionTrace, DevTools, DevToolsPlugin, DispatchTrace};
pub use plugin::{ContextPlugin, Plugin};
pub use query::{QueryParams, QueryPlugin};
pub use service::{Operation, Service, ServiceCall, ServiceClient, ServicePlugin};
