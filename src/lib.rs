//! # Fluxkit
//!
//! A Flux-pattern application framework for isomorphic Rust applications.
//!
//! Fluxkit routes events from actions to stores through a per-request
//! dispatcher and carries store state from the server to the client.
//!
//! ## Core
//!
//! - `Dispatcher` / `DispatcherContext` - Store registry and synchronous
//!   dispatch with `wait_for` ordering between stores
//! - `Action` - Sync, callback or future actions run through an `ActionContext`
//! - `Fluxible` / `FluxContext` - Application and per-request context
//! - `DehydratedState` - Server-to-client state transfer
//!
//! ## Extensions
//!
//! - `Plugin` - Augment contexts, wrap action executions, carry extra state
//! - `StoreConnection` - Keep component state in sync with stores
//! - `StoreBuilder` / `ReducerStore` - Declarative store definitions
//!
//! ```
//! use fluxkit::{Action, ContextOptions, Fluxible, StoreBuilder};
//! use serde::{Deserialize, Serialize};
//! use serde_json::{json, Value};
//!
//! #[derive(Clone, Default, Serialize, Deserialize)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! let counter = StoreBuilder::new("Counter", Counter::default)
//!     .on("INCREMENT", |store, _, _| {
//!         store.state().update(|s| s.count += 1);
//!         store.emit_change();
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let app = Fluxible::builder().store(counter).build().unwrap();
//! let context = app.create_context(ContextOptions::default());
//!
//! let increment = Action::sync("increment", |cx, _| {
//!     cx.dispatch("INCREMENT", json!({}))?;
//!     Ok(Value::Null)
//! });
//! futures::executor::block_on(context.execute_action(&increment, Value::Null)).unwrap();
//!
//! let state = context.dehydrate().unwrap();
//! assert_eq!(state.store("Counter"), Some(&json!({ "count": 1 })));
//! ```

pub mod action;
pub mod bindings;
pub mod clock;
pub mod config;
pub mod context;
pub mod dehydrate;
pub mod dispatcher;
pub mod error;
pub mod extensions;
pub mod plugin;
pub mod store;

// Re-export main types for convenience
pub use action::{Action, ActionCall, Done};
pub use bindings::StoreConnection;
pub use clock::{Clock, IdSource};
pub use config::AppConfig;
pub use context::{
    ActionContext, ActionRecord, ComponentContext, ContextOptions, FluxContext, Fluxible, RequestInfo, StoreContext,
};
pub use dehydrate::DehydratedState;
pub use dispatcher::{DispatchScope, Dispatcher, DispatcherContext};
pub use error::{FluxError, FluxResult};
pub use extensions::Extensions;
pub use plugin::{ContextPlugin, Plugin};
pub use store::{Store, StoreBuilder, StoreDefinition};
