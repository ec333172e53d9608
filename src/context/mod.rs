//! Application and per-request contexts.
//!
//! A [`Fluxible`] application holds store definitions and plugins. Each
//! request (server) or page session (client) gets a [`FluxContext`] that
//! owns one dispatcher context and hands out the three plugin-augmented
//! facades: [`ActionContext`], [`ComponentContext`] and [`StoreContext`].

mod action_context;
mod app;
mod component_context;
mod flux_context;
mod options;
mod store_context;

pub use action_context::{ActionContext, ActionRecord, DispatchHook};
pub use app::{ComponentErrorHandler, Fluxible, FluxibleBuilder};
pub use component_context::ComponentContext;
pub use flux_context::FluxContext;
pub use options::{ContextOptions, RequestInfo};
pub use store_context::StoreContext;
