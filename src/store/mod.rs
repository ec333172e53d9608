//! Stores: named holders of domain state.
//!
//! A store's state changes only inside handlers invoked by the dispatcher.
//! Stores announce changes through their [`ChangeEmitter`], serialise
//! themselves for server-to-client transfer, and are created lazily the
//! first time a context asks for them.

mod builder;
mod definition;
mod emitter;
mod reducer;
mod state;
mod store;

pub use builder::{BuiltStore, StoreBuilder};
pub use definition::StoreDefinition;
pub use emitter::{ChangeEmitter, ListenerId};
pub use reducer::ReducerStore;
pub use state::StoreState;
pub use store::Store;
