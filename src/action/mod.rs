//! Actions: application functions that orchestrate dispatches.
//!
//! An action receives an [`ActionContext`](crate::context::ActionContext)
//! and a payload. It may finish synchronously, hand a [`Done`] completion
//! handle to asynchronous work, or return a future.

mod action;
mod done;

pub use action::{Action, ActionCall, ActionFuture};
pub use done::Done;

pub(crate) use action::into_flux_error;
