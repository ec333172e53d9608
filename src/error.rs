//! Error types shared by the dispatcher, action contexts and plugins.

use thiserror::Error;

/// Errors raised by the framework.
///
/// None of these are logged or retried internally; each one is handed to
/// the nearest caller as a `Result` or a settled action future.
#[derive(Debug, Error)]
pub enum FluxError {
    /// A store waited (directly or transitively) on itself during one dispatch.
    #[error("circular wait detected while dispatching {event}: {}", chain.join(" -> "))]
    CircularWait { event: String, chain: Vec<String> },

    /// `wait_for` was called while no dispatch was running.
    #[error("wait_for called for {stores:?} but no event is being dispatched")]
    NotDispatching { stores: Vec<String> },

    /// A dispatch was started while another one was still on the stack.
    #[error("cannot dispatch {attempted} while {current} is still being dispatched")]
    DispatchInProgress { attempted: String, current: String },

    /// The event name was empty.
    #[error("event name must not be empty")]
    InvalidEventName,

    /// The event is not part of the configured event catalogue.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// No store definition is registered under this name.
    #[error("store {0} is not registered")]
    UnknownStore(String),

    /// A different store definition already claimed this name.
    #[error("a different store is already registered as {0}")]
    DuplicateStore(String),

    /// A store definition declared two handlers for the same event.
    #[error("store {store} declares more than one handler for {event}")]
    DuplicateHandler { store: String, event: String },

    /// The store exists but is not of the requested state type.
    #[error("store {0} does not hold the requested state type")]
    StoreTypeMismatch(String),

    /// No service is registered under this name.
    #[error("service {0} is not registered")]
    UnknownService(String),

    /// The service does not implement the requested operation.
    #[error("service {service} does not support {operation}")]
    OperationNotSupported { service: String, operation: String },

    /// Dehydrated state could not be applied.
    #[error("cannot rehydrate {target}: {reason}")]
    Rehydrate { target: String, reason: String },

    /// A callback-style action dropped its completion handle without settling.
    #[error("action {0} finished without calling its completion handle")]
    CompletionDropped(String),

    /// An action panicked while running.
    #[error("action {action} panicked: {message}")]
    ActionPanicked { action: String, message: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Error produced by application code inside an action or service.
    #[error(transparent)]
    Action(#[from] anyhow::Error),
}

impl FluxError {
    pub(crate) fn rehydrate(target: impl Into<String>, reason: impl ToString) -> Self {
        FluxError::Rehydrate {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for framework operations.
pub type FluxResult<T> = std::result::Result<T, FluxError>;
