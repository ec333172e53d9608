use futures::channel::oneshot;
use serde_json::Value;

/// Completion handle passed to callback-style actions.
///
/// Settling consumes the handle, so an action can settle at most once.
/// Dropping it without settling fails the action with
/// [`FluxError::CompletionDropped`](crate::FluxError::CompletionDropped).
#[must_use = "an action is only settled when its completion handle is used"]
pub struct Done {
    tx: oneshot::Sender<anyhow::Result<Value>>,
}

impl Done {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<anyhow::Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Complete successfully with `value`.
    pub fn resolve(self, value: Value) {
        self.settle(Ok(value));
    }

    /// Fail with `err`.
    pub fn reject(self, err: impl Into<anyhow::Error>) {
        self.settle(Err(err.into()));
    }

    /// Complete with an already built result.
    pub fn settle(self, result: anyhow::Result<Value>) {
        // The receiver is gone only when nobody awaits the action anymore.
        let _ = self.tx.send(result);
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("receiver_dropped", &self.tx.is_canceled())
            .finish()
    }
}
