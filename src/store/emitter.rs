use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`ChangeEmitter::subscribe`], used to unsubscribe.
pub type ListenerId = u64;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Ordered set of change listeners attached to one store.
#[derive(Default)]
pub struct ChangeEmitter {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners run in subscription order.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Notify every listener.
    ///
    /// Listeners are snapshotted first, so a listener may subscribe or
    /// unsubscribe (itself included) without deadlocking.
    pub fn emit(&self) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        tracing::trace!(listeners = snapshot.len(), "emitting change");
        for listener in snapshot {
            listener();
        }
    }
}

impl std::fmt::Debug for ChangeEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_subscribers() {
        let emitter = ChangeEmitter::new();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        emitter.subscribe(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 0);
        emitter.emit();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        emitter.emit();
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let emitter = ChangeEmitter::new();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let id = emitter.subscribe(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));

        emitter.emit();
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let emitter = Arc::new(ChangeEmitter::new());
        let inner = emitter.clone();
        emitter.subscribe(move || {
            inner.subscribe(|| {});
        });

        emitter.emit();
        assert_eq!(emitter.listener_count(), 2);
    }
}
