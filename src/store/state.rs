use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe cell holding a store's state.
///
/// Mutating the cell does not notify anyone; the owning store decides when a
/// change is worth announcing and calls `emit_change` itself.
pub struct StoreState<T> {
    state: Arc<RwLock<T>>,
}

impl<T> StoreState<T> {
    /// Create a new cell with the given initial state.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = self.state.read();
        f(&state)
    }

    /// Update the state in place, returning whatever the closure returns.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut state = self.state.write();
        f(&mut state)
    }

    /// Set a new state value.
    pub fn set(&self, new_state: T) {
        *self.state.write() = new_state;
    }

    /// Swap in a new state value and return the previous one.
    pub fn replace(&self, new_state: T) -> T {
        std::mem::replace(&mut *self.state.write(), new_state)
    }
}

impl<T: Clone> StoreState<T> {
    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        self.state.read().clone()
    }
}

impl<T> Clone for StoreState<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StoreState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreState").field(&*self.state.read()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: usize,
        name: String,
    }

    #[test]
    fn state_get_set() {
        let state = StoreState::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        assert_eq!(state.get().count, 0);

        state.set(AppState {
            count: 42,
            name: "updated".to_string(),
        });

        assert_eq!(state.get().count, 42);
        assert_eq!(state.get().name, "updated");
    }

    #[test]
    fn state_update_returns_value() {
        let state = StoreState::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        let after = state.update(|s| {
            s.count += 10;
            s.count
        });

        assert_eq!(after, 10);
        assert_eq!(state.read(|s| s.count), 10);
    }

    #[test]
    fn clones_share_state() {
        let state = StoreState::new(1);
        let other = state.clone();
        other.set(5);
        assert_eq!(state.get(), 5);
        assert_eq!(state.replace(6), 5);
        assert_eq!(other.get(), 6);
    }
}
