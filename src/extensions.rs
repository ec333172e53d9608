//! Type map used by plugins to augment context facades.
//!
//! Plugins insert shared handles (a service client, the request query, a
//! devtools recorder) and application code reads them back by type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed container of shared plugin members.
///
/// Cloning is cheap: values are reference counted and shared between clones.
#[derive(Clone, Default)]
pub struct Extensions {
    members: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member. An existing member of the same type is replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, member: T) {
        self.members.insert(TypeId::of::<T>(), Arc::new(member));
    }

    /// Get a member by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.members
            .get(&TypeId::of::<T>())
            .and_then(|member| member.downcast_ref())
    }

    /// Get a shared handle to a member.
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.members
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|member| member.downcast().ok())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.members.contains_key(&TypeId::of::<T>())
    }

    /// Remove a member, returning its shared handle.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.members
            .remove(&TypeId::of::<T>())
            .and_then(|member| member.downcast().ok())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("member_count", &self.members.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut ext = Extensions::new();
        ext.insert(42i32);
        ext.insert("hello".to_string());

        assert_eq!(ext.get::<i32>(), Some(&42));
        assert_eq!(ext.get::<String>(), Some(&"hello".to_string()));
        assert_eq!(ext.get::<f64>(), None);
    }

    #[test]
    fn clones_share_members() {
        let mut ext = Extensions::new();
        ext.insert(vec![1, 2, 3]);
        let copy = ext.clone();

        let a = ext.get_arc::<Vec<i32>>().unwrap();
        let b = copy.get_arc::<Vec<i32>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn remove_returns_member() {
        let mut ext = Extensions::new();
        ext.insert(7u8);
        assert!(ext.contains::<u8>());
        assert_eq!(ext.remove::<u8>().as_deref(), Some(&7));
        assert!(ext.is_empty());
    }
}
