//! Persistent collections with structural sharing.
//!
//! A thin wrapper around the `im` crate's ordered map, keyed by field name.
//! Ordered keys keep record iteration (and therefore snapshots and canonical
//! JSON) deterministic.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::sync::Arc;

/// Persistent field-name-keyed map with structural sharing.
///
/// Cloning is O(1). Modifications through [`FieldMap::insert`] and
/// [`FieldMap::remove`] return a new map sharing structure with the original;
/// [`FieldMap::set`] and [`FieldMap::unset`] update in place.
#[derive(Clone)]
pub struct FieldMap<V: Clone>(im::OrdMap<Arc<str>, V>);

impl<V: Clone> Default for FieldMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> FieldMap<V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(im::OrdMap::new())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets a value by field name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(key)
    }

    /// Returns true if the map contains the field name.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a new map with the entry inserted.
    #[must_use]
    pub fn insert(&self, key: impl Into<Arc<str>>, value: V) -> Self {
        let mut new = self.0.clone();
        new.insert(key.into(), value);
        Self(new)
    }

    /// Returns a new map with the field removed.
    #[must_use]
    pub fn remove(&self, key: &str) -> Self {
        let mut new = self.0.clone();
        new.remove(key);
        Self(new)
    }

    /// Inserts an entry in place, returning the previous value.
    pub fn set(&mut self, key: impl Into<Arc<str>>, value: V) -> Option<V> {
        self.0.insert(key.into(), value)
    }

    /// Removes a field in place, returning its value.
    pub fn unset(&mut self, key: &str) -> Option<V> {
        self.0.remove(key)
    }

    /// Returns an iterator over entries in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &V)> {
        self.0.iter()
    }

    /// Returns an iterator over field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<str>> {
        self.0.keys()
    }

    /// Returns an iterator over values in field-name order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    /// Returns true if both maps share the same root node.
    ///
    /// A `true` result implies equality; `false` says nothing.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl<V: Clone + fmt::Debug> fmt::Debug for FieldMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: Clone + PartialEq> PartialEq for FieldMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl<V: Clone + Eq> Eq for FieldMap<V> {}

impl<V: Clone + Hash> Hash for FieldMap<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (k, v) in self.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K: Into<Arc<str>>, V: Clone> FromIterator<(K, V)> for FieldMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
