//! Interned cache keys and per-path storage slots.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use normcache_foundation::{FieldMap, Reference, Value, WeakValue};

use crate::path::ObjectPath;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum KeyPart {
    Scalar(Value),
    Identity(usize),
}

struct CacheKeyInner {
    parts: Vec<KeyPart>,
    anchors: Vec<WeakValue>,
}

impl CacheKeyInner {
    fn is_alive(&self) -> bool {
        self.anchors.iter().all(WeakValue::is_alive)
    }
}

/// An interned argument tuple.
///
/// Two keys made from element-wise identical tuples are the same key:
/// scalars and references compare by value, lists and objects by identity.
/// Keys compare by pointer.
#[derive(Clone)]
pub struct CacheKey(Rc<CacheKeyInner>);

impl CacheKey {
    /// Returns the tuple arity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.parts.len()
    }

    /// Returns true for the empty tuple.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.parts.is_empty()
    }

    /// Returns true if both handles are the same interned key.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for CacheKey {}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({:p}, arity {})", Rc::as_ptr(&self.0), self.len())
    }
}

/// Interner behind [`CacheKey`].
///
/// Composite parts are held weakly: once one of them is dropped the key can
/// no longer be produced and its entry is purged.
#[derive(Default)]
pub struct KeyMaker {
    keys: HashMap<Vec<KeyPart>, CacheKey>,
    since_purge: usize,
}

const PURGE_INTERVAL: usize = 256;

impl KeyMaker {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interned key for `parts`, creating it on first use.
    pub fn lookup(&mut self, parts: &[Value]) -> CacheKey {
        let key_parts: Vec<KeyPart> = parts
            .iter()
            .map(|p| match p.identity() {
                Some(identity) => KeyPart::Identity(identity),
                None => KeyPart::Scalar(p.clone()),
            })
            .collect();
        if let Some(existing) = self.keys.get(&key_parts) {
            if existing.0.is_alive() {
                return existing.clone();
            }
        }
        self.since_purge += 1;
        if self.since_purge >= PURGE_INTERVAL {
            self.keys.retain(|_, key| key.0.is_alive());
            self.since_purge = 0;
        }
        let key = CacheKey(Rc::new(CacheKeyInner {
            parts: key_parts.clone(),
            anchors: parts.iter().filter_map(Value::downgrade).collect(),
        }));
        self.keys.insert(key_parts, key.clone());
        key
    }

    /// Returns the number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing is interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.since_purge = 0;
    }
}

/// A mutable per-field scratch area shared by every reader of the same path.
///
/// Handles are cheap clones of one slot.
#[derive(Clone, Default)]
pub struct Storage(Rc<RefCell<FieldMap<Value>>>);

impl Storage {
    /// Creates a detached, empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Writes an entry, returning the previous value.
    pub fn set(&self, key: impl Into<Arc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().set(key, value.into())
    }

    /// Removes an entry.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().unset(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if the slot holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn entries(&self) -> FieldMap<Value> {
        self.0.borrow().clone()
    }

    /// Returns true if both handles point at the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Storage").field(&*self.0.borrow()).finish()
    }
}

/// Storage slots keyed by full path.
#[derive(Debug, Default)]
pub struct StorageTrie {
    slots: HashMap<ObjectPath, Storage>,
}

impl StorageTrie {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot at `path`, creating it on first use.
    pub fn lookup(&mut self, path: &ObjectPath) -> Storage {
        self.slots.entry(path.clone()).or_default().clone()
    }

    /// Returns the slot at `path` if one was ever created.
    #[must_use]
    pub fn peek(&self, path: &ObjectPath) -> Option<Storage> {
        self.slots.get(path).cloned()
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no slot exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Where a storage path starts.
#[derive(Clone, Copy, Debug)]
pub enum StorageParent<'a> {
    /// An entity id.
    Id(&'a str),
    /// A reference to an entity.
    Ref(&'a Reference),
    /// An embedded object previously merged into the store.
    Object(&'a Value),
}

impl<'a> From<&'a str> for StorageParent<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Reference> for StorageParent<'a> {
    fn from(reference: &'a Reference) -> Self {
        Self::Ref(reference)
    }
}

impl<'a> From<&'a Value> for StorageParent<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Ref(reference) => Self::Ref(reference),
            other => Self::Object(other),
        }
    }
}
