//! Structural paths of embedded objects.
//!
//! Every embedded (non-normalized) object that passes through a merge is
//! remembered together with where it sits: `[entityId, storeFieldName,
//! ...keys or indices]`. The index is keyed by allocation identity and holds
//! only weak handles, so an object it knows about can still be dropped.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use normcache_foundation::{StoreObject, Value, WeakValue};
use tracing::trace;

/// One step of an [`ObjectPath`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum PathSegment {
    /// An entity id, store field name, or embedded object key.
    Key(Arc<str>),
    /// A list index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.into())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key.into())
    }
}

impl From<Arc<str>> for PathSegment {
    fn from(key: Arc<str>) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A path rooted at an entity id. Cloning is O(1).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(Rc<[PathSegment]>);

impl ObjectPath {
    /// The path of an entity itself.
    #[must_use]
    pub fn entity(id: &str) -> Self {
        Self(Rc::from(vec![PathSegment::Key(id.into())]))
    }

    /// Builds a path from raw segments.
    ///
    /// # Panics
    ///
    /// Panics if the first segment is not a key; every path starts at an
    /// entity id.
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        assert!(
            matches!(segments.first(), Some(PathSegment::Key(_))),
            "object path must start with an entity id"
        );
        Self(Rc::from(segments))
    }

    /// Returns this path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.to_vec();
        segments.push(segment.into());
        Self(Rc::from(segments))
    }

    /// Returns this path extended by `suffix`.
    #[must_use]
    pub fn join(&self, suffix: &[PathSegment]) -> Self {
        if suffix.is_empty() {
            return self.clone();
        }
        let mut segments = self.0.to_vec();
        segments.extend_from_slice(suffix);
        Self(Rc::from(segments))
    }

    /// Returns the entity id the path starts at.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self.0.first() {
            Some(PathSegment::Key(id)) => id,
            _ => "",
        }
    }

    /// Returns the raw segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a path holds at least its entity id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i > 0 => write!(f, ".{k}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({self})")
    }
}

// Purge dead entries once this many assignments have happened since the
// last purge.
const PURGE_INTERVAL: usize = 256;

/// Identity-keyed map from embedded objects to their first-seen path.
#[derive(Default)]
pub struct PathIndex {
    entries: HashMap<usize, (WeakValue, ObjectPath)>,
    since_purge: usize,
}

impl PathIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.since_purge = 0;
    }

    /// Walks a record's fields and assigns paths to embedded objects and
    /// lists seen for the first time. Returns how many were assigned.
    ///
    /// An object that already has a path keeps it, and its children are not
    /// revisited.
    pub fn assign_record(&mut self, entity_id: &str, record: &StoreObject) -> usize {
        if self.since_purge >= PURGE_INTERVAL {
            self.purge();
        }
        let base = ObjectPath::entity(entity_id);
        let mut assigned = 0;
        for (store_field_name, value) in record.fields() {
            assigned += self.assign(value, base.child(Arc::clone(store_field_name)));
        }
        self.since_purge += assigned;
        assigned
    }

    fn assign(&mut self, value: &Value, path: ObjectPath) -> usize {
        let (Some(identity), Some(weak)) = (value.identity(), value.downgrade()) else {
            return 0;
        };
        if self.entries.get(&identity).is_some_and(|(w, _)| w.is_alive()) {
            return 0;
        }
        trace!(path = %path, "assigned object path");
        self.entries.insert(identity, (weak, path.clone()));
        let mut assigned = 1;
        match value {
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    assigned += self.assign(item, path.child(i));
                }
            }
            Value::Object(fields) => {
                for (key, child) in fields.iter() {
                    assigned += self.assign(child, path.child(Arc::clone(key)));
                }
            }
            _ => {}
        }
        assigned
    }

    /// Returns the path of a live embedded object.
    #[must_use]
    pub fn path_of(&self, value: &Value) -> Option<ObjectPath> {
        let identity = value.identity()?;
        self.entries
            .get(&identity)
            .filter(|(weak, _)| weak.is_alive())
            .map(|(_, path)| path.clone())
    }

    fn purge(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.is_alive());
        self.since_purge = 0;
    }
}

impl fmt::Debug for PathIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathIndex")
            .field("entries", &self.entries.len())
            .finish()
    }
}
