//! Field-level dependency tracking.
//!
//! A [`CacheGroup`] records which computations read which `(entity, field)`
//! pairs and invalidates exactly those computations when the pair is
//! written. The reactive engine underneath is pluggable through
//! [`DependencyTracker`]; [`ReactiveTracker`] is the bundled one.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use normcache_foundation::{StoreObject, Value, field_name_from_store_name};
use tracing::trace;

use crate::keys::{CacheKey, KeyMaker};
use crate::path::{ObjectPath, PathIndex};

static NEXT_GROUP: AtomicU32 = AtomicU32::new(0);

/// Identifies one dependency group (one invalidation namespace).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    fn fresh() -> Self {
        Self(NEXT_GROUP.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// A dependency key: a store field name of an entity, within one group.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepKey {
    group: GroupId,
    entity_id: Arc<str>,
    store_field_name: Arc<str>,
}

impl DepKey {
    /// Creates a key for `store_field_name` of `entity_id` in `group`.
    #[must_use]
    pub fn new(group: GroupId, entity_id: &str, store_field_name: &str) -> Self {
        Self {
            group,
            entity_id: entity_id.into(),
            store_field_name: store_field_name.into(),
        }
    }

    /// Returns the owning group.
    #[must_use]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Returns the entity id.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Returns the store field name.
    #[must_use]
    pub fn store_field_name(&self) -> &str {
        &self.store_field_name
    }
}

impl fmt::Debug for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@g{}", self.store_field_name, self.entity_id, self.group.0)
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.store_field_name, self.entity_id)
    }
}

/// The reactive primitive a [`CacheGroup`] drives.
///
/// An implementation records a dependency on `key` for whatever computation
/// is currently running, and notifies every computation recorded against a
/// key when that key is dirtied. Scheduling recomputation is its business.
pub trait DependencyTracker {
    /// Records that the running computation (if any) read `key`.
    fn depend(&self, key: &DepKey);

    /// Invalidates every computation that read `key`.
    fn dirty(&self, key: &DepKey);
}

/// Handle to a computation run under a [`ReactiveTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Computation(u64);

#[derive(Debug, Default)]
struct ComputationState {
    dirty: bool,
    keys: HashSet<DepKey>,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,
    active: Vec<u64>,
    subscribers: HashMap<DepKey, HashSet<u64>>,
    computations: HashMap<u64, ComputationState>,
}

/// A minimal synchronous reactive engine.
///
/// [`ReactiveTracker::track`] runs a closure as a computation and records
/// every key read while it runs; dirtying any of those keys marks the
/// computation dirty. Nested `track` calls record against the innermost
/// computation only.
#[derive(Debug, Default)]
pub struct ReactiveTracker {
    state: RefCell<TrackerState>,
}

impl ReactiveTracker {
    /// Creates a tracker with no computations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` as a new computation.
    pub fn track<T>(&self, f: impl FnOnce() -> T) -> (Computation, T) {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            state.computations.insert(id, ComputationState::default());
            id
        };
        let out = self.run(id, f);
        (Computation(id), out)
    }

    /// Re-runs `f` under an existing computation, clearing its dirty flag
    /// and its previous dependencies first.
    pub fn retrack<T>(&self, computation: Computation, f: impl FnOnce() -> T) -> T {
        {
            let mut state = self.state.borrow_mut();
            let old = state
                .computations
                .insert(computation.0, ComputationState::default());
            if let Some(old) = old {
                for key in old.keys {
                    if let Some(subs) = state.subscribers.get_mut(&key) {
                        subs.remove(&computation.0);
                    }
                }
            }
        }
        self.run(computation.0, f)
    }

    fn run<T>(&self, id: u64, f: impl FnOnce() -> T) -> T {
        self.state.borrow_mut().active.push(id);
        let out = f();
        self.state.borrow_mut().active.pop();
        out
    }

    /// Returns true once any key the computation read has been dirtied.
    ///
    /// Disposed or unknown computations report dirty.
    #[must_use]
    pub fn is_dirty(&self, computation: Computation) -> bool {
        self.state
            .borrow()
            .computations
            .get(&computation.0)
            .is_none_or(|c| c.dirty)
    }

    /// Returns the keys the computation read, in a stable order.
    #[must_use]
    pub fn dependencies(&self, computation: Computation) -> Vec<DepKey> {
        let state = self.state.borrow();
        let keys: BTreeSet<DepKey> = state
            .computations
            .get(&computation.0)
            .map(|c| c.keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.into_iter().collect()
    }

    /// Forgets a computation and all of its subscriptions.
    pub fn dispose(&self, computation: Computation) {
        let mut state = self.state.borrow_mut();
        if let Some(old) = state.computations.remove(&computation.0) {
            for key in old.keys {
                if let Some(subs) = state.subscribers.get_mut(&key) {
                    subs.remove(&computation.0);
                }
            }
        }
    }
}

impl DependencyTracker for ReactiveTracker {
    fn depend(&self, key: &DepKey) {
        let mut state = self.state.borrow_mut();
        let Some(&id) = state.active.last() else {
            return;
        };
        state.subscribers.entry(key.clone()).or_default().insert(id);
        if let Some(computation) = state.computations.get_mut(&id) {
            computation.keys.insert(key.clone());
        }
    }

    fn dirty(&self, key: &DepKey) {
        let mut state = self.state.borrow_mut();
        let Some(ids) = state.subscribers.remove(key) else {
            return;
        };
        for id in ids {
            if let Some(computation) = state.computations.get_mut(&id) {
                computation.dirty = true;
            }
        }
    }
}

/// One invalidation namespace, optionally chained to a parent group.
///
/// Besides dependencies, a group owns the structural path index for the
/// embedded objects merged through it, and the interner behind
/// `make_cache_key`.
pub struct CacheGroup {
    id: GroupId,
    tracker: Option<Rc<dyn DependencyTracker>>,
    parent: Option<Rc<CacheGroup>>,
    paths: RefCell<PathIndex>,
    keys: RefCell<KeyMaker>,
}

impl CacheGroup {
    /// Creates a group. Without a tracker, `depend` and `dirty` are no-ops.
    #[must_use]
    pub fn new(tracker: Option<Rc<dyn DependencyTracker>>, parent: Option<Rc<CacheGroup>>) -> Self {
        Self {
            id: GroupId::fresh(),
            tracker,
            parent,
            paths: RefCell::new(PathIndex::new()),
            keys: RefCell::new(KeyMaker::new()),
        }
    }

    /// Returns this group's id.
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Returns true if dependency tracking is active.
    #[must_use]
    pub fn caching(&self) -> bool {
        self.tracker.is_some()
    }

    /// Returns the parent group, if chained.
    #[must_use]
    pub fn parent(&self) -> Option<&Rc<CacheGroup>> {
        self.parent.as_ref()
    }

    /// Records a read of `store_field_name` on `entity_id`.
    ///
    /// A field with arguments is also recorded under its bare name, so the
    /// reader can be invalidated by exact-argument and bare-field writes.
    /// The read is then recorded in the parent group.
    pub fn depend(&self, entity_id: &str, store_field_name: &str) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        tracker.depend(&DepKey::new(self.id, entity_id, store_field_name));
        let field_name = field_name_from_store_name(store_field_name);
        if field_name != store_field_name {
            tracker.depend(&DepKey::new(self.id, entity_id, field_name));
        }
        if let Some(parent) = &self.parent {
            parent.depend(entity_id, store_field_name);
        }
    }

    /// Invalidates exactly `store_field_name` of `entity_id`. No bare-name
    /// fan-out and no propagation.
    pub fn dirty(&self, entity_id: &str, store_field_name: &str) {
        if let Some(tracker) = &self.tracker {
            let key = DepKey::new(self.id, entity_id, store_field_name);
            trace!(group = self.id.0, key = %key, "dirty");
            tracker.dirty(&key);
        }
    }

    /// Drops the path index and cache-key interner.
    pub fn reset_caching(&self) {
        self.paths.borrow_mut().clear();
        self.keys.borrow_mut().clear();
    }

    /// Assigns structural paths to every embedded object of `record` that
    /// does not have one yet. Returns how many were assigned.
    pub fn assign_paths(&self, entity_id: &str, record: &StoreObject) -> usize {
        self.paths.borrow_mut().assign_record(entity_id, record)
    }

    /// Looks up the structural path of an embedded object, here or in any
    /// ancestor group.
    #[must_use]
    pub fn object_path(&self, object: &Value) -> Option<ObjectPath> {
        self.paths
            .borrow()
            .path_of(object)
            .or_else(|| self.parent.as_ref().and_then(|p| p.object_path(object)))
    }

    /// Interns an argument tuple into a stable key.
    #[must_use]
    pub fn make_cache_key(&self, parts: &[Value]) -> CacheKey {
        self.keys.borrow_mut().lookup(parts)
    }
}

impl fmt::Debug for CacheGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGroup")
            .field("id", &self.id)
            .field("caching", &self.caching())
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .finish_non_exhaustive()
    }
}
