//! The layered entity store.
//!
//! An [`EntityStore`] owns a chain of partitions: the Root, an empty Stump
//! above it, and any number of optimistic layers above that, oldest first.
//! Reads at a level walk down the chain until a partition has an entry for
//! the entity; writes land in the partition at that level (the Stump
//! forwards its writes to the Root).
//!
//! Handles select a level: [`StoreRef`] for reads, [`StoreMut`] for writes.
//!
//! ```
//! use normcache_store::{DefaultPolicies, EntityStore, StoreConfig};
//! use normcache_foundation::{StoreObject, Value};
//!
//! let mut store = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
//! store
//!     .root_mut()
//!     .merge("Item:1", StoreObject::new().with("name", "n"))
//!     .unwrap();
//! store
//!     .add_layer("opt", |layer| layer.merge("Item:1", StoreObject::new().with("name", "m")))
//!     .unwrap();
//!
//! assert_eq!(store.root().get("Item:1", "name"), Some(Value::from("n")));
//! assert_eq!(store.optimistic().get("Item:1", "name"), Some(Value::from("m")));
//! ```

mod gc;
mod layers;
mod read;
mod write;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use normcache_foundation::{Result, StoreObject};

use crate::config::StoreConfig;
use crate::dependency::{CacheGroup, DependencyTracker, ReactiveTracker};
use crate::keys::StorageTrie;
use crate::policies::Policies;

pub use read::{FieldSource, ToReference};
pub use write::{EvictOptions, MergeInput};

/// Procedure that rebuilds an optimistic layer's writes.
pub type Replay = Rc<dyn Fn(&mut StoreMut<'_>) -> Result<()>>;

/// What a partition in the chain is.
#[derive(Clone)]
pub enum LayerKind {
    /// The authoritative partition.
    Root,
    /// The empty partition every optimistic layer sits on.
    Stump,
    /// An optimistic layer.
    Layer {
        /// Caller-chosen id; several layers may share one.
        id: String,
        /// Procedure that re-applies the layer's writes.
        replay: Replay,
    },
}

impl fmt::Debug for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("Root"),
            Self::Stump => f.write_str("Stump"),
            Self::Layer { id, .. } => write!(f, "Layer({id})"),
        }
    }
}

/// One partition of the chain.
pub(crate) struct StoreLayer {
    kind: LayerKind,
    /// Entity id to record; `None` is a deletion shadow (layers only).
    data: BTreeMap<String, Option<StoreObject>>,
    /// Memoized child reference ids, per entity.
    refs: RefCell<HashMap<String, Rc<BTreeSet<String>>>>,
    /// Retain counts.
    root_ids: BTreeMap<String, usize>,
}

impl StoreLayer {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            data: BTreeMap::new(),
            refs: RefCell::new(HashMap::new()),
            root_ids: BTreeMap::new(),
        }
    }

    fn layer_id(&self) -> Option<&str> {
        match &self.kind {
            LayerKind::Layer { id, .. } => Some(id),
            LayerKind::Root | LayerKind::Stump => None,
        }
    }

    fn forget_refs(&self, id: &str) {
        self.refs.borrow_mut().remove(id);
    }
}

impl fmt::Debug for StoreLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreLayer")
            .field("kind", &self.kind)
            .field("entities", &self.data.len())
            .field("root_ids", &self.root_ids)
            .finish_non_exhaustive()
    }
}

pub(crate) const ROOT: usize = 0;
pub(crate) const STUMP: usize = 1;

/// A normalized entity cache with optimistic layers.
pub struct EntityStore {
    policies: Rc<dyn Policies>,
    chain: Vec<StoreLayer>,
    root_group: Rc<CacheGroup>,
    optimistic_group: Rc<CacheGroup>,
    storage: RefCell<StorageTrie>,
    tracker: Option<Rc<dyn DependencyTracker>>,
}

impl EntityStore {
    /// Creates a store with its own [`ReactiveTracker`] when caching is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured seed cannot be merged.
    pub fn new<P>(policies: P, config: StoreConfig) -> Result<Self>
    where
        P: Policies + 'static,
    {
        let tracker: Rc<dyn DependencyTracker> = Rc::new(ReactiveTracker::new());
        Self::with_tracker(Rc::new(policies), config, tracker)
    }

    /// Creates a store driving an external tracker.
    ///
    /// The tracker is ignored when `config.result_caching` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured seed cannot be merged.
    pub fn with_tracker(
        policies: Rc<dyn Policies>,
        config: StoreConfig,
        tracker: Rc<dyn DependencyTracker>,
    ) -> Result<Self> {
        let tracker = config.result_caching.then_some(tracker);
        let root_group = Rc::new(CacheGroup::new(tracker.clone(), None));
        let optimistic_group = Rc::new(CacheGroup::new(
            tracker.clone(),
            Some(Rc::clone(&root_group)),
        ));
        let mut store = Self {
            policies,
            chain: vec![
                StoreLayer::new(LayerKind::Root),
                StoreLayer::new(LayerKind::Stump),
            ],
            root_group,
            optimistic_group,
            storage: RefCell::new(StorageTrie::new()),
            tracker,
        };
        if let Some(seed) = &config.seed {
            store.root_mut().replace(Some(seed))?;
        }
        Ok(store)
    }

    /// Returns the policies the store consults.
    #[must_use]
    pub fn policies(&self) -> &dyn Policies {
        self.policies.as_ref()
    }

    /// Returns the tracker driving both groups, if caching is on.
    #[must_use]
    pub fn tracker(&self) -> Option<&Rc<dyn DependencyTracker>> {
        self.tracker.as_ref()
    }

    /// Returns the Root's dependency group.
    #[must_use]
    pub fn root_group(&self) -> &Rc<CacheGroup> {
        &self.root_group
    }

    /// Returns the group shared by the Stump and every layer.
    #[must_use]
    pub fn optimistic_group(&self) -> &Rc<CacheGroup> {
        &self.optimistic_group
    }

    /// Drops path indices and cache-key interners in both groups.
    pub fn reset_result_cache(&self) {
        self.root_group.reset_caching();
        self.optimistic_group.reset_caching();
    }

    /// Read handle on the Root.
    #[must_use]
    pub fn root(&self) -> StoreRef<'_> {
        StoreRef {
            store: self,
            level: ROOT,
        }
    }

    /// Write handle on the Root.
    pub fn root_mut(&mut self) -> StoreMut<'_> {
        StoreMut {
            store: self,
            level: ROOT,
        }
    }

    /// Read handle on the Stump.
    #[must_use]
    pub fn stump(&self) -> StoreRef<'_> {
        StoreRef {
            store: self,
            level: STUMP,
        }
    }

    /// Read handle on the topmost partition: the newest layer, or the Stump.
    #[must_use]
    pub fn optimistic(&self) -> StoreRef<'_> {
        StoreRef {
            store: self,
            level: self.top(),
        }
    }

    /// Write handle on the topmost partition.
    pub fn optimistic_mut(&mut self) -> StoreMut<'_> {
        let level = self.top();
        StoreMut { store: self, level }
    }

    /// Read handle on the newest layer with `id`.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<StoreRef<'_>> {
        self.find_layer(id).map(|level| StoreRef { store: self, level })
    }

    /// Write handle on the newest layer with `id`.
    pub fn layer_mut(&mut self, id: &str) -> Option<StoreMut<'_>> {
        self.find_layer(id).map(|level| StoreMut { store: self, level })
    }

    /// Returns the number of optimistic layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.chain.len() - 2
    }

    /// Returns layer ids, oldest first.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<&str> {
        self.chain.iter().filter_map(StoreLayer::layer_id).collect()
    }

    fn top(&self) -> usize {
        self.chain.len() - 1
    }

    fn find_layer(&self, id: &str) -> Option<usize> {
        self.chain.iter().rposition(|l| l.layer_id() == Some(id))
    }

    pub(crate) fn group_at(&self, level: usize) -> &Rc<CacheGroup> {
        if level == ROOT {
            &self.root_group
        } else {
            &self.optimistic_group
        }
    }
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("chain", &self.chain)
            .field("caching", &self.tracker.is_some())
            .finish_non_exhaustive()
    }
}

// Writes at the Stump land in the Root.
const fn write_level(level: usize) -> usize {
    if level == STUMP { ROOT } else { level }
}

/// Read handle on one level of the chain.
#[derive(Clone, Copy)]
pub struct StoreRef<'a> {
    store: &'a EntityStore,
    level: usize,
}

impl<'a> StoreRef<'a> {
    /// Returns the store this handle reads.
    #[must_use]
    pub fn store(&self) -> &'a EntityStore {
        self.store
    }

    /// Returns the layer id, or `None` for the Root and the Stump.
    #[must_use]
    pub fn layer_id(&self) -> Option<&'a str> {
        self.store.chain[self.level].layer_id()
    }

    /// Returns what kind of partition this handle sits on.
    #[must_use]
    pub fn kind(&self) -> &'a LayerKind {
        &self.store.chain[self.level].kind
    }

    /// Returns the dependency group reads at this level register in.
    #[must_use]
    pub fn group(&self) -> &'a Rc<CacheGroup> {
        self.store.group_at(self.level)
    }
}

impl fmt::Debug for StoreRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreRef({:?})", self.kind())
    }
}

/// Write handle on one level of the chain.
pub struct StoreMut<'a> {
    store: &'a mut EntityStore,
    level: usize,
}

impl StoreMut<'_> {
    /// Returns a read handle on the same level.
    #[must_use]
    pub fn view(&self) -> StoreRef<'_> {
        StoreRef {
            store: &*self.store,
            level: self.level,
        }
    }

    /// Returns the layer id, or `None` for the Root and the Stump.
    #[must_use]
    pub fn layer_id(&self) -> Option<&str> {
        self.store.chain[self.level].layer_id()
    }
}

impl fmt::Debug for StoreMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreMut({:?})", self.store.chain[self.level].kind)
    }
}
