//! Optimistic layer lifecycle.

use std::rc::Rc;

use normcache_foundation::{EXISTS, Error, Result, StoreObject, field_name_from_store_name};
use tracing::{debug, warn};

use super::{EntityStore, LayerKind, Replay, StoreLayer, StoreMut};
use crate::dependency::CacheGroup;

impl EntityStore {
    /// Pushes a new optimistic layer and runs `replay` against it.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayFailed`](normcache_foundation::ErrorKind::ReplayFailed)
    /// if `replay` fails; the half-built layer is discarded.
    pub fn add_layer<F>(&mut self, id: impl Into<String>, replay: F) -> Result<()>
    where
        F: Fn(&mut StoreMut<'_>) -> Result<()> + 'static,
    {
        self.push_layer(id.into(), Rc::new(replay))
    }

    fn push_layer(&mut self, id: String, replay: Replay) -> Result<()> {
        self.chain.push(StoreLayer::new(LayerKind::Layer {
            id: id.clone(),
            replay: Rc::clone(&replay),
        }));
        let level = self.top();
        if let Err(err) = replay(&mut StoreMut { store: self, level }) {
            warn!(layer = %id, error = %err, "layer replay failed");
            if let Some(layer) = self.chain.pop() {
                self.dirty_discarded(&layer);
            }
            return Err(Error::replay_failed(id, &err));
        }
        debug!(layer = %id, depth = self.depth(), "added optimistic layer");
        Ok(())
    }

    /// Removes every layer with `id` and rebuilds the layers above the
    /// oldest of them by replaying them, oldest first.
    ///
    /// Returns false if no layer has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayFailed`](normcache_foundation::ErrorKind::ReplayFailed)
    /// if a surviving layer cannot be rebuilt. Layers above it are dropped.
    pub fn remove_layer(&mut self, id: &str) -> Result<bool> {
        let Some(first) = self
            .chain
            .iter()
            .position(|layer| layer.layer_id() == Some(id))
        else {
            return Ok(false);
        };
        let detached = self.chain.split_off(first);
        let mut removed = 0usize;
        let mut rebuilt = 0usize;
        let mut failure = None;
        for layer in detached {
            let LayerKind::Layer { id: layer_id, replay } = &layer.kind else {
                continue;
            };
            if layer_id == id {
                removed += 1;
                self.dirty_discarded(&layer);
            } else if failure.is_none() {
                match self.push_layer(layer_id.clone(), Rc::clone(replay)) {
                    Ok(()) => rebuilt += 1,
                    Err(err) => {
                        self.dirty_discarded(&layer);
                        failure = Some(err);
                    }
                }
            } else {
                self.dirty_discarded(&layer);
            }
        }
        debug!(layer = id, removed, rebuilt, depth = self.depth(), "removed optimistic layer");
        match failure {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }

    /// Discards every optimistic layer.
    pub fn prune(&mut self) {
        let count = self.depth();
        while self.chain.len() > 2 {
            if let Some(layer) = self.chain.pop() {
                self.dirty_discarded(&layer);
            }
        }
        if count > 0 {
            debug!(count, "pruned optimistic layers");
        }
    }

    /// Dirties, in the optimistic group, every field a discarded layer made
    /// visible that the chain now below it does not show the same way.
    fn dirty_discarded(&self, layer: &StoreLayer) {
        let group = Rc::clone(&self.optimistic_group);
        let top = self.top();
        for (id, own) in &layer.data {
            let below = self.lookup_at(top, id, false);
            match (own, below) {
                (Some(own), None) => {
                    group.dirty(id, EXISTS);
                    self.dirty_all(&group, id, own);
                }
                (None, Some(below)) => {
                    group.dirty(id, EXISTS);
                    self.dirty_all(&group, id, &below);
                }
                (Some(own), Some(below)) => {
                    if own.ptr_eq(&below) {
                        continue;
                    }
                    for (field, slot) in own.slots() {
                        let visible_below = below.get(field);
                        let same = match (slot, visible_below) {
                            (Some(a), Some(b)) => a.same(b) || a == b,
                            (None, None) => true,
                            _ => false,
                        };
                        if !same {
                            group.dirty(id, field);
                        }
                    }
                }
                (None, None) => {}
            }
        }
    }

    fn dirty_all(&self, group: &CacheGroup, id: &str, record: &StoreObject) {
        let typename = record.typename();
        for field in record.store_field_names() {
            group.dirty(id, field);
            let bare = field_name_from_store_name(field);
            if bare.len() != field.len() && !self.policies.has_key_args(typename, bare) {
                group.dirty(id, bare);
            }
        }
    }
}
