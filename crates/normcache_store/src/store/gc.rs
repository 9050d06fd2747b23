//! Retention, reachability and garbage collection.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::rc::Rc;

use normcache_foundation::{EXISTS, Result, Value};
use tracing::debug;

use super::{EntityStore, ROOT, StoreMut, StoreRef, write_level};
use crate::snapshot::Snapshot;

fn collect_refs(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Ref(reference) => {
            out.insert(reference.id().to_string());
        }
        Value::List(items) => items.iter().for_each(|item| collect_refs(item, out)),
        Value::Object(fields) => fields.values().for_each(|child| collect_refs(child, out)),
        _ => {}
    }
}

impl EntityStore {
    pub(super) fn retain_at(&mut self, level: usize, id: &str) -> usize {
        let layer = &mut self.chain[write_level(level)];
        let count = layer.root_ids.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn release_at(&mut self, level: usize, id: &str) -> usize {
        let layer = &mut self.chain[write_level(level)];
        let Some(count) = layer.root_ids.get_mut(id) else {
            return 0;
        };
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            layer.root_ids.remove(id);
        }
        remaining
    }

    fn root_id_set_at(&self, level: usize) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = self.policies.root_ids().into_iter().collect();
        for layer in &self.chain[ROOT..=level] {
            ids.extend(layer.root_ids.keys().cloned());
        }
        ids
    }

    fn own_child_refs(&self, level: usize, id: &str) -> Rc<BTreeSet<String>> {
        let layer = &self.chain[level];
        if let Some(cached) = layer.refs.borrow().get(id) {
            return Rc::clone(cached);
        }
        let mut found = BTreeSet::new();
        if let Some(Some(record)) = layer.data.get(id) {
            for (_, value) in record.fields() {
                collect_refs(value, &mut found);
            }
        }
        let found = Rc::new(found);
        layer.refs.borrow_mut().insert(id.to_string(), Rc::clone(&found));
        found
    }

    fn child_refs_at(&self, level: usize, id: &str) -> Rc<BTreeSet<String>> {
        if level == ROOT {
            return self.own_child_refs(ROOT, id);
        }
        let inherited = self.child_refs_at(level - 1, id);
        if !self.chain[level].data.contains_key(id) {
            return inherited;
        }
        let own = self.own_child_refs(level, id);
        if inherited.is_empty() {
            return own;
        }
        Rc::new(own.union(&inherited).cloned().collect())
    }

    fn gc_at(&mut self, level: usize) -> Result<Vec<String>> {
        let mut unreached: BTreeSet<String> = self.chain[ROOT].data.keys().cloned().collect();
        let roots = self.root_id_set_at(level);
        let mut seen: HashSet<String> = roots.iter().cloned().collect();
        let mut queue: VecDeque<String> = roots.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            if !unreached.remove(&id) {
                continue;
            }
            for child in self.own_child_refs(ROOT, &id).iter() {
                if seen.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }

        let removed: Vec<String> = unreached.into_iter().collect();
        for id in &removed {
            self.delete_at(ROOT, id, None, None)?;
            if self.chain[ROOT].data.remove(id).is_some() {
                self.chain[ROOT].forget_refs(id);
                self.root_group.dirty(id, EXISTS);
            }
        }
        debug!(removed = removed.len(), "garbage collected");
        Ok(removed)
    }
}

impl StoreRef<'_> {
    /// Returns the ids referenced anywhere in the entity's visible record.
    ///
    /// Memoized per partition until the entity is next written there.
    #[must_use]
    pub fn find_child_ref_ids(&self, id: &str) -> Rc<BTreeSet<String>> {
        self.store.child_refs_at(self.level, id)
    }

    /// Returns the well-known roots plus every retained id from this level
    /// down.
    #[must_use]
    pub fn root_id_set(&self) -> BTreeSet<String> {
        self.store.root_id_set_at(self.level)
    }

    /// Snapshots every visible entity plus the extra retained ids.
    #[must_use]
    pub fn extract(&self) -> Snapshot {
        let well_known: BTreeSet<String> = self.store.policies.root_ids().into_iter().collect();
        Snapshot {
            entities: self.to_object(),
            extra_root_ids: self
                .root_id_set()
                .into_iter()
                .filter(|id| !well_known.contains(id))
                .collect(),
        }
    }
}

impl StoreMut<'_> {
    /// Pins an entity against collection. Returns the new count.
    pub fn retain(&mut self, id: &str) -> usize {
        self.store.retain_at(self.level, id)
    }

    /// Drops one pin. Returns the remaining count (zero for unknown ids).
    pub fn release(&mut self, id: &str) -> usize {
        self.store.release_at(self.level, id)
    }

    /// Deletes every Root entity unreachable from this level's root ids.
    /// Returns the removed ids, sorted.
    ///
    /// # Errors
    ///
    /// Propagates drop-hook failures.
    pub fn gc(&mut self) -> Result<Vec<String>> {
        self.store.gc_at(self.level)
    }

    /// See [`StoreRef::find_child_ref_ids`].
    #[must_use]
    pub fn find_child_ref_ids(&self, id: &str) -> Rc<BTreeSet<String>> {
        self.view().find_child_ref_ids(id)
    }

    /// See [`StoreRef::extract`].
    #[must_use]
    pub fn extract(&self) -> Snapshot {
        self.view().extract()
    }
}
