//! Writes: merge, modify, delete, evict, replace.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use normcache_foundation::{
    EXISTS, Error, FieldMap, Reference, Result, StoreObject, TYPENAME, Value,
    field_name_from_store_name,
};
use tracing::{debug, trace};

use super::{EntityStore, ROOT, StoreMut, StoreRef, write_level};
use crate::keys::Storage;
use crate::modify::{FieldModifier, Modification, ModifierDetails, Modifiers};
use crate::path::ObjectPath;
use crate::policies::DroppedField;
use crate::reconcile::{dropped_fields, reconcile};
use crate::snapshot::Snapshot;
use crate::store::{FieldSource, ToReference};

/// One side of a merge.
#[derive(Clone, Debug)]
pub enum MergeInput {
    /// The record currently stored under this id.
    Id(String),
    /// The record currently stored under the referenced id.
    Ref(Reference),
    /// A literal record.
    Record(StoreObject),
}

impl From<&str> for MergeInput {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for MergeInput {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<&String> for MergeInput {
    fn from(id: &String) -> Self {
        Self::Id(id.clone())
    }
}

impl From<Reference> for MergeInput {
    fn from(reference: Reference) -> Self {
        Self::Ref(reference)
    }
}

impl From<&Reference> for MergeInput {
    fn from(reference: &Reference) -> Self {
        Self::Ref(reference.clone())
    }
}

impl From<StoreObject> for MergeInput {
    fn from(record: StoreObject) -> Self {
        Self::Record(record)
    }
}

impl From<&StoreObject> for MergeInput {
    fn from(record: &StoreObject) -> Self {
        Self::Record(record.clone())
    }
}

/// What to evict: an entity, or one of its fields.
#[derive(Clone, Debug)]
pub struct EvictOptions {
    /// Entity id.
    pub id: String,
    /// Field to evict; `None` evicts the whole entity.
    pub field_name: Option<String>,
    /// Arguments that select one stored value of the field.
    pub args: Option<FieldMap<Value>>,
}

impl EvictOptions {
    /// Evicts a whole entity.
    #[must_use]
    pub fn entity(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_name: None,
            args: None,
        }
    }

    /// Narrows eviction to one field.
    #[must_use]
    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Narrows eviction to one argument set of the field.
    #[must_use]
    pub fn args(mut self, args: FieldMap<Value>) -> Self {
        self.args = Some(args);
        self
    }
}

impl EntityStore {
    fn resolve_input(
        &self,
        level: usize,
        input: MergeInput,
        data_id: &mut Option<String>,
    ) -> Option<StoreObject> {
        match input {
            MergeInput::Id(id) => {
                let record = self.lookup_at(level, &id, false);
                *data_id = Some(id);
                record
            }
            MergeInput::Ref(reference) => {
                let record = self.lookup_at(level, reference.id(), false);
                *data_id = Some(reference.id().to_string());
                record
            }
            MergeInput::Record(record) => Some(record),
        }
    }

    pub(super) fn merge_at(
        &mut self,
        level: usize,
        older: MergeInput,
        newer: MergeInput,
    ) -> Result<()> {
        let level = write_level(level);
        let mut data_id = None;
        let existing = self.resolve_input(level, older, &mut data_id);
        let incoming = self.resolve_input(level, newer, &mut data_id);
        let Some(incoming) = incoming else {
            return Ok(());
        };
        let Some(data_id) = data_id else {
            return Err(Error::invalid_merge_target(
                "neither side of the merge names an entity id",
            ));
        };
        self.write_record(level, &data_id, existing, &incoming)
    }

    /// Reconciles `incoming` over `existing` and stores the result at
    /// `level`, dirtying whatever changed.
    pub(super) fn write_record(
        &mut self,
        level: usize,
        id: &str,
        existing: Option<StoreObject>,
        incoming: &StoreObject,
    ) -> Result<()> {
        let (mut merged, changed) = reconcile(existing.as_ref(), incoming);
        if !changed {
            self.chain[level].data.insert(id.to_string(), Some(merged));
            return Ok(());
        }
        let is_root = level == ROOT;
        let group = Rc::clone(self.group_at(level));
        let typename = merged.typename().map(str::to_string);
        let mut dirty: BTreeSet<Arc<str>> = BTreeSet::new();

        if existing.is_none() {
            dirty.insert(EXISTS.into());
        }
        for (field, _) in incoming.slots() {
            let prior = existing.as_ref().and_then(|e| e.get(field));
            let now = merged.get(field);
            let same = match (prior, now) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => existing.is_some(),
                _ => false,
            };
            if now.is_none() && is_root {
                merged.unset(field);
            }
            if same {
                continue;
            }
            if group.caching() {
                dirty.insert(Arc::clone(field));
                let bare = field_name_from_store_name(field);
                if bare.len() != field.len()
                    && !self.policies.has_key_args(typename.as_deref(), bare)
                {
                    dirty.insert(bare.into());
                }
            }
        }
        if dirty.contains(TYPENAME)
            && existing.as_ref().is_none_or(|e| e.typename().is_none())
            && self.policies.root_typename(id) == typename.as_deref()
        {
            dirty.remove(TYPENAME);
        }

        self.chain[level].data.insert(id.to_string(), Some(merged.clone()));
        self.chain[level].forget_refs(id);
        if group.caching() {
            for field in &dirty {
                group.dirty(id, field);
            }
        }
        group.assign_paths(id, &merged);
        trace!(entity = id, fields = dirty.len(), "merged record");

        if let Some(existing) = &existing {
            self.report_dropped(id, existing, &merged)?;
        }
        Ok(())
    }

    fn report_dropped(&self, id: &str, existing: &StoreObject, merged: &StoreObject) -> Result<()> {
        for dropped in dropped_fields(id, existing, merged) {
            let storage = self
                .existing_storage(&dropped.path())
                .unwrap_or_else(Storage::new);
            let parent = match &dropped.parent {
                Some(object) => FieldSource::Value(object),
                None => FieldSource::Record(existing),
            };
            let field = DroppedField {
                typename: dropped.typename.as_deref(),
                parent,
                parent_path: &dropped.parent_path,
                field_name: &dropped.field_name,
                value: &dropped.value,
                storage: &storage,
            };
            self.policies.drop_field(&field).map_err(|e| {
                let context = e
                    .context
                    .unwrap_or_default()
                    .with_entity(id)
                    .with_field(dropped.field_name.to_string())
                    .with_frame("drop_field");
                Error::new(e.kind).with_context(context)
            })?;
        }
        Ok(())
    }

    pub(super) fn modify_at(
        &mut self,
        level: usize,
        id: &str,
        modifiers: &Modifiers<'_>,
    ) -> Result<bool> {
        let level = write_level(level);
        let Some(record) = self.lookup_at(level, id, false) else {
            return Ok(false);
        };
        let mut changes = StoreObject::new();
        let mut need_merge = false;
        let mut all_deleted = true;
        let mut invalidated: Vec<Arc<str>> = Vec::new();
        {
            let view = StoreRef { store: &*self, level };
            let entity = ObjectPath::entity(id);
            for (store_field_name, value) in record.fields() {
                let field_name = field_name_from_store_name(store_field_name);
                let Some(modifier) = modifiers.for_field(store_field_name, field_name) else {
                    all_deleted = false;
                    continue;
                };
                let outcome = match modifier {
                    FieldModifier::Delete => Modification::Delete,
                    FieldModifier::Func(f) => {
                        let details = ModifierDetails {
                            store: view,
                            entity_id: id,
                            field_name,
                            store_field_name,
                            storage: self
                                .storage_at_path(&entity.child(Arc::clone(store_field_name))),
                        };
                        f(value, &details)
                    }
                };
                match outcome {
                    Modification::Invalidate => {
                        invalidated.push(Arc::clone(store_field_name));
                        all_deleted = false;
                    }
                    Modification::Delete => {
                        changes.set(Arc::clone(store_field_name), None);
                        need_merge = true;
                    }
                    Modification::Value(next) => {
                        all_deleted = false;
                        if !next.same(value) {
                            changes.set(Arc::clone(store_field_name), Some(next));
                            need_merge = true;
                        }
                    }
                }
            }
        }

        let group = Rc::clone(self.group_at(level));
        for field in &invalidated {
            group.dirty(id, field);
        }
        if !need_merge {
            return Ok(false);
        }
        self.write_record(level, id, Some(record), &changes)?;
        if all_deleted {
            if level == ROOT {
                self.chain[level].data.remove(id);
            } else {
                self.chain[level].data.insert(id.to_string(), None);
            }
            self.chain[level].forget_refs(id);
            group.dirty(id, EXISTS);
        }
        Ok(true)
    }

    pub(super) fn delete_at(
        &mut self,
        level: usize,
        id: &str,
        field_name: Option<&str>,
        args: Option<&FieldMap<Value>>,
    ) -> Result<bool> {
        let Some(record) = self.lookup_at(write_level(level), id, false) else {
            return Ok(false);
        };
        let modifiers = match field_name {
            Some(field_name) => {
                let store_field_name = match args {
                    Some(args) => self
                        .policies
                        .store_field_name(record.typename(), field_name, Some(args)),
                    None => field_name.to_string(),
                };
                Modifiers::fields().delete_field(store_field_name)
            }
            None => Modifiers::delete_all(),
        };
        self.modify_at(level, id, &modifiers)
    }

    pub(super) fn evict_at(&mut self, level: usize, options: &EvictOptions) -> Result<bool> {
        let mut evicted = false;
        if self.chain[level].data.contains_key(&options.id) {
            evicted = self.delete_at(
                level,
                &options.id,
                options.field_name.as_deref(),
                options.args.as_ref(),
            )?;
        }
        if level > ROOT {
            evicted = self.evict_at(level - 1, options)? || evicted;
        }
        if options.field_name.is_some() || evicted {
            let field = options.field_name.as_deref().unwrap_or(EXISTS);
            self.group_at(level).dirty(&options.id, field);
        }
        Ok(evicted)
    }

    pub(super) fn replace_at(&mut self, level: usize, snapshot: Option<&Snapshot>) -> Result<()> {
        let level = write_level(level);
        let current: Vec<String> = self.chain[level].data.keys().cloned().collect();
        let mut deleted = 0usize;
        for id in current {
            let kept = snapshot.is_some_and(|s| s.entities.contains_key(&id));
            if !kept && self.delete_at(level, &id, None, None)? {
                deleted += 1;
            }
        }
        if let Some(snapshot) = snapshot {
            for (id, record) in &snapshot.entities {
                self.merge_at(
                    level,
                    MergeInput::Id(id.clone()),
                    MergeInput::Record(record.clone()),
                )?;
            }
            for id in &snapshot.extra_root_ids {
                self.retain_at(level, id);
            }
        }
        debug!(
            deleted,
            merged = snapshot.map_or(0, Snapshot::len),
            "replaced store contents"
        );
        Ok(())
    }
}

impl StoreMut<'_> {
    /// Merges `newer` over `older` and stores the result under whichever
    /// side names an id.
    ///
    /// An id that currently has no record resolves to nothing; if `newer`
    /// resolves to nothing the call has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMergeTarget`](normcache_foundation::ErrorKind::InvalidMergeTarget)
    /// if both sides are literal records, and propagates drop-hook failures
    /// (the merged record is already stored when a hook fails).
    pub fn merge(
        &mut self,
        older: impl Into<MergeInput>,
        newer: impl Into<MergeInput>,
    ) -> Result<()> {
        self.store.merge_at(self.level, older.into(), newer.into())
    }

    /// Applies `modifiers` to the defined fields of `id`. Returns true if
    /// anything was written.
    ///
    /// If every field ends up deleted, the entity itself is removed (or
    /// shadowed, in a layer).
    ///
    /// # Errors
    ///
    /// Propagates drop-hook failures.
    pub fn modify(&mut self, id: &str, modifiers: &Modifiers<'_>) -> Result<bool> {
        self.store.modify_at(self.level, id, modifiers)
    }

    /// Deletes an entity, one field, or one argument set of a field.
    ///
    /// # Errors
    ///
    /// Propagates drop-hook failures.
    pub fn delete(
        &mut self,
        id: &str,
        field_name: Option<&str>,
        args: Option<&FieldMap<Value>>,
    ) -> Result<bool> {
        self.store.delete_at(self.level, id, field_name, args)
    }

    /// Deletes from this level and every level below it.
    ///
    /// # Errors
    ///
    /// Propagates drop-hook failures.
    pub fn evict(&mut self, options: &EvictOptions) -> Result<bool> {
        self.store.evict_at(self.level, options)
    }

    /// Replaces this level's contents with `snapshot` (or empties it).
    ///
    /// # Errors
    ///
    /// Propagates merge and drop-hook failures.
    pub fn replace(&mut self, snapshot: Option<&Snapshot>) -> Result<()> {
        self.store.replace_at(self.level, snapshot)
    }

    /// Deletes every entity at this level.
    ///
    /// # Errors
    ///
    /// Propagates drop-hook failures.
    pub fn clear(&mut self) -> Result<()> {
        self.replace(None)
    }

    /// Turns an input into a reference, merging an identified object into
    /// the store when `merge_into_store` is set.
    ///
    /// # Errors
    ///
    /// Propagates identity policy and merge failures.
    pub fn to_reference<'s>(
        &mut self,
        input: impl Into<ToReference<'s>>,
        merge_into_store: bool,
    ) -> Result<Option<Reference>> {
        let input = input.into();
        let reference = self.store.identify_input(input)?;
        if let (true, Some(reference), ToReference::Record(record)) =
            (merge_into_store, &reference, input)
        {
            self.store.merge_at(
                self.level,
                MergeInput::Id(reference.id().to_string()),
                MergeInput::Record(record.clone()),
            )?;
        }
        Ok(reference)
    }

    /// Reads a store field. See [`StoreRef::get`].
    #[must_use]
    pub fn get(&self, id: &str, store_field_name: &str) -> Option<Value> {
        self.view().get(id, store_field_name)
    }

    /// Returns true if the entity exists. See [`StoreRef::has`].
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.view().has(id)
    }

    /// Returns the visible record. See [`StoreRef::lookup`].
    #[must_use]
    pub fn lookup(&self, id: &str, depend_on_existence: bool) -> Option<StoreObject> {
        self.view().lookup(id, depend_on_existence)
    }
}
