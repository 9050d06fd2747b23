//! Reads: field values, records, references, storage and cache keys.

use std::collections::BTreeMap;

use normcache_foundation::{Error, Reference, Result, StoreObject, TYPENAME, Value};

use super::{EntityStore, ROOT, StoreRef};
use crate::dependency::GroupId;
use crate::keys::{CacheKey, Storage, StorageParent};
use crate::path::{ObjectPath, PathSegment};

/// Something [`StoreRef::get_field_value`] can read a field from.
#[derive(Clone, Copy, Debug)]
pub enum FieldSource<'a> {
    /// A reference; the field is read through the store.
    Ref(&'a Reference),
    /// A field value; references are read through the store, embedded
    /// objects directly.
    Value(&'a Value),
    /// A record; the field is read directly.
    Record(&'a StoreObject),
}

impl<'a> From<&'a Reference> for FieldSource<'a> {
    fn from(reference: &'a Reference) -> Self {
        Self::Ref(reference)
    }
}

impl<'a> From<&'a Value> for FieldSource<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

impl<'a> From<&'a StoreObject> for FieldSource<'a> {
    fn from(record: &'a StoreObject) -> Self {
        Self::Record(record)
    }
}

/// Something that can be turned into a [`Reference`].
#[derive(Clone, Copy, Debug)]
pub enum ToReference<'a> {
    /// An entity id.
    Id(&'a str),
    /// An existing reference.
    Ref(&'a Reference),
    /// An object identified through the policies.
    Record(&'a StoreObject),
}

impl<'a> From<&'a str> for ToReference<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Reference> for ToReference<'a> {
    fn from(reference: &'a Reference) -> Self {
        Self::Ref(reference)
    }
}

impl<'a> From<&'a StoreObject> for ToReference<'a> {
    fn from(record: &'a StoreObject) -> Self {
        Self::Record(record)
    }
}

impl EntityStore {
    /// Depends on `(id, field)` in every distinct group from `level` down.
    fn depend_down(&self, level: usize, id: &str, field: &str) {
        let mut last: Option<GroupId> = None;
        for l in (ROOT..=level).rev() {
            let group = self.group_at(l);
            if last != Some(group.id()) {
                group.depend(id, field);
                last = Some(group.id());
            }
        }
    }

    pub(super) fn get_at(&self, level: usize, id: &str, field: &str) -> Option<Value> {
        self.depend_down(level, id, field);
        for l in (ROOT..=level).rev() {
            match self.chain[l].data.get(id) {
                Some(Some(record)) => {
                    if let Some(slot) = record.slot(field) {
                        return slot.cloned();
                    }
                }
                Some(None) => break,
                None => {}
            }
        }
        self.default_typename(id, field)
    }

    fn default_typename(&self, id: &str, field: &str) -> Option<Value> {
        if field != TYPENAME {
            return None;
        }
        self.policies.root_typename(id).map(Value::from)
    }

    pub(super) fn lookup_at(&self, level: usize, id: &str, depend: bool) -> Option<StoreObject> {
        if depend {
            self.depend_down(level, id, normcache_foundation::EXISTS);
        }
        for l in (ROOT..=level).rev() {
            if let Some(slot) = self.chain[l].data.get(id) {
                return slot.clone();
            }
        }
        self.policies
            .root_typename(id)
            .map(|_| StoreObject::new())
    }

    pub(super) fn to_object_at(&self, level: usize) -> BTreeMap<String, StoreObject> {
        let mut out = BTreeMap::new();
        for layer in &self.chain[ROOT..=level] {
            for (id, slot) in &layer.data {
                match slot {
                    Some(record) => {
                        out.insert(id.clone(), record.without_absent());
                    }
                    None => {
                        out.remove(id);
                    }
                }
            }
        }
        out
    }

    pub(super) fn identify_input(&self, input: ToReference<'_>) -> Result<Option<Reference>> {
        Ok(match input {
            ToReference::Id(id) => Some(Reference::new(id)),
            ToReference::Ref(reference) => Some(reference.clone()),
            ToReference::Record(record) => self.policies.identify(record)?.map(Reference::new),
        })
    }

    pub(crate) fn storage_at_path(&self, path: &ObjectPath) -> Storage {
        self.storage.borrow_mut().lookup(path)
    }

    pub(crate) fn existing_storage(&self, path: &ObjectPath) -> Option<Storage> {
        self.storage.borrow().peek(path)
    }

    fn storage_at(
        &self,
        level: usize,
        parent: StorageParent<'_>,
        suffix: &[PathSegment],
    ) -> Result<Storage> {
        let base = match parent {
            StorageParent::Id(id) => ObjectPath::entity(id),
            StorageParent::Ref(reference) => ObjectPath::entity(reference.id()),
            StorageParent::Object(object) => {
                self.group_at(level).object_path(object).ok_or_else(|| {
                    Error::unknown_object(format!(
                        "{} was never merged into this store",
                        object.kind_name()
                    ))
                })?
            }
        };
        Ok(self.storage_at_path(&base.join(suffix)))
    }
}

impl<'a> StoreRef<'a> {
    /// Reads a store field, registering a dependency on it.
    ///
    /// Walks down the chain to the first partition with a record for `id`
    /// that has the field. A field a layer's record does not mention is read
    /// from below; an absent marker for the field hides the value below.
    /// A layer's deletion shadow hides the whole entity, so its fields are
    /// not read from below either. A missing `__typename` of a well-known
    /// root id reads as its implied typename.
    #[must_use]
    pub fn get(&self, id: &str, store_field_name: &str) -> Option<Value> {
        self.store.get_at(self.level, id, store_field_name)
    }

    /// Returns true if the entity exists, registering an existence dependency.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.store.lookup_at(self.level, id, true).is_some()
    }

    /// Returns the record visible for `id`.
    ///
    /// Well-known root ids without a record yield an empty record.
    #[must_use]
    pub fn lookup(&self, id: &str, depend_on_existence: bool) -> Option<StoreObject> {
        self.store.lookup_at(self.level, id, depend_on_existence)
    }

    /// Reads a field from a reference (through the store) or directly from
    /// an object.
    #[must_use]
    pub fn get_field_value<'s>(
        &self,
        from: impl Into<FieldSource<'s>>,
        store_field_name: &str,
    ) -> Option<Value> {
        match from.into() {
            FieldSource::Ref(reference) | FieldSource::Value(Value::Ref(reference)) => {
                self.get(reference.id(), store_field_name)
            }
            FieldSource::Value(value) => value.field(store_field_name).cloned(),
            FieldSource::Record(record) => record.get(store_field_name).cloned(),
        }
    }

    /// Returns true if fields can be read from `from`: a reference to an
    /// existing entity, or any embedded object, list or record.
    #[must_use]
    pub fn can_read<'s>(&self, from: impl Into<FieldSource<'s>>) -> bool {
        match from.into() {
            FieldSource::Ref(reference) | FieldSource::Value(Value::Ref(reference)) => {
                self.has(reference.id())
            }
            FieldSource::Value(value) => value.is_composite(),
            FieldSource::Record(_) => true,
        }
    }

    /// Turns an id, reference or identifiable object into a reference.
    ///
    /// # Errors
    ///
    /// Propagates identity policy failures.
    pub fn to_reference<'s>(&self, input: impl Into<ToReference<'s>>) -> Result<Option<Reference>> {
        self.store.identify_input(input.into())
    }

    /// Returns every visible entity, with deletion shadows applied.
    #[must_use]
    pub fn to_object(&self) -> BTreeMap<String, StoreObject> {
        self.store.to_object_at(self.level)
    }

    /// Returns the storage slot for `parent` plus `suffix`.
    ///
    /// Slots are shared by every level of the store.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownObject`](normcache_foundation::ErrorKind::UnknownObject)
    /// if `parent` is an embedded object that never went through a merge.
    pub fn get_storage<'s>(
        &self,
        parent: impl Into<StorageParent<'s>>,
        suffix: &[PathSegment],
    ) -> Result<Storage> {
        self.store.storage_at(self.level, parent.into(), suffix)
    }

    /// Interns an argument tuple in this level's group.
    #[must_use]
    pub fn make_cache_key(&self, parts: &[Value]) -> CacheKey {
        self.group().make_cache_key(parts)
    }
}
