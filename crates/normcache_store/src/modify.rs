//! Field modifiers for [`StoreMut::modify`](crate::StoreMut::modify).

use std::collections::HashMap;
use std::fmt;

use normcache_foundation::{Reference, Result, Value};

use crate::keys::Storage;
use crate::store::{FieldSource, StoreRef, ToReference};

/// What a modifier decided for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Replace the field's value. Returning the same value changes nothing.
    Value(Value),
    /// Remove the field.
    Delete,
    /// Keep the value but invalidate readers of the field.
    Invalidate,
}

impl From<Value> for Modification {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Signature of a modifier function.
pub type ModifierFn<'m> = dyn Fn(&Value, &ModifierDetails<'_>) -> Modification + 'm;

/// A modifier for one field, or for all of them.
pub enum FieldModifier<'m> {
    /// Remove the field without calling anything.
    Delete,
    /// Compute the field's fate.
    Func(Box<ModifierFn<'m>>),
}

impl<'m> FieldModifier<'m> {
    /// Wraps a function.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value, &ModifierDetails<'_>) -> Modification + 'm,
    {
        Self::Func(Box::new(f))
    }
}

impl fmt::Debug for FieldModifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => f.write_str("Delete"),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Modifiers for an entity's fields.
#[derive(Debug)]
pub enum Modifiers<'m> {
    /// One modifier applied to every defined field.
    All(FieldModifier<'m>),
    /// Modifiers keyed by store field name or bare field name.
    Fields(HashMap<String, FieldModifier<'m>>),
}

impl<'m> Modifiers<'m> {
    /// Applies `f` to every field.
    pub fn all<F>(f: F) -> Self
    where
        F: Fn(&Value, &ModifierDetails<'_>) -> Modification + 'm,
    {
        Self::All(FieldModifier::func(f))
    }

    /// Deletes every field.
    #[must_use]
    pub fn delete_all() -> Self {
        Self::All(FieldModifier::Delete)
    }

    /// Starts an empty per-field map.
    #[must_use]
    pub fn fields() -> Self {
        Self::Fields(HashMap::new())
    }

    /// Adds a per-field modifier. A no-op on [`Modifiers::All`].
    #[must_use]
    pub fn field<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &ModifierDetails<'_>) -> Modification + 'm,
    {
        self.with(name.into(), FieldModifier::func(f))
    }

    /// Adds a per-field delete. A no-op on [`Modifiers::All`].
    #[must_use]
    pub fn delete_field(self, name: impl Into<String>) -> Self {
        self.with(name.into(), FieldModifier::Delete)
    }

    fn with(mut self, name: String, modifier: FieldModifier<'m>) -> Self {
        if let Self::Fields(map) = &mut self {
            map.insert(name, modifier);
        }
        self
    }

    /// Finds the modifier for a field: exact store field name first, then
    /// the bare name.
    pub(crate) fn for_field(
        &self,
        store_field_name: &str,
        field_name: &str,
    ) -> Option<&FieldModifier<'m>> {
        match self {
            Self::All(modifier) => Some(modifier),
            Self::Fields(map) => map.get(store_field_name).or_else(|| map.get(field_name)),
        }
    }
}

/// Context handed to a modifier.
pub struct ModifierDetails<'a> {
    pub(crate) store: StoreRef<'a>,
    pub(crate) entity_id: &'a str,
    pub(crate) field_name: &'a str,
    pub(crate) store_field_name: &'a str,
    pub(crate) storage: Storage,
}

impl ModifierDetails<'_> {
    /// Returns the id of the entity being modified.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        self.entity_id
    }

    /// Returns the bare field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.field_name
    }

    /// Returns the full store field name.
    #[must_use]
    pub fn store_field_name(&self) -> &str {
        self.store_field_name
    }

    /// Returns the field's storage slot.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns true if `value` is a reference.
    #[must_use]
    pub fn is_reference(&self, value: &Value) -> bool {
        value.is_reference()
    }

    /// Turns an id, reference or identifiable object into a reference.
    ///
    /// # Errors
    ///
    /// Propagates identity policy failures.
    pub fn to_reference<'s>(&self, input: impl Into<ToReference<'s>>) -> Result<Option<Reference>> {
        self.store.to_reference(input)
    }

    /// Returns true if fields can be read from `from`.
    #[must_use]
    pub fn can_read<'s>(&self, from: impl Into<FieldSource<'s>>) -> bool {
        self.store.can_read(from)
    }

    /// Reads a field of `from`, or of the entity being modified.
    #[must_use]
    pub fn read_field(&self, store_field_name: &str, from: Option<FieldSource<'_>>) -> Option<Value> {
        match from {
            Some(source) => self.store.get_field_value(source, store_field_name),
            None => self.store.get(self.entity_id, store_field_name),
        }
    }

    /// Returns a read handle on the level being modified.
    #[must_use]
    pub fn view(&self) -> StoreRef<'_> {
        self.store
    }
}

impl fmt::Debug for ModifierDetails<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierDetails")
            .field("entity_id", &self.entity_id)
            .field("store_field_name", &self.store_field_name)
            .finish_non_exhaustive()
    }
}
