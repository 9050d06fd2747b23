//! Entity records.

use std::fmt;
use std::sync::Arc;

use crate::collections::FieldMap;
use crate::field_name::TYPENAME;
use crate::value::Value;

/// A normalized entity record: store field name to value.
///
/// A slot may hold `None`, the explicit "this field became absent" marker an
/// optimistic layer uses to shadow a value its parent still has. Records held
/// by the root never carry such slots. Cloning is O(1).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoreObject {
    fields: FieldMap<Option<Value>>,
}

impl StoreObject {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from defined field values.
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }

    /// Builds a record from the fields of an embedded object value.
    ///
    /// Returns `None` for any other kind of value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|fields| {
            Self::from_fields(fields.iter().map(|(k, v)| (Arc::clone(k), v.clone())))
        })
    }

    /// Returns a copy of this record with a field set.
    #[must_use]
    pub fn with(mut self, field: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.fields.set(field, Some(value.into()));
        self
    }

    /// Returns a copy of this record with an explicit absent marker.
    #[must_use]
    pub fn with_absent(mut self, field: impl Into<Arc<str>>) -> Self {
        self.fields.set(field, None);
        self
    }

    /// Returns the number of slots, absent markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the defined value of a field.
    #[must_use]
    pub fn get(&self, store_field_name: &str) -> Option<&Value> {
        self.fields.get(store_field_name).and_then(Option::as_ref)
    }

    /// Returns the raw slot of a field.
    ///
    /// `None` means this record has no slot for the field; `Some(None)` is an
    /// explicit absent marker.
    #[must_use]
    pub fn slot(&self, store_field_name: &str) -> Option<Option<&Value>> {
        self.fields.get(store_field_name).map(Option::as_ref)
    }

    /// Returns true if the record has a slot for the field, even an absent one.
    #[must_use]
    pub fn has_own(&self, store_field_name: &str) -> bool {
        self.fields.contains_key(store_field_name)
    }

    /// Sets a slot in place.
    pub fn set(&mut self, store_field_name: impl Into<Arc<str>>, value: Option<Value>) {
        self.fields.set(store_field_name, value);
    }

    /// Removes a slot in place.
    pub fn unset(&mut self, store_field_name: &str) -> Option<Option<Value>> {
        self.fields.unset(store_field_name)
    }

    /// Iterates over every slot in field-name order.
    pub fn slots(&self) -> impl Iterator<Item = (&Arc<str>, Option<&Value>)> {
        self.fields.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Iterates over defined fields in field-name order.
    pub fn fields(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    /// Iterates over store field names, absent markers included.
    pub fn store_field_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.fields.keys()
    }

    /// Returns true if every slot is an absent marker (or there are none).
    #[must_use]
    pub fn all_absent(&self) -> bool {
        self.fields.values().all(Option::is_none)
    }

    /// Returns the record's `__typename`, if it is a string.
    #[must_use]
    pub fn typename(&self) -> Option<&str> {
        self.get(TYPENAME).and_then(Value::as_str)
    }

    /// Returns a copy without absent markers.
    #[must_use]
    pub fn without_absent(&self) -> Self {
        if self.fields.values().all(Option::is_some) {
            return self.clone();
        }
        Self::from_fields(self.fields().map(|(k, v)| (Arc::clone(k), v.clone())))
    }

    /// Converts the defined fields into an embedded object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::object(self.fields().map(|(k, v)| (Arc::clone(k), v.clone())))
    }

    /// Returns true if both records share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.fields.ptr_eq(&other.fields)
    }
}

impl fmt::Debug for StoreObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.slots() {
            match v {
                Some(v) => map.entry(k, v),
                None => map.entry(k, &format_args!("<absent>")),
            };
        }
        map.finish()
    }
}

#[cfg(feature = "serde")]
mod serde_support {
    use super::StoreObject;
    use crate::value::Value;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl Serialize for StoreObject {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            // Absent markers have no wire form; they only exist in layers.
            let mut map = serializer.serialize_map(None)?;
            for (key, value) in self.fields() {
                map.serialize_entry(&**key, value)?;
            }
            map.end()
        }
    }

    impl<'de> Deserialize<'de> for StoreObject {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct RecordVisitor;

            impl<'de> Visitor<'de> for RecordVisitor {
                type Value = StoreObject;

                fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                    formatter.write_str("an entity record")
                }

                fn visit_map<A>(self, mut map: A) -> Result<StoreObject, A::Error>
                where
                    A: MapAccess<'de>,
                {
                    let mut record = StoreObject::new();
                    while let Some((key, value)) = map.next_entry::<String, Value>()? {
                        record.set(key, Some(value));
                    }
                    Ok(record)
                }
            }

            deserializer.deserialize_map(RecordVisitor)
        }
    }
}
