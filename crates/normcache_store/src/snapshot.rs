//! Plain snapshots of a store view.
//!
//! On the wire a snapshot is a single map from entity id to record, plus an
//! optional `__META` entry listing retained ids that are not well-known
//! roots:
//!
//! ```json
//! { "ROOT_QUERY": { ... }, "Item:1": { ... }, "__META": { "extraRootIds": ["Item:1"] } }
//! ```

use std::collections::BTreeMap;

use normcache_foundation::StoreObject;

/// Every visible entity of a view, plus its extra retained ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Entity id to record. Absent markers never appear here.
    pub entities: BTreeMap<String, StoreObject>,
    /// Retained ids that are not well-known roots, sorted.
    pub extra_root_ids: Vec<String>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method adding an entity.
    #[must_use]
    pub fn with_entity(mut self, id: impl Into<String>, record: StoreObject) -> Self {
        self.entities.insert(id.into(), record);
        self
    }

    /// Builder method adding an extra root id.
    #[must_use]
    pub fn with_extra_root(mut self, id: impl Into<String>) -> Self {
        self.extra_root_ids.push(id.into());
        self
    }

    /// Returns a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StoreObject> {
        self.entities.get(id)
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the snapshot holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(feature = "serde")]
mod serde_support {
    use super::Snapshot;
    use normcache_foundation::{META_KEY, StoreObject};
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;
    use std::fmt;

    #[derive(Serialize, Deserialize, Default)]
    struct Meta {
        #[serde(rename = "extraRootIds", default)]
        extra_root_ids: Vec<String>,
    }

    impl Serialize for Snapshot {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut map = serializer.serialize_map(None)?;
            for (id, record) in &self.entities {
                map.serialize_entry(id, record)?;
            }
            if !self.extra_root_ids.is_empty() {
                let meta = Meta {
                    extra_root_ids: self.extra_root_ids.clone(),
                };
                map.serialize_entry(META_KEY, &meta)?;
            }
            map.end()
        }
    }

    impl<'de> Deserialize<'de> for Snapshot {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct SnapshotVisitor;

            impl<'de> Visitor<'de> for SnapshotVisitor {
                type Value = Snapshot;

                fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                    formatter.write_str("a map of entity ids to records")
                }

                fn visit_map<A>(self, mut map: A) -> Result<Snapshot, A::Error>
                where
                    A: MapAccess<'de>,
                {
                    let mut entities = BTreeMap::new();
                    let mut meta = Meta::default();
                    while let Some(key) = map.next_key::<String>()? {
                        if key == META_KEY {
                            meta = map.next_value()?;
                        } else {
                            let record: StoreObject = map.next_value()?;
                            entities.insert(key, record);
                        }
                    }
                    Ok(Snapshot {
                        entities,
                        extra_root_ids: meta.extra_root_ids,
                    })
                }
            }

            deserializer.deserialize_map(SnapshotVisitor)
        }
    }
}

#[cfg(feature = "serde")]
mod codec {
    use super::Snapshot;
    use normcache_foundation::{Error, ErrorKind, Result};

    /// Serializes a snapshot to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(snapshot: &Snapshot) -> Result<serde_json::Value> {
        serde_json::to_value(snapshot)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    /// Deserializes a snapshot from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a map of records.
    pub fn from_json(value: serde_json::Value) -> Result<Snapshot> {
        serde_json::from_value(value)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    /// Serializes a snapshot to `MessagePack` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(snapshot)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    /// Deserializes a snapshot from `MessagePack` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }
}

#[cfg(feature = "serde")]
pub use codec::{from_bytes, from_json, to_bytes, to_json};
