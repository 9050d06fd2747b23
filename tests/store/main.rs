//! Integration tests for the store crate
//!
//! Tests for merge, modify/delete/evict, optimistic layers, retention and
//! collection, storage slots, and snapshots.

mod gc;
mod merge;
mod snapshots;

use normcache::foundation::{ROOT_QUERY, StoreObject, TYPENAME, Value};
use normcache::store::{DefaultPolicies, EntityStore, StoreConfig};

/// A store with the standard roots and a small graph:
/// `ROOT_QUERY.item -> Item:1`, `Item:1.owner -> User:1`.
pub fn sample_store() -> EntityStore {
    let mut store = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
    let mut root = store.root_mut();
    root.merge(
        ROOT_QUERY,
        StoreObject::new()
            .with(TYPENAME, "Query")
            .with("item", Value::reference("Item:1")),
    )
    .unwrap();
    root.merge(
        "Item:1",
        StoreObject::new()
            .with(TYPENAME, "Item")
            .with("name", "a")
            .with("owner", Value::reference("User:1")),
    )
    .unwrap();
    root.merge(
        "User:1",
        StoreObject::new().with(TYPENAME, "User").with("name", "u"),
    )
    .unwrap();
    store
}
