//! Integration tests for extract, replace and seeding

use normcache::foundation::{ROOT_QUERY, StoreObject, Value};
use normcache::store::snapshot;
use normcache::store::{DefaultPolicies, EntityStore, Snapshot, StoreConfig};
use serde_json::json;

use crate::sample_store;

#[test]
fn extract_serializes_to_a_flat_map() {
    let mut store = sample_store();
    store.root_mut().retain("User:1");
    let json = snapshot::to_json(&store.root().extract()).unwrap();
    assert_eq!(
        json,
        json!({
            "ROOT_QUERY": {"__typename": "Query", "item": {"__ref": "Item:1"}},
            "Item:1": {"__typename": "Item", "name": "a", "owner": {"__ref": "User:1"}},
            "User:1": {"__typename": "User", "name": "u"},
            "__META": {"extraRootIds": ["User:1"]}
        })
    );
}

#[test]
fn meta_is_omitted_without_extra_roots() {
    let store = sample_store();
    let json = snapshot::to_json(&store.root().extract()).unwrap();
    assert!(json.get("__META").is_none());
}

#[test]
fn replace_swaps_the_contents() {
    let mut store = sample_store();
    let next = Snapshot::new()
        .with_entity(ROOT_QUERY, StoreObject::new().with("count", 1))
        .with_entity("Fresh:1", StoreObject::new().with("x", 1))
        .with_extra_root("Fresh:1");
    store.root_mut().replace(Some(&next)).unwrap();

    let root = store.root();
    assert!(!root.has("Item:1"));
    assert!(!root.has("User:1"));
    assert_eq!(root.get(ROOT_QUERY, "count"), Some(Value::Int(1)));
    assert_eq!(root.get(ROOT_QUERY, "item"), Some(Value::reference("Item:1")));
    assert!(root.root_id_set().contains("Fresh:1"));
}

#[test]
fn clear_empties_the_root() {
    let mut store = sample_store();
    store.root_mut().clear().unwrap();
    assert!(store.root().to_object().is_empty());
    assert!(store.root().has(ROOT_QUERY));
}

#[test]
fn config_seed_populates_the_root() {
    let seed = snapshot::from_json(json!({
        "ROOT_QUERY": {"item": {"__ref": "Item:1"}},
        "Item:1": {"__typename": "Item", "name": "seeded"},
        "__META": {"extraRootIds": ["Item:1"]}
    }))
    .unwrap();
    let store = EntityStore::new(
        DefaultPolicies::new(),
        StoreConfig::default().with_seed(seed),
    )
    .unwrap();
    assert_eq!(store.root().get("Item:1", "name"), Some(Value::from("seeded")));
    assert!(store.root().root_id_set().contains("Item:1"));
}

#[test]
fn malformed_snapshots_are_rejected() {
    let err = snapshot::from_json(json!(["not", "a", "map"])).unwrap_err();
    assert!(matches!(
        err.kind,
        normcache::foundation::ErrorKind::SerializationError(_)
    ));
}

#[test]
fn message_pack_round_trip() {
    let store = sample_store();
    let extracted = store.root().extract();
    let bytes = snapshot::to_bytes(&extracted).unwrap();
    let back = snapshot::from_bytes(&bytes).unwrap();
    assert_eq!(back.entities, extracted.entities);
}
