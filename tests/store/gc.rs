//! Integration tests for retention, reachability and collection

use normcache::foundation::{ROOT_QUERY, StoreObject, Value};

use crate::sample_store;

#[test]
fn reachable_entities_survive() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge("Orphan:1", StoreObject::new().with("x", 1))
        .unwrap();
    let removed = store.root_mut().gc().unwrap();
    assert_eq!(removed, vec!["Orphan:1".to_string()]);
    assert!(store.root().has("User:1"));
}

#[test]
fn dropping_a_reference_orphans_the_chain_below_it() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge(ROOT_QUERY, StoreObject::new().with("item", Value::Null))
        .unwrap();
    let removed = store.root_mut().gc().unwrap();
    assert_eq!(removed, vec!["Item:1".to_string(), "User:1".to_string()]);
}

#[test]
fn references_inside_lists_and_objects_count() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge(
            "Item:1",
            StoreObject::new().with(
                "related",
                Value::object([("list", Value::list([Value::reference("Item:9")]))]),
            ),
        )
        .unwrap();
    store
        .root_mut()
        .merge("Item:9", StoreObject::new().with("x", 1))
        .unwrap();
    assert!(store.root_mut().gc().unwrap().is_empty());
    assert!(store.root().find_child_ref_ids("Item:1").contains("Item:9"));
}

#[test]
fn layer_retains_only_protect_from_their_level() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge("Orphan:1", StoreObject::new().with("x", 1))
        .unwrap();
    store
        .add_layer("opt", |layer| {
            layer.retain("Orphan:1");
            Ok(())
        })
        .unwrap();

    assert!(store.optimistic().root_id_set().contains("Orphan:1"));
    assert!(!store.root().root_id_set().contains("Orphan:1"));
    assert!(store.optimistic_mut().gc().unwrap().is_empty());
    assert_eq!(store.root_mut().gc().unwrap(), vec!["Orphan:1".to_string()]);
}

#[test]
fn layer_child_refs_include_the_parent_partition() {
    let mut store = sample_store();
    store
        .add_layer("opt", |layer| {
            layer.merge("Item:1", StoreObject::new().with("extra", Value::reference("User:2")))
        })
        .unwrap();
    let refs = store.optimistic().find_child_ref_ids("Item:1");
    assert!(refs.contains("User:1"));
    assert!(refs.contains("User:2"));
    assert!(!store.root().find_child_ref_ids("Item:1").contains("User:2"));
}

#[test]
fn release_below_zero_stays_at_zero() {
    let mut store = sample_store();
    let mut root = store.root_mut();
    assert_eq!(root.release("Never:1"), 0);
    assert_eq!(root.retain("Item:1"), 1);
    assert_eq!(root.release("Item:1"), 0);
    assert_eq!(root.release("Item:1"), 0);
}
