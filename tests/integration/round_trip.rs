//! Snapshot round trips between stores

use normcache::foundation::{ROOT_QUERY, StoreObject, TYPENAME, Value};
use normcache::store::snapshot;
use normcache::store::{DefaultPolicies, EntityStore, StoreConfig};

fn populated() -> EntityStore {
    let mut store = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
    let mut root = store.root_mut();
    root.merge(
        ROOT_QUERY,
        StoreObject::new()
            .with(TYPENAME, "Query")
            .with(r#"items({"first":2})"#, Value::list([
                Value::reference("Item:1"),
                Value::reference("Item:2"),
            ])),
    )
    .unwrap();
    for n in 1..=2 {
        root.merge(
            format!("Item:{n}"),
            StoreObject::new()
                .with(TYPENAME, "Item")
                .with("id", n)
                .with("meta", Value::object([("rank", Value::Int(n))])),
        )
        .unwrap();
    }
    root.merge("Pinned:1", StoreObject::new().with("note", "keep"))
        .unwrap();
    root.retain("Pinned:1");
    store
}

#[test]
fn extract_json_replace_reproduces_the_store() {
    let source = populated();
    let text = snapshot::to_json(&source.root().extract())
        .unwrap()
        .to_string();

    let parsed = snapshot::from_json(serde_json::from_str(&text).unwrap()).unwrap();
    let mut target = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
    target.root_mut().replace(Some(&parsed)).unwrap();

    assert_eq!(target.root().to_object(), source.root().to_object());
    assert_eq!(target.root().extract().extra_root_ids, vec!["Pinned:1"]);
    assert!(target.root_mut().gc().unwrap().is_empty());
}

#[test]
fn replace_into_a_populated_store_removes_what_is_missing() {
    let source = populated();
    let snapshot = source.root().extract();

    let mut target = populated();
    target
        .root_mut()
        .merge("Stale:1", StoreObject::new().with("x", 1))
        .unwrap();
    target.root_mut().replace(Some(&snapshot)).unwrap();
    assert!(!target.root().has("Stale:1"));
    assert_eq!(target.root().to_object(), source.root().to_object());
}

#[test]
fn embedded_objects_get_storage_after_replace() {
    let source = populated();
    let snapshot = source.root().extract();
    let mut target = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
    target.root_mut().replace(Some(&snapshot)).unwrap();

    let meta = target.root().get("Item:1", "meta").unwrap();
    let slot = target.root().get_storage(&meta, &[]).unwrap();
    let by_path = target.root().get_storage("Item:1", &["meta".into()]).unwrap();
    assert!(slot.ptr_eq(&by_path));
}
