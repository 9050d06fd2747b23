//! Optimistic layer rebuilds

use normcache::foundation::{Result, StoreObject, Value};
use normcache::store::{DefaultPolicies, EntityStore, StoreConfig, StoreMut};

fn counter_store(start: i64) -> EntityStore {
    let mut store = EntityStore::new(DefaultPolicies::new(), StoreConfig::default()).unwrap();
    store
        .root_mut()
        .merge("Counter:1", StoreObject::new().with("value", start))
        .unwrap();
    store
}

fn read(layer: &StoreMut<'_>) -> i64 {
    layer
        .get("Counter:1", "value")
        .and_then(|v| v.as_int())
        .unwrap_or(0)
}

fn increment(layer: &mut StoreMut<'_>) -> Result<()> {
    let next = read(layer) + 1;
    layer.merge("Counter:1", StoreObject::new().with("value", next))
}

fn times_ten(layer: &mut StoreMut<'_>) -> Result<()> {
    let next = read(layer) * 10;
    layer.merge("Counter:1", StoreObject::new().with("value", next))
}

#[test]
fn removing_a_lower_layer_matches_a_fresh_replay() {
    let mut store = counter_store(1);
    store.add_layer("L1", increment).unwrap();
    store.add_layer("L2", times_ten).unwrap();
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(20)));

    assert!(store.remove_layer("L1").unwrap());

    let mut fresh = counter_store(1);
    fresh.add_layer("L2", times_ten).unwrap();
    assert_eq!(store.layer_ids(), fresh.layer_ids());
    assert_eq!(store.optimistic().to_object(), fresh.optimistic().to_object());
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(10)));
}

#[test]
fn surviving_layers_see_later_root_writes_after_a_rebuild() {
    let mut store = counter_store(1);
    store.add_layer("L1", increment).unwrap();
    store.add_layer("L2", times_ten).unwrap();

    store
        .root_mut()
        .merge("Counter:1", StoreObject::new().with("value", 5))
        .unwrap();
    // L2 still holds the value it computed before the root write.
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(20)));

    store.remove_layer("L1").unwrap();
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(50)));
    assert_eq!(store.root().get("Counter:1", "value"), Some(Value::Int(5)));
}

#[test]
fn mutation_lifecycle_confirms_through_the_root() {
    let mut store = counter_store(1);
    store.add_layer("mutation-1", increment).unwrap();
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(2)));

    // Server result arrives: write it to the root, then drop the guess.
    store
        .root_mut()
        .merge("Counter:1", StoreObject::new().with("value", 3))
        .unwrap();
    store.remove_layer("mutation-1").unwrap();
    assert_eq!(store.depth(), 0);
    assert_eq!(store.optimistic().get("Counter:1", "value"), Some(Value::Int(3)));
}

#[test]
fn layered_extract_includes_optimistic_entities() {
    let mut store = counter_store(1);
    store
        .add_layer("L1", |layer| {
            layer.merge("Draft:1", StoreObject::new().with("text", "hi"))?;
            layer.retain("Draft:1");
            Ok(())
        })
        .unwrap();
    let snapshot = store.optimistic().extract();
    assert!(snapshot.get("Draft:1").is_some());
    assert_eq!(snapshot.extra_root_ids, vec!["Draft:1".to_string()]);
    assert!(store.root().extract().get("Draft:1").is_none());
}
