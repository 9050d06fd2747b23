//! Field-level invalidation through a tracker

use normcache::foundation::{EXISTS, StoreObject, TYPENAME, Value};
use normcache::store::{DefaultPolicies, Modification, Modifiers, StoreConfig};

use crate::{init_tracing, tracked};

fn item() -> StoreObject {
    StoreObject::new()
        .with(TYPENAME, "Item")
        .with("name", "a")
        .with("rank", 1)
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn identical_merge_is_unobservable() {
    init_tracing();
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let before = store.root().to_object();

    let (reader, name) = tracker.track(|| store.root().get("Item:1", "name"));
    assert_eq!(name, Some(Value::from("a")));

    store.root_mut().merge("Item:1", item()).unwrap();
    assert!(!tracker.is_dirty(reader));
    assert_eq!(store.root().to_object(), before);
}

#[test]
fn writes_dirty_only_the_fields_they_change() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();

    let (name_reader, _) = tracker.track(|| store.root().get("Item:1", "name"));
    let (rank_reader, _) = tracker.track(|| store.root().get("Item:1", "rank"));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("name", "b"))
        .unwrap();
    assert!(tracker.is_dirty(name_reader));
    assert!(!tracker.is_dirty(rank_reader));
}

#[test]
fn recomputation_resubscribes() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", "name"));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("name", "b"))
        .unwrap();
    let name = tracker.retrack(reader, || store.root().get("Item:1", "name"));
    assert_eq!(name, Some(Value::from("b")));
    assert!(!tracker.is_dirty(reader));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("name", "c"))
        .unwrap();
    assert!(tracker.is_dirty(reader));
}

#[test]
fn new_entities_dirty_existence() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    let (reader, exists) = tracker.track(|| store.root().has("Item:2"));
    assert!(!exists);
    let deps = tracker.dependencies(reader);
    assert!(deps
        .iter()
        .any(|k| k.entity_id() == "Item:2" && k.store_field_name() == EXISTS));

    store.root_mut().merge("Item:2", item()).unwrap();
    assert!(tracker.is_dirty(reader));
}

// =============================================================================
// Modify and Delete
// =============================================================================

#[test]
fn existence_is_dirtied_only_when_the_last_field_goes() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().has("Item:1"));

    let changed = store
        .root_mut()
        .modify("Item:1", &Modifiers::fields().delete_field("name"))
        .unwrap();
    assert!(changed);
    assert!(store.root().has("Item:1"));
    assert!(!tracker.is_dirty(reader));

    store
        .root_mut()
        .modify(
            "Item:1",
            &Modifiers::all(|_, _| Modification::Delete),
        )
        .unwrap();
    assert!(!store.root().has("Item:1"));
    assert!(tracker.is_dirty(reader));
}

#[test]
fn invalidate_dirties_without_writing() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let before = store.root().lookup("Item:1", false).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", "rank"));

    let changed = store
        .root_mut()
        .modify(
            "Item:1",
            &Modifiers::fields().field("rank", |_, _| Modification::Invalidate),
        )
        .unwrap();
    assert!(!changed);
    assert!(tracker.is_dirty(reader));
    assert!(before.ptr_eq(&store.root().lookup("Item:1", false).unwrap()));
}

// =============================================================================
// Arguments
// =============================================================================

#[test]
fn undeclared_arguments_invalidate_every_argument_set() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", r#"items({"a":1})"#));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with(r#"items({"a":2})"#, 2))
        .unwrap();
    assert!(tracker.is_dirty(reader));
}

#[test]
fn declared_key_arguments_keep_argument_sets_apart() {
    let policies = DefaultPolicies::new().with_key_args("Item", "items", &["a"]);
    let (tracker, mut store) = tracked(policies, StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", r#"items:{"a":1}"#));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with(r#"items:{"a":2}"#, 2))
        .unwrap();
    assert!(!tracker.is_dirty(reader));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with(r#"items:{"a":1}"#, 1))
        .unwrap();
    assert!(tracker.is_dirty(reader));
}

#[test]
fn untyped_entities_fall_back_to_bare_name_invalidation() {
    let policies = DefaultPolicies::new().with_key_args("Item", "items", &["a"]);
    let (tracker, mut store) = tracked(policies, StoreConfig::default());
    store
        .root_mut()
        .merge("Loose:1", StoreObject::new().with("x", 1))
        .unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Loose:1", r#"items:{"a":1}"#));

    store
        .root_mut()
        .merge("Loose:1", StoreObject::new().with(r#"items:{"a":2}"#, 2))
        .unwrap();
    assert!(tracker.is_dirty(reader));
}

// =============================================================================
// Layers and Configuration
// =============================================================================

#[test]
fn removing_a_layer_dirties_only_what_it_changed() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    store
        .add_layer("opt", |layer| {
            layer.merge("Item:1", StoreObject::new().with("name", "optimistic"))
        })
        .unwrap();

    let (name_reader, name) = tracker.track(|| store.optimistic().get("Item:1", "name"));
    let (rank_reader, _) = tracker.track(|| store.optimistic().get("Item:1", "rank"));
    assert_eq!(name, Some(Value::from("optimistic")));

    assert!(store.remove_layer("opt").unwrap());
    assert!(tracker.is_dirty(name_reader));
    assert!(!tracker.is_dirty(rank_reader));
}

#[test]
fn root_writes_reach_optimistic_readers() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    store.add_layer("opt", |_| Ok(())).unwrap();
    let (reader, _) = tracker.track(|| store.optimistic().get("Item:1", "rank"));

    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("rank", 2))
        .unwrap();
    assert!(tracker.is_dirty(reader));
}

#[test]
fn layer_writes_do_not_reach_root_readers() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::default());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", "name"));

    store
        .add_layer("opt", |layer| {
            layer.merge("Item:1", StoreObject::new().with("name", "optimistic"))
        })
        .unwrap();
    assert!(!tracker.is_dirty(reader));
}

#[test]
fn uncached_stores_never_touch_the_tracker() {
    let (tracker, mut store) = tracked(DefaultPolicies::new(), StoreConfig::uncached());
    store.root_mut().merge("Item:1", item()).unwrap();
    let (reader, _) = tracker.track(|| store.root().get("Item:1", "name"));
    assert!(tracker.dependencies(reader).is_empty());
    assert!(store.tracker().is_none());
    assert!(!store.root_group().caching());
}
