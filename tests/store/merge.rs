//! Integration tests for merge and reference handling

use normcache::foundation::{ErrorKind, Reference, StoreObject, TYPENAME, Value};
use normcache::store::{DefaultPolicies, EntityStore, MergeInput, StoreConfig};

use crate::sample_store;

// =============================================================================
// Merge
// =============================================================================

#[test]
fn merge_adds_and_overwrites_fields() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("name", "b").with("rank", 3))
        .unwrap();
    let root = store.root();
    assert_eq!(root.get("Item:1", "name"), Some(Value::from("b")));
    assert_eq!(root.get("Item:1", "rank"), Some(Value::Int(3)));
    assert_eq!(root.get("Item:1", TYPENAME), Some(Value::from("Item")));
}

#[test]
fn identical_merge_keeps_the_stored_record() {
    let mut store = sample_store();
    let before = store.root().lookup("Item:1", false).unwrap();
    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("name", "a"))
        .unwrap();
    let after = store.root().lookup("Item:1", false).unwrap();
    assert!(before.ptr_eq(&after));
}

#[test]
fn structurally_equal_composites_keep_their_identity() {
    let mut store = sample_store();
    let tags = Value::list([Value::from("x"), Value::from("y")]);
    store
        .root_mut()
        .merge("Item:1", StoreObject::new().with("tags", tags))
        .unwrap();
    let first = store.root().get("Item:1", "tags").unwrap();
    store
        .root_mut()
        .merge(
            "Item:1",
            StoreObject::new().with("tags", Value::list([Value::from("x"), Value::from("y")])),
        )
        .unwrap();
    let second = store.root().get("Item:1", "tags").unwrap();
    assert!(first.same(&second));
}

#[test]
fn merge_from_a_missing_id_is_a_no_op() {
    let mut store = sample_store();
    store.root_mut().merge("Item:1", "Nope:1").unwrap();
    assert_eq!(store.root().get("Item:1", "name"), Some(Value::from("a")));
    assert!(!store.root().has("Nope:1"));
}

#[test]
fn newer_id_names_the_target() {
    let mut store = sample_store();
    store
        .root_mut()
        .merge(StoreObject::new().with("nick", "n"), "User:1")
        .unwrap();
    assert_eq!(store.root().get("User:1", "nick"), Some(Value::from("n")));
    assert_eq!(store.root().get("User:1", "name"), Some(Value::from("u")));
}

#[test]
fn merge_without_an_id_is_rejected() {
    let mut store = sample_store();
    let err = store
        .root_mut()
        .merge(
            MergeInput::Record(StoreObject::new()),
            StoreObject::new().with("a", 1),
        )
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidMergeTarget(_)));
}

#[test]
fn merge_accepts_references() {
    let mut store = sample_store();
    let target = Reference::new("User:1");
    store
        .root_mut()
        .merge(&target, StoreObject::new().with("age", 30))
        .unwrap();
    assert_eq!(store.root().get("User:1", "age"), Some(Value::Int(30)));
}

// =============================================================================
// References and Reads
// =============================================================================

#[test]
fn to_reference_identifies_objects() {
    let mut store = sample_store();
    let book = StoreObject::new().with(TYPENAME, "Book").with("id", 7).with("title", "t");
    let r = store.root_mut().to_reference(&book, true).unwrap().unwrap();
    assert_eq!(r.id(), "Book:7");
    assert_eq!(store.root().get("Book:7", "title"), Some(Value::from("t")));

    let anonymous = StoreObject::new().with("title", "t");
    assert_eq!(store.root().to_reference(&anonymous).unwrap(), None);
}

#[test]
fn to_reference_without_merging_leaves_the_store_alone() {
    let mut store = sample_store();
    let book = StoreObject::new().with(TYPENAME, "Book").with("id", 8);
    let r = store.root_mut().to_reference(&book, false).unwrap().unwrap();
    assert_eq!(r.id(), "Book:8");
    assert!(!store.root().has("Book:8"));
}

#[test]
fn key_fields_shape_the_id() {
    let policies = DefaultPolicies::new().with_key_fields("Book", &["isbn"]);
    let store = EntityStore::new(policies, StoreConfig::default()).unwrap();
    let book = StoreObject::new().with(TYPENAME, "Book").with("isbn", "123");
    let r = store.root().to_reference(&book).unwrap().unwrap();
    assert_eq!(r.id(), r#"Book:{"isbn":"123"}"#);

    let incomplete = StoreObject::new().with(TYPENAME, "Book");
    let err = store.root().to_reference(&incomplete).unwrap_err();
    assert!(err.is_policy_failure());
}

#[test]
fn field_values_read_through_references() {
    let store = sample_store();
    let root = store.root();
    let item = root.get("ROOT_QUERY", "item").unwrap();
    assert!(root.can_read(&item));
    assert_eq!(root.get_field_value(&item, "name"), Some(Value::from("a")));

    let inline = Value::object([("name", Value::from("inline"))]);
    assert_eq!(root.get_field_value(&inline, "name"), Some(Value::from("inline")));
    assert!(root.can_read(&inline));
    assert!(!root.can_read(&Value::reference("Missing:1")));
    assert!(!root.can_read(&Value::Int(1)));
}

#[test]
fn to_object_lists_every_entity() {
    let store = sample_store();
    let all = store.root().to_object();
    assert_eq!(
        all.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Item:1", "ROOT_QUERY", "User:1"]
    );
}
