//! Integration tests for StoreObject
//!
//! Tests field slots, absent markers, and typename access.

use normcache::foundation::{StoreObject, TYPENAME, Value};

#[test]
fn with_builds_a_new_record() {
    let r = StoreObject::new().with(TYPENAME, "Item").with("name", "a");
    assert_eq!(r.len(), 2);
    assert_eq!(r.typename(), Some("Item"));
    assert_eq!(r.get("name"), Some(&Value::from("a")));
}

#[test]
fn absent_markers_are_own_but_unreadable() {
    let r = StoreObject::new().with("a", 1).with_absent("b");
    assert!(r.has_own("b"));
    assert_eq!(r.get("b"), None);
    assert_eq!(r.fields().count(), 1);
    assert_eq!(r.slots().count(), 2);
    assert!(!r.all_absent());
    assert!(StoreObject::new().with_absent("x").all_absent());
}

#[test]
fn without_absent_keeps_defined_fields() {
    let r = StoreObject::new().with("a", 1).with_absent("b");
    let clean = r.without_absent();
    assert_eq!(clean, StoreObject::new().with("a", 1));
}

#[test]
fn from_value_reads_embedded_objects_only() {
    let v = Value::object([("x", Value::Int(1))]);
    assert_eq!(StoreObject::from_value(&v), Some(StoreObject::new().with("x", 1)));
    assert_eq!(StoreObject::from_value(&Value::Int(1)), None);
}

#[test]
fn clones_share_storage_until_written() {
    let a = StoreObject::new().with("x", 1);
    let mut b = a.clone();
    assert!(a.ptr_eq(&b));
    b.set("y", Some(Value::Int(2)));
    assert!(!a.ptr_eq(&b));
    assert_eq!(a.get("y"), None);
}

#[test]
fn non_string_typename_reads_as_none() {
    let r = StoreObject::new().with(TYPENAME, 3);
    assert_eq!(r.typename(), None);
}
