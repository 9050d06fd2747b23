//! Integration tests for the serde wire form of values and records

use normcache::foundation::{StoreObject, Value};
use serde_json::json;

#[test]
fn references_serialize_as_ref_objects() {
    let v = Value::list([Value::reference("Item:1"), Value::Int(2)]);
    assert_eq!(serde_json::to_value(&v).unwrap(), json!([{"__ref": "Item:1"}, 2]));
}

#[test]
fn ref_objects_deserialize_as_references() {
    let v: Value = serde_json::from_value(json!({"__ref": "Item:1"})).unwrap();
    assert_eq!(v, Value::reference("Item:1"));
    let not_ref: Value = serde_json::from_value(json!({"__ref": "x", "y": 1})).unwrap();
    assert!(!not_ref.is_reference());
}

#[test]
fn records_drop_absent_markers_on_the_wire() {
    let r = StoreObject::new().with("a", 1).with_absent("b");
    assert_eq!(serde_json::to_value(&r).unwrap(), json!({"a": 1}));
}

#[test]
fn records_round_trip_through_json() {
    let r = StoreObject::new()
        .with("__typename", "Item")
        .with("tags", Value::list([Value::from("x")]))
        .with("owner", Value::reference("User:1"));
    let back: StoreObject = serde_json::from_value(serde_json::to_value(&r).unwrap()).unwrap();
    assert_eq!(back, r);
}
