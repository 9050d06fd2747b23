//! Integration tests for store field names

use normcache::foundation::field_name::{
    has_arguments, key_args_store_name, store_key_name,
};
use normcache::foundation::{FieldMap, Value, field_name_from_store_name};

fn args(pairs: &[(&str, Value)]) -> FieldMap<Value> {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

#[test]
fn bare_name_strips_both_argument_forms() {
    assert_eq!(field_name_from_store_name(r#"items({"first":2})"#), "items");
    assert_eq!(field_name_from_store_name(r#"items:{"cursor":"x"}"#), "items");
    assert_eq!(field_name_from_store_name("__typename"), "__typename");
    assert_eq!(field_name_from_store_name("9lives"), "9lives");
}

#[test]
fn store_key_name_sorts_arguments() {
    let a = args(&[("b", Value::Int(2)), ("a", Value::Int(1))]);
    let name = store_key_name("items", Some(&a));
    assert_eq!(name, r#"items({"a":1,"b":2})"#);
    assert!(has_arguments(&name));
    assert_eq!(store_key_name("items", None), "items");
    assert_eq!(store_key_name("items", Some(&FieldMap::new())), "items");
}

#[test]
fn key_args_keep_only_declared_arguments() {
    let a = args(&[("id", Value::Int(3)), ("locale", Value::from("en"))]);
    let declared = vec!["id".to_string()];
    assert_eq!(key_args_store_name("book", Some(&a), &declared), r#"book:{"id":3}"#);
    let undeclared = args(&[("locale", Value::from("en"))]);
    assert_eq!(key_args_store_name("book", Some(&undeclared), &declared), "book");
}
