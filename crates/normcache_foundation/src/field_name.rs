//! Store field names: a field's name plus the serialized arguments that
//! distinguish one stored value of that field from another.

use crate::collections::FieldMap;
use crate::value::Value;

/// Field holding an entity's typename.
pub const TYPENAME: &str = "__typename";
/// Pseudo-field used to track dependencies on an entity's existence.
pub const EXISTS: &str = "__exists";
/// Key tagging a serialized reference.
pub const REF_KEY: &str = "__ref";
/// Key holding snapshot metadata.
pub const META_KEY: &str = "__META";

/// Extracts the bare field name from a store field name.
///
/// The bare name is the longest prefix matching `[_A-Za-z][_0-9A-Za-z]*`,
/// so both `items({"first":2})` and `items:{"cursor":"x"}` map to `items`.
/// A name that does not start with an identifier character is returned whole.
#[must_use]
pub fn field_name_from_store_name(store_field_name: &str) -> &str {
    let mut end = 0;
    for (i, c) in store_field_name.char_indices() {
        let ok = if i == 0 {
            c == '_' || c.is_ascii_alphabetic()
        } else {
            c == '_' || c.is_ascii_alphanumeric()
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        store_field_name
    } else {
        &store_field_name[..end]
    }
}

/// Returns true if the store field name carries serialized arguments.
#[must_use]
pub fn has_arguments(store_field_name: &str) -> bool {
    field_name_from_store_name(store_field_name).len() != store_field_name.len()
}

/// Builds the store field name for a field called with every argument
/// distinguishing: `field({"a":1,"b":2})`, keys sorted.
#[must_use]
pub fn store_key_name(field_name: &str, args: Option<&FieldMap<Value>>) -> String {
    match args {
        Some(args) if !args.is_empty() => {
            let mut out = String::with_capacity(field_name.len() + 16);
            out.push_str(field_name);
            out.push('(');
            Value::from(args.clone()).write_canonical_json(&mut out);
            out.push(')');
            out
        }
        _ => field_name.to_string(),
    }
}

/// Builds the store field name for a field whose distinguishing arguments
/// are declared: `field:{"id":3}`. Undeclared arguments are ignored, and a
/// call without any declared argument stores under the bare name.
#[must_use]
pub fn key_args_store_name(
    field_name: &str,
    args: Option<&FieldMap<Value>>,
    key_args: &[String],
) -> String {
    let Some(args) = args else {
        return field_name.to_string();
    };
    let subset: FieldMap<Value> = key_args
        .iter()
        .filter_map(|k| args.get(k).map(|v| (k.as_str(), v.clone())))
        .collect();
    if subset.is_empty() {
        return field_name.to_string();
    }
    let mut out = String::with_capacity(field_name.len() + 16);
    out.push_str(field_name);
    out.push(':');
    Value::from(subset).write_canonical_json(&mut out);
    out
}
