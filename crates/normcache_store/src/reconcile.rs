//! Record reconciliation and dropped-field detection.

use std::sync::Arc;

use normcache_foundation::{StoreObject, TYPENAME, Value};

use crate::path::{ObjectPath, PathSegment};

/// Merges `incoming` over `existing`, field by field.
///
/// A field whose incoming value is deeply equal to the existing one keeps
/// the existing value, so unchanged subtrees keep their identity. Returns
/// the merged record and whether anything changed; when nothing changed the
/// merged record is `existing` itself.
#[must_use]
pub fn reconcile(existing: Option<&StoreObject>, incoming: &StoreObject) -> (StoreObject, bool) {
    let Some(existing) = existing else {
        return (incoming.clone(), true);
    };
    let mut merged = existing.clone();
    let mut changed = false;
    for (field, slot) in incoming.slots() {
        let equal = match (existing.slot(field), slot) {
            (Some(None) | None, None) => true,
            (Some(Some(prior)), Some(next)) => prior.same(next) || prior == next,
            _ => false,
        };
        if !equal {
            merged.set(Arc::clone(field), slot.cloned());
            changed = true;
        }
    }
    (merged, changed)
}

/// A nested field present before a merge and gone after it.
#[derive(Debug, Clone)]
pub struct Dropped {
    /// Typename of the object that held the field.
    pub typename: Option<String>,
    /// The object that held the field, as it was before the merge; `None`
    /// when the field belonged to the entity record itself.
    pub parent: Option<Value>,
    /// Path of the object that held the field.
    pub parent_path: ObjectPath,
    /// The field's key within its parent.
    pub field_name: Arc<str>,
    /// The value that was dropped.
    pub value: Value,
}

impl Dropped {
    /// Returns the path of the dropped field itself.
    #[must_use]
    pub fn path(&self) -> ObjectPath {
        self.parent_path.child(Arc::clone(&self.field_name))
    }
}

/// Collects every field of `existing` (at any depth) that `merged` no
/// longer has, children before their parents.
///
/// References are not descended into; list elements are compared by index.
#[must_use]
pub fn dropped_fields(id: &str, existing: &StoreObject, merged: &StoreObject) -> Vec<Dropped> {
    let mut out = Vec::new();
    let base = ObjectPath::entity(id);
    let typename = existing.typename();
    for (field, old) in existing.fields() {
        let new = merged.get(field);
        if new.is_some_and(|n| n.same(old)) {
            continue;
        }
        let segment = PathSegment::Key(Arc::clone(field));
        collect(old, new, None, &base, &segment, typename, &mut out);
    }
    out
}

fn collect(
    old: &Value,
    new: Option<&Value>,
    parent: Option<&Value>,
    parent_path: &ObjectPath,
    segment: &PathSegment,
    parent_typename: Option<&str>,
    out: &mut Vec<Dropped>,
) {
    if new.is_some_and(|n| n.same(old)) {
        return;
    }
    let own_path = parent_path.child(segment.clone());
    match old {
        Value::Object(fields) => {
            let own_typename = old.field(TYPENAME).and_then(Value::as_str);
            let new_fields = new.and_then(Value::as_object);
            for (key, child) in fields.iter() {
                let next = new_fields.and_then(|n| n.get(key));
                collect(
                    child,
                    next,
                    Some(old),
                    &own_path,
                    &PathSegment::Key(Arc::clone(key)),
                    own_typename,
                    out,
                );
            }
        }
        Value::List(items) => {
            let new_items = new.and_then(Value::as_list);
            for (i, child) in items.iter().enumerate() {
                let next = new_items.and_then(|n| n.get(i));
                let segment = PathSegment::Index(i);
                collect(child, next, Some(old), &own_path, &segment, parent_typename, out);
            }
        }
        _ => {}
    }
    if new.is_none() {
        if let PathSegment::Key(field_name) = segment {
            out.push(Dropped {
                typename: parent_typename.map(str::to_string),
                parent: parent.cloned(),
                parent_path: parent_path.clone(),
                field_name: Arc::clone(field_name),
                value: old.clone(),
            });
        }
    }
}
