//! Identity and field-naming policies the store consults.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use normcache_foundation::field_name::{key_args_store_name, store_key_name};
use normcache_foundation::{
    Error, FieldMap, ROOT_MUTATION, ROOT_QUERY, ROOT_SUBSCRIPTION, Result, StoreObject, TYPENAME,
    Value,
};

use crate::keys::Storage;
use crate::path::ObjectPath;
use crate::store::FieldSource;

/// A nested field that disappeared from an entity during a merge.
#[derive(Debug)]
pub struct DroppedField<'a> {
    /// Typename of the object that held the field.
    pub typename: Option<&'a str>,
    /// The object that held the field, as it was before the merge: the
    /// entity record for top-level fields, an embedded object otherwise.
    pub parent: FieldSource<'a>,
    /// Path of the object that held the field.
    pub parent_path: &'a ObjectPath,
    /// The field's key within its parent.
    pub field_name: &'a str,
    /// The value that was dropped.
    pub value: &'a Value,
    /// Storage slot of the dropped field.
    pub storage: &'a Storage,
}

impl DroppedField<'_> {
    /// Returns the id of the entity that held the field.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        self.parent_path.entity_id()
    }
}

/// The questions an [`EntityStore`](crate::EntityStore) asks about ids,
/// typenames and field names.
pub trait Policies {
    /// Returns the typename implied by a well-known root id.
    fn root_typename(&self, id: &str) -> Option<&str>;

    /// Returns the well-known root ids, which are always reachable.
    fn root_ids(&self) -> Vec<String>;

    /// Derives an entity id for an object, or `None` if it has no identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the object cannot be identified as declared.
    fn identify(&self, object: &StoreObject) -> Result<Option<String>>;

    /// Returns true if `field_name` on `typename` declares key arguments.
    fn has_key_args(&self, _typename: Option<&str>, _field_name: &str) -> bool {
        false
    }

    /// Computes the store field name for a field called with `args`.
    fn store_field_name(
        &self,
        _typename: Option<&str>,
        field_name: &str,
        args: Option<&FieldMap<Value>>,
    ) -> String {
        store_key_name(field_name, args)
    }

    /// Hook invoked for each nested field a merge drops.
    ///
    /// # Errors
    ///
    /// An error aborts the remaining hooks and propagates out of the merge.
    fn drop_field(&self, _field: &DroppedField<'_>) -> Result<()> {
        Ok(())
    }
}

/// Hook type for [`DefaultPolicies::on_drop`].
pub type DropHook = Rc<dyn Fn(&DroppedField<'_>) -> Result<()>>;

#[derive(Clone, Default)]
struct FieldPolicy {
    key_args: Option<Vec<String>>,
    drop: Option<DropHook>,
}

#[derive(Clone, Default)]
struct TypePolicy {
    key_fields: Option<Vec<String>>,
    fields: HashMap<String, FieldPolicy>,
}

/// Table-driven [`Policies`].
///
/// Ids default to `Typename:id` (or `_id`); types can declare key fields,
/// fields can declare key arguments and drop hooks.
#[derive(Clone)]
pub struct DefaultPolicies {
    roots: BTreeMap<String, String>,
    types: HashMap<String, TypePolicy>,
}

impl Default for DefaultPolicies {
    fn default() -> Self {
        let roots = [
            (ROOT_QUERY, "Query"),
            (ROOT_MUTATION, "Mutation"),
            (ROOT_SUBSCRIPTION, "Subscription"),
        ]
        .into_iter()
        .map(|(id, t)| (id.to_string(), t.to_string()))
        .collect();
        Self {
            roots,
            types: HashMap::new(),
        }
    }
}

impl DefaultPolicies {
    /// Creates policies with the three standard roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates policies without any well-known root ids.
    ///
    /// Every GC root then has to be retained explicitly.
    #[must_use]
    pub fn without_roots() -> Self {
        Self {
            roots: BTreeMap::new(),
            types: HashMap::new(),
        }
    }

    /// Registers (or renames) a root id and its implied typename.
    #[must_use]
    pub fn with_root(mut self, id: impl Into<String>, typename: impl Into<String>) -> Self {
        self.roots.insert(id.into(), typename.into());
        self
    }

    /// Declares the fields that identify objects of `typename`.
    #[must_use]
    pub fn with_key_fields(mut self, typename: impl Into<String>, fields: &[&str]) -> Self {
        self.types.entry(typename.into()).or_default().key_fields =
            Some(fields.iter().map(ToString::to_string).collect());
        self
    }

    /// Declares the arguments that distinguish stored values of a field.
    #[must_use]
    pub fn with_key_args(
        mut self,
        typename: impl Into<String>,
        field_name: impl Into<String>,
        args: &[&str],
    ) -> Self {
        self.field_policy(typename.into(), field_name.into()).key_args =
            Some(args.iter().map(ToString::to_string).collect());
        self
    }

    /// Registers a hook for dropped values of a nested field.
    #[must_use]
    pub fn on_drop<F>(
        mut self,
        typename: impl Into<String>,
        field_name: impl Into<String>,
        hook: F,
    ) -> Self
    where
        F: Fn(&DroppedField<'_>) -> Result<()> + 'static,
    {
        self.field_policy(typename.into(), field_name.into()).drop = Some(Rc::new(hook));
        self
    }

    fn field_policy(&mut self, typename: String, field_name: String) -> &mut FieldPolicy {
        self.types
            .entry(typename)
            .or_default()
            .fields
            .entry(field_name)
            .or_default()
    }

    fn field(&self, typename: Option<&str>, field_name: &str) -> Option<&FieldPolicy> {
        self.types.get(typename?)?.fields.get(field_name)
    }
}

impl Policies for DefaultPolicies {
    fn root_typename(&self, id: &str) -> Option<&str> {
        self.roots.get(id).map(String::as_str)
    }

    fn root_ids(&self) -> Vec<String> {
        self.roots.keys().cloned().collect()
    }

    fn identify(&self, object: &StoreObject) -> Result<Option<String>> {
        let Some(typename) = object.get(TYPENAME) else {
            return Ok(None);
        };
        let Some(typename) = typename.as_str() else {
            return Err(Error::malformed_object(format!(
                "__typename must be a string, found {}",
                typename.kind_name()
            )));
        };
        if let Some((id, _)) = self.roots.iter().find(|(_, t)| t.as_str() == typename) {
            return Ok(Some(id.clone()));
        }
        if let Some(key_fields) = self.types.get(typename).and_then(|t| t.key_fields.as_ref()) {
            let mut key = FieldMap::new();
            for field in key_fields {
                let value = object
                    .get(field)
                    .ok_or_else(|| Error::missing_key_field(typename, field.as_str()))?;
                key.set(field.as_str(), value.clone());
            }
            return Ok(Some(format!(
                "{typename}:{}",
                Value::from(key).to_canonical_json()
            )));
        }
        let id = object.get("id").or_else(|| object.get("_id"));
        Ok(match id {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(format!("{typename}:{s}")),
            Some(Value::Int(n)) => Some(format!("{typename}:{n}")),
            Some(other) => Some(format!("{typename}:{}", other.to_canonical_json())),
        })
    }

    fn has_key_args(&self, typename: Option<&str>, field_name: &str) -> bool {
        self.field(typename, field_name)
            .is_some_and(|f| f.key_args.is_some())
    }

    fn store_field_name(
        &self,
        typename: Option<&str>,
        field_name: &str,
        args: Option<&FieldMap<Value>>,
    ) -> String {
        match self.field(typename, field_name).and_then(|f| f.key_args.as_ref()) {
            Some(key_args) => key_args_store_name(field_name, args, key_args),
            None => store_key_name(field_name, args),
        }
    }

    fn drop_field(&self, field: &DroppedField<'_>) -> Result<()> {
        match self.field(field.typename, field.field_name).and_then(|f| f.drop.as_ref()) {
            Some(hook) => hook(field),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for DefaultPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.types.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("DefaultPolicies")
            .field("roots", &self.roots)
            .field("types", &types)
            .finish()
    }
}
