//! References to normalized entities and the well-known root entity ids.

use std::fmt;
use std::sync::Arc;

/// Id of the root query entity.
pub const ROOT_QUERY: &str = "ROOT_QUERY";
/// Id of the root mutation entity.
pub const ROOT_MUTATION: &str = "ROOT_MUTATION";
/// Id of the root subscription entity.
pub const ROOT_SUBSCRIPTION: &str = "ROOT_SUBSCRIPTION";

/// A tagged value that stands in for an entity stored elsewhere.
///
/// A reference carries only the entity id, never an inline copy of the
/// entity's fields. Cloning is O(1).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(Arc<str>);

impl Reference {
    /// Creates a reference to the given entity id.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the referenced entity id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Returns the shared id string.
    #[must_use]
    pub fn shared_id(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self.0)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"__ref\":\"{}\"}}", self.0)
    }
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Reference {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
