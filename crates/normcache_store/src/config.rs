//! Configuration for an entity store.

use crate::snapshot::Snapshot;

/// Configuration for an [`EntityStore`](crate::EntityStore).
///
/// Controls dependency tracking and the initial contents of the root.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Whether reads register dependencies and writes dirty them.
    ///
    /// With caching off, groups carry no tracker and merges skip the
    /// dirty-set computation entirely.
    pub result_caching: bool,

    /// Snapshot the root is populated from at construction.
    pub seed: Option<Snapshot>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            result_caching: true,
            seed: None,
        }
    }
}

impl StoreConfig {
    /// Creates the default configuration (caching on, empty root).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with dependency tracking disabled.
    #[must_use]
    pub fn uncached() -> Self {
        Self {
            result_caching: false,
            ..Self::default()
        }
    }

    /// Builder method to enable/disable dependency tracking.
    #[must_use]
    pub fn with_result_caching(mut self, enabled: bool) -> Self {
        self.result_caching = enabled;
        self
    }

    /// Builder method to seed the root from a snapshot.
    #[must_use]
    pub fn with_seed(mut self, seed: Snapshot) -> Self {
        self.seed = Some(seed);
        self
    }
}
