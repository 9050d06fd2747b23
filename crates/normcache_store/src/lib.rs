//! Layered entity store, dependency groups, reference graph, and garbage
//! collection for normcache.
//!
//! This crate provides:
//! - [`EntityStore`] - Root, Stump and optimistic layers over normalized records
//! - [`CacheGroup`] - Field-level dependency tracking and invalidation
//! - [`Policies`] - Entity identity, store field names, and drop hooks
//! - [`Modifiers`] - Per-field rewrites for `modify`
//! - [`Snapshot`] - Plain snapshots for `extract` and `replace`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dependency;
pub mod keys;
pub mod modify;
pub mod path;
pub mod policies;
pub mod reconcile;
pub mod snapshot;
pub mod store;

pub use config::StoreConfig;
pub use dependency::{CacheGroup, Computation, DepKey, DependencyTracker, GroupId, ReactiveTracker};
pub use keys::{CacheKey, Storage, StorageParent};
pub use modify::{FieldModifier, Modification, ModifierDetails, Modifiers};
pub use path::{ObjectPath, PathSegment};
pub use policies::{DefaultPolicies, DroppedField, Policies};
pub use snapshot::Snapshot;
pub use store::{
    EntityStore, EvictOptions, FieldSource, LayerKind, MergeInput, Replay, StoreMut, StoreRef,
    ToReference,
};
