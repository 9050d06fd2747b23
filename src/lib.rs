//! normcache - Normalized entity cache
//!
//! This crate re-exports all layers of the normcache system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: normcache_store      - Layered entity store, dependency groups, GC
//! Layer 0: normcache_foundation - Core types (Value, Reference, StoreObject, Error)
//! ```

pub use normcache_foundation as foundation;
pub use normcache_store as store;
