//! Core values, references, store field names, and persistent collections
//! for normcache.
//!
//! This crate provides:
//! - [`Value`] - Field values, with identity-preserving clones
//! - [`Reference`] - Tagged pointers to normalized entities
//! - [`StoreObject`] - Entity records, including absent-field markers
//! - [`FieldMap`] - Persistent ordered maps keyed by field name
//! - Store field name helpers in [`field_name`]
//! - [`Error`] - Error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod field_name;
pub mod record;
pub mod reference;
pub mod value;

pub use collections::FieldMap;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use field_name::{EXISTS, META_KEY, REF_KEY, TYPENAME, field_name_from_store_name};
pub use record::StoreObject;
pub use reference::{ROOT_MUTATION, ROOT_QUERY, ROOT_SUBSCRIPTION, Reference};
pub use value::{Value, WeakValue};
