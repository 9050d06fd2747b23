//! Error types for the normcache system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

/// The main error type for normcache operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an invalid merge target error.
    #[must_use]
    pub fn invalid_merge_target(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMergeTarget(message.into()))
    }

    /// Creates a malformed object error.
    #[must_use]
    pub fn malformed_object(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedObject(message.into()))
    }

    /// Creates a missing key field error.
    #[must_use]
    pub fn missing_key_field(typename: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingKeyField {
            typename: typename.into(),
            field: field.into(),
        })
    }

    /// Creates an unknown embedded object error.
    #[must_use]
    pub fn unknown_object(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownObject(message.into()))
    }

    /// Creates a policy hook failure.
    #[must_use]
    pub fn policy_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PolicyFailure(message.into()))
    }

    /// Creates a replay failure for the given layer.
    #[must_use]
    pub fn replay_failed(layer: impl Into<String>, source: &Error) -> Self {
        Self::new(ErrorKind::ReplayFailed {
            layer: layer.into(),
            message: source.to_string(),
        })
    }

    /// Returns true if this error was raised by a policy collaborator.
    #[must_use]
    pub fn is_policy_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::PolicyFailure(_) | ErrorKind::MissingKeyField { .. }
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// `merge` could not determine which entity id to write.
    #[error("invalid merge target: {0}")]
    InvalidMergeTarget(String),

    /// An object handed to identity resolution is not well formed.
    #[error("malformed object: {0}")]
    MalformedObject(String),

    /// A declared key field was absent while computing an entity id.
    #[error("missing field {field} while extracting key fields for {typename}")]
    MissingKeyField {
        /// The typename whose key fields were being extracted.
        typename: String,
        /// The key field that was missing.
        field: String,
    },

    /// An embedded object has no structural path in the store.
    #[error("unknown embedded object: {0}")]
    UnknownObject(String),

    /// A layer's replay procedure failed.
    #[error("replay of layer {layer} failed: {message}")]
    ReplayFailed {
        /// The id of the layer being built.
        layer: String,
        /// Rendered source error.
        message: String,
    },

    /// A policy hook reported a failure.
    #[error("policy failure: {0}")]
    PolicyFailure(String),

    /// Snapshot serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Entity id the failing operation targeted.
    pub entity: Option<String>,
    /// Store field name the failing operation targeted.
    pub field: Option<String>,
    /// Chain of store operations leading to the error, outermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entity id.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Sets the store field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Adds an operation frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(entity) = &self.entity {
            write!(f, "at {entity}")?;
            if let Some(field) = &self.field {
                write!(f, ".{field}")?;
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}

/// Result type alias for normcache operations.
pub type Result<T> = std::result::Result<T, Error>;
