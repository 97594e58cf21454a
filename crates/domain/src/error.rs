//! Common error types used across the workspace.
//!
//! The `Display` strings of the property errors are protocol messages and
//! are surfaced verbatim to remote callers.

/// A value or a constructor input violates a domain constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The value does not satisfy the property metadata (type, range, enum).
    #[error("Invalid property value")]
    InvalidValue,

    /// An external write targeted a property declared `readOnly`.
    #[error("Read-only property")]
    ReadOnly,

    #[error("id must not be empty")]
    EmptyId,

    #[error("name must not be empty")]
    EmptyName,

    /// Metadata must be a JSON object.
    #[error("metadata must be a JSON object")]
    InvalidMetadata,

    #[error("action requires a perform callback")]
    MissingPerform,
}

/// A named item could not be located.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} not found")]
pub struct NotFoundError {
    /// Human readable kind, e.g. `"Property"`.
    pub kind: &'static str,
    pub name: String,
}

impl NotFoundError {
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self {
            kind: "Property",
            name: name.into(),
        }
    }
}

/// A [`ValueForwarder`](crate::property::ValueForwarder) refused or failed
/// to apply a value to the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("forwarder failed: {0}")]
pub struct ForwarderError(pub String);

/// Umbrella error for every fallible domain operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebThingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// An action instance references a name never declared on the Thing.
    #[error("action {0:?} is not declared on this thing")]
    UndeclaredAction(String),

    /// An instance with this id already exists under the same action name.
    #[error("action {name:?} already has an instance with id {id:?}")]
    DuplicateAction { name: String, id: String },

    /// The action input does not satisfy the declared `input` metadata.
    #[error("Invalid action request")]
    InvalidActionInput,

    #[error(transparent)]
    Forwarder(#[from] ForwarderError),

    /// The Thing an action belongs to has been dropped.
    #[error("thing is no longer available")]
    ThingUnavailable,
}
