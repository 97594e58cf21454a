//! Property — a named, typed, observable value on a Thing.
//!
//! A property has two write paths:
//!
//! - [`Property::set_value`] is the *external* path. It rejects read-only
//!   properties, validates, and hands the value to the [`ValueForwarder`]
//!   (if any). Whatever the forwarder returns is what gets stored, so a
//!   device can clamp or echo back the value it actually applied.
//! - [`Property::set_cached_value`] is the *internal* path used by device
//!   logic to record observed state. It validates and stores, and never
//!   calls the forwarder.

mod metadata;

pub use metadata::{PropertyMetadata, ValueType};

use std::fmt;

use serde_json::{Map, Value, json};

use crate::error::{ForwarderError, ValidationError, WebThingError};

/// Write-through capability invoked when an external actor changes a property.
///
/// Returns the value the device actually applied.
pub trait ValueForwarder: Send + Sync {
    /// Push `value` to the device.
    ///
    /// # Errors
    ///
    /// Returns a [`ForwarderError`] when the device refuses the value.
    fn set_value(&mut self, value: Value) -> Result<Value, ForwarderError>;
}

impl<F> ValueForwarder for F
where
    F: FnMut(Value) -> Result<Value, ForwarderError> + Send + Sync,
{
    fn set_value(&mut self, value: Value) -> Result<Value, ForwarderError> {
        self(value)
    }
}

/// A named value cell with metadata-driven validation.
pub struct Property {
    name: String,
    value: Value,
    metadata: PropertyMetadata,
    href_prefix: String,
    forwarder: Option<Box<dyn ValueForwarder>>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("metadata", &self.metadata)
            .field("href_prefix", &self.href_prefix)
            .field("forwarder", &self.forwarder.is_some())
            .finish()
    }
}

impl Property {
    /// Create a builder for constructing a [`Property`].
    #[must_use]
    pub fn builder() -> PropertyBuilder {
        PropertyBuilder::default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get_value(&self) -> Value {
        self.value.clone()
    }

    #[must_use]
    pub fn metadata(&self) -> &PropertyMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn has_forwarder(&self) -> bool {
        self.forwarder.is_some()
    }

    #[must_use]
    pub fn href_prefix(&self) -> &str {
        &self.href_prefix
    }

    pub fn set_href_prefix(&mut self, prefix: impl Into<String>) {
        self.href_prefix = prefix.into();
    }

    /// `<prefix>/properties/<name>`.
    #[must_use]
    pub fn href(&self) -> String {
        format!("{}/properties/{}", self.href_prefix, self.name)
    }

    /// Check `value` against this property's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidValue`] when the type, bounds or
    /// enum constraint is violated.
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        self.metadata.validate(value)
    }

    /// External write: validate, forward to the device, store what it echoes.
    ///
    /// On any error the stored value is left untouched.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::ReadOnly`] when the metadata declares `readOnly`
    /// - [`ValidationError::InvalidValue`] when `value` (or the forwarder's
    ///   echo) fails validation
    /// - [`WebThingError::Forwarder`] when the forwarder refuses the value
    pub fn set_value(&mut self, value: Value) -> Result<(), WebThingError> {
        if self.metadata.is_read_only() {
            return Err(ValidationError::ReadOnly.into());
        }
        self.validate_value(&value)?;

        let value = match self.forwarder.as_mut() {
            Some(forwarder) => forwarder.set_value(value)?,
            None => value,
        };
        self.set_cached_value(value)?;
        Ok(())
    }

    /// Internal write: validate and store without touching the forwarder.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidValue`] when `value` fails validation.
    pub fn set_cached_value(&mut self, value: Value) -> Result<(), ValidationError> {
        self.validate_value(&value)?;
        self.value = value;
        Ok(())
    }

    /// Metadata merged with a `links` entry pointing at this property.
    #[must_use]
    pub fn as_property_description(&self) -> Value {
        let mut description = self.metadata.as_map().clone();
        push_link(&mut description, json!({"href": self.href(), "rel": "property"}));
        Value::Object(description)
    }
}

/// Append `link` to the `links` array of `description`, creating it if needed.
pub(crate) fn push_link(description: &mut Map<String, Value>, link: Value) {
    let links = description
        .entry("links")
        .or_insert_with(|| Value::Array(Vec::new()));
    match links {
        Value::Array(items) => items.push(link),
        other => *other = Value::Array(vec![link]),
    }
}

/// Step-by-step builder for [`Property`].
#[derive(Default)]
pub struct PropertyBuilder {
    name: Option<String>,
    value: Option<Value>,
    metadata: Option<Value>,
    forwarder: Option<Box<dyn ValueForwarder>>,
}

impl PropertyBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn forwarder(mut self, forwarder: impl ValueForwarder + 'static) -> Self {
        self.forwarder = Some(Box::new(forwarder));
        self
    }

    /// Consume the builder, validate, and return a [`Property`].
    ///
    /// The initial value is not validated: a device may start in a state
    /// its metadata does not describe (e.g. `null` before the first reading).
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyName`] if `name` is missing or empty
    /// - [`ValidationError::InvalidMetadata`] if metadata is not an object
    pub fn build(self) -> Result<Property, ValidationError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let metadata = PropertyMetadata::from_value(self.metadata.unwrap_or(Value::Null))?;

        Ok(Property {
            name,
            value: self.value.unwrap_or(Value::Null),
            metadata,
            href_prefix: String::new(),
            forwarder: self.forwarder,
        })
    }
}
