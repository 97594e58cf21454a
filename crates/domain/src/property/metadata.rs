//! Property metadata and the value checks derived from it.
//!
//! Only a small subset of JSON Schema is enforced: `type`, `minimum`,
//! `maximum` and `enum`. Every other key is carried verbatim into the
//! property description.

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// JSON value type a property may declare through its `type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
    Null,
}

impl ValueType {
    /// Parse the `type` keyword. Unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// Whether `value` is an instance of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::Integer => is_integral(value),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }
}

// 5.0 is an integer as far as JSON is concerned.
#[allow(clippy::float_cmp)]
fn is_integral(value: &Value) -> bool {
    if value.is_i64() || value.is_u64() {
        return true;
    }
    value
        .as_f64()
        .is_some_and(|n| n.is_finite() && n.fract() == 0.0)
}

/// Metadata attached to a property (or to an action's `input`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMetadata(Map<String, Value>);

impl PropertyMetadata {
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build metadata from an arbitrary JSON value.
    ///
    /// `null` is accepted as "no metadata".
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMetadata`] for anything other than an
    /// object or `null`.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(ValidationError::InvalidMetadata),
        }
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .and_then(ValueType::parse)
    }

    #[must_use]
    pub fn minimum(&self) -> Option<f64> {
        self.0.get("minimum").and_then(Value::as_f64)
    }

    #[must_use]
    pub fn maximum(&self) -> Option<f64> {
        self.0.get("maximum").and_then(Value::as_f64)
    }

    /// Values listed under `enum`, if any.
    #[must_use]
    pub fn allowed_values(&self) -> Option<&[Value]> {
        self.0
            .get("enum")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.0
            .get("readOnly")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Check `value` against `type`, numeric bounds and `enum`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidValue`] on the first mismatch.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if let Some(value_type) = self.value_type() {
            if !value_type.matches(value) {
                return Err(ValidationError::InvalidValue);
            }
        }

        if let Some(n) = value.as_f64() {
            if self.minimum().is_some_and(|min| n < min) {
                return Err(ValidationError::InvalidValue);
            }
            if self.maximum().is_some_and(|max| n > max) {
                return Err(ValidationError::InvalidValue);
            }
        }

        if let Some(allowed) = self.allowed_values() {
            if !allowed.contains(value) {
                return Err(ValidationError::InvalidValue);
            }
        }

        Ok(())
    }
}

impl From<Map<String, Value>> for PropertyMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brightness() -> PropertyMetadata {
        PropertyMetadata::from_value(json!({
            "@type": "BrightnessProperty",
            "type": "integer",
            "minimum": 0,
            "maximum": 100,
            "unit": "percent"
        }))
        .unwrap()
    }

    #[test]
    fn should_accept_value_within_bounds() {
        assert!(brightness().validate(&json!(5)).is_ok());
        assert!(brightness().validate(&json!(0)).is_ok());
        assert!(brightness().validate(&json!(100)).is_ok());
    }

    #[test]
    fn should_reject_object_for_integer_property() {
        assert_eq!(
            brightness().validate(&json!({})),
            Err(ValidationError::InvalidValue)
        );
    }

    #[test]
    fn should_reject_value_out_of_bounds() {
        assert!(brightness().validate(&json!(-1)).is_err());
        assert!(brightness().validate(&json!(101)).is_err());
    }

    #[test]
    fn should_treat_whole_float_as_integer() {
        assert!(brightness().validate(&json!(50.0)).is_ok());
        assert!(brightness().validate(&json!(50.5)).is_err());
    }

    #[test]
    fn should_reject_tiny_fraction_for_integer_type() {
        let meta = PropertyMetadata::from_value(json!({"type": "integer"})).unwrap();
        assert!(meta.validate(&json!(1e-17)).is_err());
        assert!(meta.validate(&json!(0.5e-16)).is_err());
        assert!(meta.validate(&json!(0.0)).is_ok());
    }

    #[test]
    fn should_accept_any_number_for_number_type() {
        let meta = PropertyMetadata::from_value(json!({"type": "number"})).unwrap();
        assert!(meta.validate(&json!(21.5)).is_ok());
        assert!(meta.validate(&json!("21.5")).is_err());
    }

    #[test]
    fn should_enforce_enum_membership() {
        let meta = PropertyMetadata::from_value(json!({
            "type": "string",
            "enum": ["auto", "heat", "cool"]
        }))
        .unwrap();
        assert!(meta.validate(&json!("heat")).is_ok());
        assert!(meta.validate(&json!("dry")).is_err());
    }

    #[test]
    fn should_accept_anything_without_constraints() {
        let meta = PropertyMetadata::default();
        assert!(meta.validate(&json!(null)).is_ok());
        assert!(meta.validate(&json!([1, 2])).is_ok());
    }

    #[test]
    fn should_ignore_unknown_type_name() {
        let meta = PropertyMetadata::from_value(json!({"type": "color"})).unwrap();
        assert_eq!(meta.value_type(), None);
        assert!(meta.validate(&json!("#ff0000")).is_ok());
    }

    #[test]
    fn should_reject_non_object_metadata() {
        assert_eq!(
            PropertyMetadata::from_value(json!([1])),
            Err(ValidationError::InvalidMetadata)
        );
    }

    #[test]
    fn should_report_read_only_flag() {
        let meta = PropertyMetadata::from_value(json!({"readOnly": true})).unwrap();
        assert!(meta.is_read_only());
        assert!(!brightness().is_read_only());
    }
}
