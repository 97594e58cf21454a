//! Event — an immutable record of something a Thing emitted.
//!
//! Events are stamped at construction and moved into the Thing's event log
//! on append. Nothing about an event changes afterwards.

use serde_json::{Map, Value};

use crate::time::{self, Timestamp};

/// A timestamped occurrence emitted by a Thing.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    data: Option<Value>,
    time: Timestamp,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Option<Value>) -> Self {
        Self::at(name, data, time::now())
    }

    /// Create an event with an explicit timestamp.
    #[must_use]
    pub fn at(name: impl Into<String>, data: Option<Value>, time: Timestamp) -> Self {
        Self {
            name: name.into(),
            data,
            time,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Describe the event as `{name: {data?, timestamp}}`.
    #[must_use]
    pub fn as_event_description(&self) -> Value {
        let mut inner = Map::new();
        if let Some(data) = &self.data {
            inner.insert("data".to_owned(), data.clone());
        }
        inner.insert("timestamp".to_owned(), Value::String(time::format(&self.time)));

        let mut description = Map::new();
        description.insert(self.name.clone(), Value::Object(inner));
        Value::Object(description)
    }
}
