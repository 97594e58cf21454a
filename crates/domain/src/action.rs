//! Action — a requested unit of work with a monotonic lifecycle.
//!
//! ```text
//!   created ──start──▶ pending ──finish──▶ completed
//!      │                  │
//!      └──────cancel──────┴──────────────▶ cancelled
//! ```
//!
//! `perform` is a separate step from `start`: a caller acknowledges the
//! request with `start` and dispatches `perform` elsewhere, so the device
//! work never blocks the request path. Terminal states absorb every further
//! transition.
//!
//! The methods here only mutate the action. Callbacks are handed back as an
//! [`Invocation`] so they can run once the action's lock has been released;
//! [`ActionHandle`](crate::handle::ActionHandle) does that for you.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ValidationError, WebThingError};
use crate::handle::{ThingHandle, WeakThingHandle};
use crate::time::{self, Timestamp};

/// Callback invoked with the owning Thing, the action name and the action id.
pub type ActionCallback = Arc<dyn Fn(ThingHandle, &str, &str) + Send + Sync>;

/// Lifecycle status of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Created,
    Pending,
    Completed,
    Cancelled,
}

impl ActionStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A callback captured under the action lock, to be run after release.
#[must_use = "the callback only runs when the invocation is run"]
pub struct Invocation {
    callback: Option<ActionCallback>,
    thing: WeakThingHandle,
    name: String,
    id: String,
}

impl Invocation {
    /// Run the captured callback, if any.
    ///
    /// # Errors
    ///
    /// Returns [`WebThingError::ThingUnavailable`] when the owning Thing has
    /// been dropped; the callback is not run in that case.
    pub fn run(self) -> Result<(), WebThingError> {
        let Some(callback) = self.callback else {
            return Ok(());
        };
        let thing = self.thing.upgrade().ok_or(WebThingError::ThingUnavailable)?;
        callback(thing, &self.name, &self.id);
        Ok(())
    }
}

/// One requested execution of a declared action.
pub struct Action {
    id: String,
    name: String,
    input: Option<Value>,
    href_prefix: String,
    status: ActionStatus,
    time_requested: Timestamp,
    time_completed: Option<Timestamp>,
    thing: WeakThingHandle,
    perform: ActionCallback,
    cancel: Option<ActionCallback>,
    performed: bool,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input", &self.input)
            .field("status", &self.status)
            .field("time_requested", &self.time_requested)
            .field("time_completed", &self.time_completed)
            .field("performed", &self.performed)
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Create a builder for an action belonging to `thing`.
    #[must_use]
    pub fn builder(thing: &ThingHandle) -> ActionBuilder {
        ActionBuilder {
            thing: thing.downgrade(),
            id: None,
            name: None,
            input: None,
            perform: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    #[must_use]
    pub fn time_requested(&self) -> Timestamp {
        self.time_requested
    }

    #[must_use]
    pub fn time_completed(&self) -> Option<Timestamp> {
        self.time_completed
    }

    /// The owning Thing, if it is still alive.
    #[must_use]
    pub fn thing(&self) -> Option<ThingHandle> {
        self.thing.upgrade()
    }

    pub(crate) fn thing_ref(&self) -> &WeakThingHandle {
        &self.thing
    }

    #[must_use]
    pub fn href_prefix(&self) -> &str {
        &self.href_prefix
    }

    pub fn set_href_prefix(&mut self, prefix: impl Into<String>) {
        self.href_prefix = prefix.into();
    }

    /// `<prefix>/actions/<name>/<id>`.
    #[must_use]
    pub fn href(&self) -> String {
        format!("{}/actions/{}/{}", self.href_prefix, self.name, self.id)
    }

    /// `created → pending`. Returns whether the status changed.
    pub fn start(&mut self) -> bool {
        if self.status != ActionStatus::Created {
            return false;
        }
        self.status = ActionStatus::Pending;
        true
    }

    /// Capture the perform callback.
    ///
    /// Yields `None` once the action has already been performed or has
    /// reached a terminal status, so the work runs at most once.
    pub fn perform(&mut self) -> Option<Invocation> {
        if self.performed || self.status.is_terminal() {
            return None;
        }
        self.performed = true;
        Some(self.invocation(Some(Arc::clone(&self.perform))))
    }

    /// `created | pending → cancelled`, capturing the cancel callback.
    ///
    /// Yields `None` when the action was already completed or cancelled.
    pub fn cancel(&mut self) -> Option<Invocation> {
        if self.status.is_terminal() {
            return None;
        }
        self.status = ActionStatus::Cancelled;
        Some(self.invocation(self.cancel.clone()))
    }

    /// `pending → completed`, stamping `time_completed`.
    /// Returns whether the status changed.
    pub fn finish(&mut self) -> bool {
        if self.status != ActionStatus::Pending {
            return false;
        }
        self.status = ActionStatus::Completed;
        self.time_completed = Some(time::now());
        true
    }

    fn invocation(&self, callback: Option<ActionCallback>) -> Invocation {
        Invocation {
            callback,
            thing: self.thing.clone(),
            name: self.name.clone(),
            id: self.id.clone(),
        }
    }

    /// Describe the action as `{name: {href, status, timeRequested, ...}}`.
    #[must_use]
    pub fn as_action_description(&self) -> Value {
        let mut inner = Map::new();
        inner.insert("href".to_owned(), Value::String(self.href()));
        inner.insert("status".to_owned(), Value::String(self.status.to_string()));
        inner.insert(
            "timeRequested".to_owned(),
            Value::String(time::format(&self.time_requested)),
        );
        if let Some(completed) = &self.time_completed {
            inner.insert(
                "timeCompleted".to_owned(),
                Value::String(time::format(completed)),
            );
        }
        if let Some(input) = &self.input {
            inner.insert("input".to_owned(), input.clone());
        }

        let mut description = Map::new();
        description.insert(self.name.clone(), Value::Object(inner));
        Value::Object(description)
    }
}

/// Step-by-step builder for [`Action`].
pub struct ActionBuilder {
    thing: WeakThingHandle,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
    perform: Option<ActionCallback>,
    cancel: Option<ActionCallback>,
}

impl ActionBuilder {
    /// Use a caller-supplied id instead of a fresh UUID.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn input(mut self, input: Option<Value>) -> Self {
        self.input = input;
        self
    }

    #[must_use]
    pub fn perform<F>(mut self, perform: F) -> Self
    where
        F: Fn(ThingHandle, &str, &str) + Send + Sync + 'static,
    {
        self.perform = Some(Arc::new(perform));
        self
    }

    #[must_use]
    pub fn cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn(ThingHandle, &str, &str) + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    /// Consume the builder, validate, and return an [`Action`] in the
    /// `created` status.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyName`] if `name` is missing or empty
    /// - [`ValidationError::EmptyId`] if an explicit id is empty
    /// - [`ValidationError::MissingPerform`] if no perform callback was given
    pub fn build(self) -> Result<Action, ValidationError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let perform = self.perform.ok_or(ValidationError::MissingPerform)?;

        Ok(Action {
            id,
            name,
            input: self.input,
            href_prefix: String::new(),
            status: ActionStatus::Created,
            time_requested: time::now(),
            time_completed: None,
            thing: self.thing,
            perform,
            cancel: self.cancel,
            performed: false,
        })
    }
}
