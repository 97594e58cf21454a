//! Action runner — accepts action requests and dispatches their work.
//!
//! A request is acknowledged synchronously: the action is generated, added
//! to the Thing and started, so its status is observable as `pending` by
//! the time [`ActionRunner::request`] returns. The perform callback then
//! runs on Tokio's blocking pool, never on the caller's thread and never
//! under the Thing's lock.

use serde_json::Value;
use tokio::task::JoinHandle;

use webthing_domain::error::WebThingError;
use webthing_domain::{ActionHandle, ThingHandle};

use crate::ports::ActionGenerator;

/// Why an action request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionRequestError {
    /// The generator declined to create an action for this name.
    #[error("Invalid action request")]
    Declined(String),

    #[error(transparent)]
    Thing(#[from] WebThingError),
}

/// An accepted request: the action and the worker performing it.
#[derive(Debug)]
pub struct DispatchedAction {
    pub action: ActionHandle,
    pub worker: JoinHandle<()>,
}

/// Turns action requests into performed actions.
pub struct ActionRunner<G> {
    generator: G,
}

impl<G: ActionGenerator> ActionRunner<G> {
    /// Create a runner backed by the given generator.
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Accept an action request: generate, add, start, then dispatch
    /// `perform` to the blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ActionRequestError::Declined`] when the generator returns `None`
    /// - [`ActionRequestError::Thing`] when the Thing refuses the action
    ///   (undeclared name, invalid input)
    #[tracing::instrument(skip(self, thing, input), fields(thing_id = %thing.id()))]
    pub fn request(
        &self,
        thing: &ThingHandle,
        name: &str,
        input: Option<Value>,
    ) -> Result<DispatchedAction, ActionRequestError> {
        let Some(action) = self.generator.generate(thing, name, input) else {
            tracing::warn!("action request declined by generator");
            return Err(ActionRequestError::Declined(name.to_owned()));
        };
        let action = ActionHandle::new(action);

        if let Err(err) = thing.add_action(action.clone()) {
            tracing::warn!(%err, "action request rejected");
            return Err(err.into());
        }
        action.start();

        let id = action.id();
        tracing::debug!(action_id = %id, "action accepted, dispatching perform");

        let performer = action.clone();
        let worker = tokio::task::spawn_blocking(move || match performer.perform() {
            Ok(true) => tracing::debug!(action_id = %id, "action performed"),
            Ok(false) => tracing::debug!(action_id = %id, "action no longer performable"),
            Err(err) => tracing::warn!(action_id = %id, %err, "action could not be performed"),
        });

        Ok(DispatchedAction { action, worker })
    }

    /// Cancel an action instance. `false` when absent or already terminal.
    ///
    /// The cancel callback runs on the calling thread.
    pub fn cancel(&self, thing: &ThingHandle, name: &str, id: &str) -> bool {
        let cancelled = thing.cancel_action(name, id);
        tracing::debug!(name, id, cancelled, "action cancel requested");
        cancelled
    }

    /// Cancel, then remove an action instance. `false` when absent.
    pub fn remove(&self, thing: &ThingHandle, name: &str, id: &str) -> bool {
        let removed = thing.remove_action(name, id);
        tracing::debug!(name, id, removed, "action removal requested");
        removed
    }
}
