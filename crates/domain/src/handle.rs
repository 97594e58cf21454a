//! Shared-access handles guarding Things and Actions.
//!
//! Every [`Thing`] lives behind a [`ThingHandle`] and every [`Action`]
//! behind an [`ActionHandle`], each with its own reader/writer lock. Many
//! readers may hold a guard at once; a writer is exclusive. Guards release
//! on drop, on every exit path.
//!
//! The mutating methods on the handles take the lock for the shortest span
//! that commits the change, release it, and only then notify. Lock order is
//! Thing before Action: code holding an Action guard must not lock its Thing.
//! Poisoned locks are recovered; a panicking callback does not wedge a Thing.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::Value;

use crate::action::{Action, ActionStatus};
use crate::error::WebThingError;
use crate::event::Event;
use crate::notifier::Notifier;
use crate::thing::Thing;

/// Shared ownership of a [`Thing`] behind a reader/writer lock.
#[derive(Clone)]
pub struct ThingHandle {
    inner: Arc<RwLock<Thing>>,
}

impl fmt::Debug for ThingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Ok(thing) => f.debug_tuple("ThingHandle").field(&thing.id()).finish(),
            Err(_) => f.debug_tuple("ThingHandle").field(&"<locked>").finish(),
        }
    }
}

/// Snapshot of what a committed change must report once the lock is gone.
struct Outbox {
    notifier: Option<Arc<dyn Notifier>>,
    thing_id: String,
}

impl Outbox {
    fn capture(thing: &Thing) -> Self {
        Self {
            notifier: thing.notifier(),
            thing_id: thing.id().to_owned(),
        }
    }

    fn property(&self, name: &str, value: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_property_changed(&self.thing_id, name, value);
        }
    }

    fn action(&self, payload: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_action_status_changed(&self.thing_id, payload);
        }
    }

    fn event(&self, name: &str, payload: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_event(&self.thing_id, name, payload);
        }
    }
}

impl ThingHandle {
    #[must_use]
    pub fn new(thing: Thing) -> Self {
        Self {
            inner: Arc::new(RwLock::new(thing)),
        }
    }

    /// Acquire shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, Thing> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire exclusive write access.
    ///
    /// Operations performed through this guard do not notify; use the
    /// handle methods or the `*_notify` methods after dropping it.
    pub fn write(&self) -> RwLockWriteGuard<'_, Thing> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-owning reference, as stored in actions.
    #[must_use]
    pub fn downgrade(&self) -> WeakThingHandle {
        WeakThingHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles guard the same Thing.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.read().id().to_owned()
    }

    /// Thing Description, taken under a read guard.
    #[must_use]
    pub fn description(&self) -> Value {
        self.read().as_thing_description()
    }

    /// External property write, then a `propertyStatus` notification.
    ///
    /// Returns the committed value, which is the forwarder's echo when one
    /// is attached. The forwarder runs under the write guard.
    ///
    /// # Errors
    ///
    /// See [`Thing::set_property`].
    pub fn set_property(&self, name: &str, value: Value) -> Result<Value, WebThingError> {
        self.commit_property(name, |thing| thing.set_property(name, value))
    }

    /// Internal property write (no forwarder), then a notification.
    ///
    /// This is how device logic records observed state.
    ///
    /// # Errors
    ///
    /// See [`Thing::set_cached_property`].
    pub fn update_property(&self, name: &str, value: Value) -> Result<Value, WebThingError> {
        self.commit_property(name, |thing| thing.set_cached_property(name, value))
    }

    fn commit_property<F>(&self, name: &str, apply: F) -> Result<Value, WebThingError>
    where
        F: FnOnce(&mut Thing) -> Result<(), WebThingError>,
    {
        let (outbox, committed) = {
            let mut thing = self.write();
            apply(&mut thing)?;
            let committed = thing.get_property(name).unwrap_or(Value::Null);
            (Outbox::capture(&thing), committed)
        };
        outbox.property(name, &committed);
        Ok(committed)
    }

    /// Append an action instance, then report it in the `created` status.
    ///
    /// # Errors
    ///
    /// See [`Thing::add_action`].
    pub fn add_action(&self, action: ActionHandle) -> Result<(), WebThingError> {
        let outbox = {
            let mut thing = self.write();
            thing.add_action(action.clone())?;
            Outbox::capture(&thing)
        };
        outbox.action(&action.description());
        Ok(())
    }

    #[must_use]
    pub fn get_action(&self, name: &str, id: &str) -> Option<ActionHandle> {
        self.read().get_action(name, id)
    }

    /// Drive `created → pending`. `false` when absent or not applicable.
    pub fn start_action(&self, name: &str, id: &str) -> bool {
        self.get_action(name, id)
            .is_some_and(|action| action.start())
    }

    /// Drive `pending → completed`. `false` when absent or not applicable.
    pub fn finish_action(&self, name: &str, id: &str) -> bool {
        self.get_action(name, id)
            .is_some_and(|action| action.finish())
    }

    /// Cancel the action, running its cancel callback with no lock held.
    pub fn cancel_action(&self, name: &str, id: &str) -> bool {
        self.get_action(name, id)
            .is_some_and(|action| action.cancel())
    }

    /// Cancel, then remove an action instance. `true` iff it was removed.
    pub fn remove_action(&self, name: &str, id: &str) -> bool {
        let Some(action) = self.get_action(name, id) else {
            return false;
        };
        action.cancel();
        self.write().remove_action(name, id)
    }

    /// Append an event to the log, then notify subscribers of it.
    pub fn add_event(&self, event: Event) {
        let payload = event.as_event_description();
        let name = event.name().to_owned();
        let outbox = {
            let mut thing = self.write();
            thing.add_event(event);
            Outbox::capture(&thing)
        };
        outbox.event(&name, &payload);
    }
}

/// Non-owning reference to a [`Thing`]; see [`ThingHandle::downgrade`].
#[derive(Clone, Default)]
pub struct WeakThingHandle {
    inner: Weak<RwLock<Thing>>,
}

impl fmt::Debug for WeakThingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakThingHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakThingHandle {
    /// The Thing, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ThingHandle> {
        self.inner.upgrade().map(|inner| ThingHandle { inner })
    }
}

/// Shared ownership of an [`Action`] behind its own reader/writer lock.
///
/// The lifecycle methods run callbacks and notifications after releasing
/// the action's lock. They reach the owning Thing through the action's
/// back-reference, so they must not be called while holding that Thing's
/// write guard.
#[derive(Clone)]
pub struct ActionHandle {
    inner: Arc<RwLock<Action>>,
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Ok(action) => fmt::Debug::fmt(&*action, f),
            Err(_) => f.debug_tuple("ActionHandle").field(&"<locked>").finish(),
        }
    }
}

impl From<Action> for ActionHandle {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

impl ActionHandle {
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            inner: Arc::new(RwLock::new(action)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Action> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Action> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.read().id().to_owned()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.read().name().to_owned()
    }

    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.read().status()
    }

    #[must_use]
    pub fn description(&self) -> Value {
        self.read().as_action_description()
    }

    /// `created → pending`, then an `actionStatus` notification.
    pub fn start(&self) -> bool {
        let started = self.write().start();
        if started {
            self.notify_status();
        }
        started
    }

    /// Run the perform callback, at most once per action.
    ///
    /// Blocks for as long as the callback runs; no lock is held meanwhile.
    /// Returns `Ok(false)` when there was nothing to perform.
    ///
    /// # Errors
    ///
    /// Returns [`WebThingError::ThingUnavailable`] when the owning Thing has
    /// been dropped.
    pub fn perform(&self) -> Result<bool, WebThingError> {
        let invocation = self.write().perform();
        match invocation {
            Some(invocation) => invocation.run().map(|()| true),
            None => Ok(false),
        }
    }

    /// `created | pending → cancelled`: runs the cancel callback once, then
    /// notifies. `false` when the action was already terminal.
    ///
    /// Returns `true` whenever the status changed. If the owning Thing has
    /// been dropped, the action is still cancelled but neither the callback
    /// nor the notification runs.
    pub fn cancel(&self) -> bool {
        let invocation = self.write().cancel();
        let Some(invocation) = invocation else {
            return false;
        };
        // A dropped Thing only means there is nobody left to tell.
        if invocation.run().is_ok() {
            self.notify_status();
        }
        true
    }

    /// `pending → completed`, then a notification.
    pub fn finish(&self) -> bool {
        let finished = self.write().finish();
        if finished {
            self.notify_status();
        }
        finished
    }

    fn notify_status(&self) {
        let (thing, payload) = {
            let action = self.read();
            (action.thing_ref().upgrade(), action.as_action_description())
        };
        let Some(thing) = thing else {
            return;
        };
        let outbox = Outbox::capture(&thing.read());
        outbox.action(&payload);
    }
}
