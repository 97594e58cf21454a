//! Notifier — the outbound contract used to fan out committed changes.
//!
//! The core decides *when* a notification is due (after a mutation has been
//! committed and the Thing's lock released). How it reaches subscribers is
//! up to the implementation. Calls are fire-and-forget.

use serde_json::Value;

/// Receives change notifications for one or more Things.
pub trait Notifier: Send + Sync {
    /// A property now holds `value`.
    fn on_property_changed(&self, thing_id: &str, name: &str, value: &Value);

    /// An action changed status. `payload` is the action description.
    fn on_action_status_changed(&self, thing_id: &str, payload: &Value);

    /// An event was emitted. `payload` is the event description.
    fn on_event(&self, thing_id: &str, name: &str, payload: &Value);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::Notifier;

    /// One recorded notification.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Property(String, String, Value),
        Action(String, Value),
        Event(String, String, Value),
    }

    /// Notifier that records every call, for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub calls: Mutex<Vec<Recorded>>,
    }

    impl RecordingNotifier {
        pub fn recorded(&self) -> Vec<Recorded> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn on_property_changed(&self, thing_id: &str, name: &str, value: &Value) {
            self.calls.lock().unwrap().push(Recorded::Property(
                thing_id.to_owned(),
                name.to_owned(),
                value.clone(),
            ));
        }

        fn on_action_status_changed(&self, thing_id: &str, payload: &Value) {
            self.calls
                .lock()
                .unwrap()
                .push(Recorded::Action(thing_id.to_owned(), payload.clone()));
        }

        fn on_event(&self, thing_id: &str, name: &str, payload: &Value) {
            self.calls.lock().unwrap().push(Recorded::Event(
                thing_id.to_owned(),
                name.to_owned(),
                payload.clone(),
            ));
        }
    }
}
