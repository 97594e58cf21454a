//! JSON-lines session: one request per input line, one JSON message per
//! output line.
//!
//! Requests use the Web Thing message shapes:
//!
//! ```text
//! {"messageType": "setProperty", "thing": 0, "data": {"brightness": 75}}
//! {"messageType": "requestAction", "data": {"fade": {"input": {"brightness": 10, "duration": 500}}}}
//! {"messageType": "addEventSubscription", "data": {"overheated": {}}}
//! ```
//!
//! `thing` selects a Thing by index when several are served. Failures are
//! answered with an `error` message; successful requests are answered by the
//! notifications they cause.

use serde_json::{Map, Value, json};
use webthing_app::action_runner::ActionRunner;
use webthing_app::notification_bus::{NotificationFilter, ThingNotification};
use webthing_app::ports::ActionGenerator;
use webthing_app::registry::ThingRegistry;
use webthing_domain::ThingHandle;

/// A request the session could not honour.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Parsing request failed")]
    Parse,

    #[error("Invalid message")]
    InvalidMessage,

    #[error("Unknown messageType: {0}")]
    UnknownMessageType(String),

    #[error("Thing not found")]
    ThingNotFound,

    /// A property write or action request was refused; carries its message.
    #[error("{0}")]
    Rejected(String),
}

impl SessionError {
    /// Render as an `error` message.
    #[must_use]
    pub fn to_message(&self) -> Value {
        json!({
            "messageType": "error",
            "data": {"status": "400 Bad Request", "message": self.to_string()}
        })
    }
}

/// One connected peer: its request handling and its event subscriptions.
pub struct Session<G> {
    registry: ThingRegistry,
    runner: ActionRunner<G>,
    filter: NotificationFilter,
}

impl<G: ActionGenerator> Session<G> {
    pub fn new(registry: ThingRegistry, runner: ActionRunner<G>) -> Self {
        Self {
            registry,
            runner,
            filter: NotificationFilter::all(),
        }
    }

    /// Handle one request line. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] describing the first refused part of the
    /// request; earlier parts stay applied.
    pub fn handle_line(&mut self, line: &str) -> Result<(), SessionError> {
        let request: Value = serde_json::from_str(line).map_err(|_| SessionError::Parse)?;
        let message_type = request
            .get("messageType")
            .and_then(Value::as_str)
            .ok_or(SessionError::InvalidMessage)?;
        let data = request
            .get("data")
            .and_then(Value::as_object)
            .ok_or(SessionError::InvalidMessage)?;
        let index = match request.get("thing") {
            None => None,
            Some(index) => Some(
                index
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .ok_or(SessionError::InvalidMessage)?,
            ),
        };
        let thing = self
            .registry
            .get_thing(index)
            .ok_or(SessionError::ThingNotFound)?;

        tracing::debug!(message_type, thing_id = %thing.id(), "session request");
        match message_type {
            "setProperty" => set_properties(&thing, data),
            "requestAction" => self.request_actions(&thing, data),
            "addEventSubscription" => {
                for name in data.keys() {
                    self.filter = std::mem::take(&mut self.filter).event(name);
                }
                Ok(())
            }
            other => Err(SessionError::UnknownMessageType(other.to_owned())),
        }
    }

    fn request_actions(
        &self,
        thing: &ThingHandle,
        data: &Map<String, Value>,
    ) -> Result<(), SessionError> {
        for (name, params) in data {
            let input = params.get("input").cloned();
            self.runner
                .request(thing, name, input)
                .map_err(|err| SessionError::Rejected(err.to_string()))?;
        }
        Ok(())
    }

    /// Render `notification` if this session subscribed to it.
    #[must_use]
    pub fn render(&self, notification: &ThingNotification) -> Option<Value> {
        self.filter
            .matches(notification)
            .then(|| notification.to_message())
    }
}

fn set_properties(thing: &ThingHandle, data: &Map<String, Value>) -> Result<(), SessionError> {
    for (name, value) in data {
        thing
            .set_property(name, value.clone())
            .map_err(|err| SessionError::Rejected(err.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use webthing_app::notification_bus::{NotificationBus, NotificationKind};
    use webthing_domain::{ActionStatus, Notifier};

    use super::*;
    use crate::devices::{self, DeviceActions};

    fn session(bus: &Arc<NotificationBus>) -> (Session<DeviceActions>, ThingRegistry) {
        let notifier: Arc<dyn Notifier> = bus.clone();
        let registry = ThingRegistry::Multiple {
            things: vec![
                devices::lamp(Arc::clone(&notifier)).unwrap(),
                devices::humidity_sensor(notifier).unwrap(),
            ],
            name: "LightAndTempDevice".to_owned(),
        };
        registry.mount("");
        let session = Session::new(registry.clone(), ActionRunner::new(DeviceActions));
        (session, registry)
    }

    #[tokio::test]
    async fn should_set_property_on_selected_thing() {
        let bus = Arc::new(NotificationBus::new(16));
        let mut rx = bus.subscribe();
        let (mut session, registry) = session(&bus);

        session
            .handle_line(r#"{"messageType":"setProperty","thing":0,"data":{"brightness":75}}"#)
            .unwrap();

        let lamp = registry.get_thing(Some(0)).unwrap();
        assert_eq!(lamp.read().get_property("brightness"), Some(json!(75)));
        let notification = rx.recv().await.unwrap();
        assert_eq!(
            session.render(&notification),
            Some(json!({"messageType": "propertyStatus", "data": {"brightness": 75}}))
        );
    }

    #[tokio::test]
    async fn should_answer_refused_writes_with_protocol_message() {
        let bus = Arc::new(NotificationBus::new(16));
        let (mut session, _) = session(&bus);

        let read_only = session
            .handle_line(r#"{"messageType":"setProperty","thing":1,"data":{"level":5}}"#)
            .unwrap_err();
        let out_of_range = session
            .handle_line(r#"{"messageType":"setProperty","thing":0,"data":{"brightness":101}}"#)
            .unwrap_err();
        let missing = session
            .handle_line(r#"{"messageType":"setProperty","thing":0,"data":{"color":"red"}}"#)
            .unwrap_err();

        assert_eq!(read_only, SessionError::Rejected("Read-only property".to_owned()));
        assert_eq!(
            out_of_range.to_message(),
            json!({
                "messageType": "error",
                "data": {"status": "400 Bad Request", "message": "Invalid property value"}
            })
        );
        assert_eq!(missing.to_string(), "Property not found");
    }

    #[tokio::test]
    async fn should_reject_malformed_requests() {
        let bus = Arc::new(NotificationBus::new(16));
        let (mut session, _) = session(&bus);

        assert_eq!(session.handle_line("{"), Err(SessionError::Parse));
        assert_eq!(
            session.handle_line(r#"{"data":{}}"#),
            Err(SessionError::InvalidMessage)
        );
        assert_eq!(
            session.handle_line(r#"{"messageType":"setProperty","data":{}}"#),
            Err(SessionError::ThingNotFound)
        );
        assert_eq!(
            session.handle_line(r#"{"messageType":"reboot","thing":0,"data":{}}"#),
            Err(SessionError::UnknownMessageType("reboot".to_owned()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_request_action_and_stream_its_progress() {
        let bus = Arc::new(NotificationBus::new(64));
        let mut rx = bus.subscribe();
        let (mut session, registry) = session(&bus);

        session
            .handle_line(
                r#"{"messageType":"requestAction","thing":0,"data":{"fade":{"input":{"brightness":10,"duration":1}}}}"#,
            )
            .unwrap();

        let mut completed = false;
        while !completed {
            let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let NotificationKind::ActionStatus(description) = &notification.kind {
                completed = description["fade"]["status"] == json!("completed");
            }
        }

        let lamp = registry.get_thing(Some(0)).unwrap();
        let actions = lamp.read().actions("fade").to_vec();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status(), ActionStatus::Completed);
        assert_eq!(lamp.read().get_property("brightness"), Some(json!(10)));
    }

    #[tokio::test]
    async fn should_reject_action_with_invalid_input() {
        let bus = Arc::new(NotificationBus::new(16));
        let (mut session, _) = session(&bus);

        let err = session
            .handle_line(r#"{"messageType":"requestAction","thing":0,"data":{"fade":{"input":7}}}"#)
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid action request");
    }

    #[tokio::test]
    async fn should_only_render_subscribed_events() {
        let bus = Arc::new(NotificationBus::new(16));
        let (mut session, _) = session(&bus);
        let overheated = ThingNotification {
            thing_id: "urn:dev:ops:my-lamp-1234".to_owned(),
            kind: NotificationKind::Event {
                name: "overheated".to_owned(),
                description: json!({"overheated": {"data": 102}}),
            },
        };
        let motion = ThingNotification {
            thing_id: "urn:dev:ops:my-lamp-1234".to_owned(),
            kind: NotificationKind::Event {
                name: "motion".to_owned(),
                description: json!({"motion": {}}),
            },
        };
        assert!(session.render(&motion).is_some());

        session
            .handle_line(r#"{"messageType":"addEventSubscription","thing":0,"data":{"overheated":{}}}"#)
            .unwrap();

        assert!(session.render(&motion).is_none());
        assert_eq!(
            session.render(&overheated).unwrap()["messageType"],
            json!("event")
        );
    }
}
