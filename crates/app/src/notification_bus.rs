//! In-process notification bus backed by a tokio broadcast channel.
//!
//! The bus is the [`Notifier`] Things are given. Every committed change is
//! published as a [`ThingNotification`]; transports subscribe and render
//! them with [`ThingNotification::to_message`].

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use webthing_domain::Notifier;

/// What changed.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// A property now holds `value`.
    PropertyStatus { name: String, value: Value },
    /// An action changed status; carries its action description.
    ActionStatus(Value),
    /// An event was emitted; carries its event description.
    Event { name: String, description: Value },
}

/// One change on one Thing.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingNotification {
    pub thing_id: String,
    pub kind: NotificationKind,
}

impl ThingNotification {
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self.kind {
            NotificationKind::PropertyStatus { .. } => "propertyStatus",
            NotificationKind::ActionStatus(_) => "actionStatus",
            NotificationKind::Event { .. } => "event",
        }
    }

    /// Render the subscriber wire message, `{"messageType": .., "data": ..}`.
    #[must_use]
    pub fn to_message(&self) -> Value {
        let data = match &self.kind {
            NotificationKind::PropertyStatus { name, value } => {
                let mut data = Map::new();
                data.insert(name.clone(), value.clone());
                Value::Object(data)
            }
            NotificationKind::ActionStatus(description) => description.clone(),
            NotificationKind::Event { description, .. } => description.clone(),
        };
        json!({"messageType": self.message_type(), "data": data})
    }
}

/// Which notifications a subscriber wants.
///
/// Property and action updates pass for every selected Thing. Events only
/// pass when no event names were listed, or when the event's name was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    thing_id: Option<String>,
    events: Option<BTreeSet<String>>,
}

impl NotificationFilter {
    /// Let everything through.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one Thing.
    #[must_use]
    pub fn thing(mut self, thing_id: impl Into<String>) -> Self {
        self.thing_id = Some(thing_id.into());
        self
    }

    /// Subscribe to an event by name. Once any name is given, other events
    /// are filtered out.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.events
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
        self
    }

    #[must_use]
    pub fn matches(&self, notification: &ThingNotification) -> bool {
        if self
            .thing_id
            .as_ref()
            .is_some_and(|id| *id != notification.thing_id)
        {
            return false;
        }
        match (&notification.kind, &self.events) {
            (NotificationKind::Event { name, .. }, Some(events)) => events.contains(name),
            _ => true,
        }
    }
}

/// Notification fan-out over a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers (the
/// notification is simply dropped). Slow subscribers lose the oldest
/// notifications once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<ThingNotification>,
}

impl NotificationBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`broadcast::channel`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every notification published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ThingNotification> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribe as a stream of notifications matching `filter`.
    ///
    /// Lagged notifications are skipped with a warning.
    pub fn stream(
        &self,
        filter: NotificationFilter,
    ) -> impl Stream<Item = ThingNotification> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |result| match result {
            Ok(notification) if filter.matches(&notification) => Some(notification),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification subscriber lagged, some updates were dropped");
                None
            }
        })
    }

    fn publish(&self, notification: ThingNotification) {
        tracing::trace!(
            thing_id = %notification.thing_id,
            message_type = notification.message_type(),
            "publishing notification"
        );
        // send fails only when there are zero receivers, which is fine.
        let _ = self.sender.send(notification);
    }
}

impl Notifier for NotificationBus {
    fn on_property_changed(&self, thing_id: &str, name: &str, value: &Value) {
        self.publish(ThingNotification {
            thing_id: thing_id.to_owned(),
            kind: NotificationKind::PropertyStatus {
                name: name.to_owned(),
                value: value.clone(),
            },
        });
    }

    fn on_action_status_changed(&self, thing_id: &str, payload: &Value) {
        self.publish(ThingNotification {
            thing_id: thing_id.to_owned(),
            kind: NotificationKind::ActionStatus(payload.clone()),
        });
    }

    fn on_event(&self, thing_id: &str, name: &str, payload: &Value) {
        self.publish(ThingNotification {
            thing_id: thing_id.to_owned(),
            kind: NotificationKind::Event {
                name: name.to_owned(),
                description: payload.clone(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use webthing_domain::{Event, Property, Thing, ThingHandle};

    fn lamp(bus: &Arc<NotificationBus>, id: &str) -> ThingHandle {
        let notifier: Arc<dyn Notifier> = bus.clone();
        let mut thing = Thing::builder()
            .id(id)
            .title("My Lamp")
            .notifier(notifier)
            .build()
            .unwrap();
        thing.add_property(
            Property::builder()
                .name("brightness")
                .value(json!(50))
                .metadata(json!({"type": "integer"}))
                .build()
                .unwrap(),
        );
        thing
            .add_available_event("overheated", json!({"type": "number"}))
            .unwrap();
        thing
            .add_available_event("motion", json!({}))
            .unwrap();
        ThingHandle::new(thing)
    }

    #[tokio::test]
    async fn should_deliver_property_status_to_subscriber() {
        let bus = Arc::new(NotificationBus::new(16));
        let mut rx = bus.subscribe();
        let thing = lamp(&bus, "urn:dev:ops:my-lamp-1234");

        thing.set_property("brightness", json!(75)).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.thing_id, "urn:dev:ops:my-lamp-1234");
        assert_eq!(
            received.to_message(),
            json!({"messageType": "propertyStatus", "data": {"brightness": 75}})
        );
    }

    #[tokio::test]
    async fn should_deliver_to_multiple_subscribers() {
        let bus = Arc::new(NotificationBus::new(16));
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let thing = lamp(&bus, "urn:dev:ops:my-lamp-1234");

        thing.add_event(Event::new("overheated", Some(json!(123))));

        let r1 = rx1.recv().await.unwrap();
        let r2 = rx2.recv().await.unwrap();
        assert_eq!(r1, r2);
        assert_eq!(r1.message_type(), "event");
        assert_eq!(r1.to_message()["data"]["overheated"]["data"], json!(123));
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = Arc::new(NotificationBus::new(16));
        let thing = lamp(&bus, "urn:dev:ops:my-lamp-1234");
        assert_eq!(bus.subscriber_count(), 0);
        assert!(thing.set_property("brightness", json!(10)).is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_notifications_published_before_subscription() {
        let bus = Arc::new(NotificationBus::new(16));
        let thing = lamp(&bus, "urn:dev:ops:my-lamp-1234");
        thing.set_property("brightness", json!(10)).unwrap();

        let mut rx = bus.subscribe();
        thing.set_property("brightness", json!(20)).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(
            received.kind,
            NotificationKind::PropertyStatus {
                name: "brightness".to_owned(),
                value: json!(20)
            }
        );
    }

    #[tokio::test]
    async fn should_filter_stream_by_thing_and_event_name() {
        let bus = Arc::new(NotificationBus::new(16));
        let kitchen = lamp(&bus, "urn:dev:ops:kitchen");
        let hall = lamp(&bus, "urn:dev:ops:hall");
        let mut stream = Box::pin(
            bus.stream(
                NotificationFilter::all()
                    .thing("urn:dev:ops:kitchen")
                    .event("overheated"),
            ),
        );

        hall.set_property("brightness", json!(1)).unwrap();
        kitchen.add_event(Event::new("motion", None));
        kitchen.add_event(Event::new("overheated", Some(json!(90))));
        kitchen.set_property("brightness", json!(2)).unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first.message_type(), "event");
        assert_eq!(first.to_message()["data"]["overheated"]["data"], json!(90));
        let second = stream.next().await.unwrap();
        assert_eq!(second.message_type(), "propertyStatus");
        assert_eq!(second.thing_id, "urn:dev:ops:kitchen");
    }

    #[test]
    fn should_render_action_status_message() {
        let notification = ThingNotification {
            thing_id: "urn:dev:ops:my-lamp-1234".to_owned(),
            kind: NotificationKind::ActionStatus(
                json!({"fadeoff": {"href": "/actions/fadeoff/4353bd33-8e22-4c61-a102-e06113015076"}}),
            ),
        };
        assert_eq!(
            serde_json::to_string(&notification.to_message()).unwrap(),
            r#"{"data":{"fadeoff":{"href":"/actions/fadeoff/4353bd33-8e22-4c61-a102-e06113015076"}},"messageType":"actionStatus"}"#
        );
    }

    #[test]
    fn should_pass_every_event_without_event_subscriptions() {
        let filter = NotificationFilter::all();
        let notification = ThingNotification {
            thing_id: "a".to_owned(),
            kind: NotificationKind::Event {
                name: "motion".to_owned(),
                description: json!({}),
            },
        };
        assert!(filter.matches(&notification));
        assert!(!NotificationFilter::all().event("overheated").matches(&notification));
        assert!(!NotificationFilter::all().thing("b").matches(&notification));
    }
}
