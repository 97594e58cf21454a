//! Background property updates — periodic device reads.
//!
//! Device logic that polls hardware runs as a Tokio task. Each tick reads a
//! fresh value and commits it through the cached write path, so the
//! forwarder is never called and subscribers are notified.

use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use webthing_domain::ThingHandle;

/// Produces the next observed value of a property.
pub trait ValueSource: Send + 'static {
    fn next_value(&mut self) -> Value;
}

impl<F> ValueSource for F
where
    F: FnMut() -> Value + Send + 'static,
{
    fn next_value(&mut self) -> Value {
        self()
    }
}

/// Spawn a task committing `source`'s readings to property `name` every
/// `period`, starting one period from now.
///
/// The task only holds a weak reference: it stops on its own once the Thing
/// is dropped, or when the returned handle is aborted. A reading the
/// property rejects is logged and skipped.
///
/// Must be called from within a Tokio runtime.
///
/// # Panics
///
/// Panics if `period` is zero, like [`tokio::time::interval`].
pub fn spawn_property_updater<S: ValueSource>(
    thing: &ThingHandle,
    name: impl Into<String>,
    period: Duration,
    mut source: S,
) -> JoinHandle<()> {
    let weak = thing.downgrade();
    let name = name.into();
    let thing_id = thing.id();

    tracing::info!(%thing_id, property = %name, ?period, "property updater started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // interval fires immediately once; the first reading is one period out.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(thing) = weak.upgrade() else {
                tracing::debug!(%thing_id, property = %name, "thing dropped, updater stopping");
                break;
            };
            let value = source.next_value();
            if let Err(err) = thing.update_property(&name, value) {
                tracing::warn!(%thing_id, property = %name, %err, "device reading rejected");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::broadcast;
    use webthing_domain::{Notifier, Property, Thing};

    use super::*;
    use crate::notification_bus::{NotificationBus, NotificationKind, ThingNotification};

    fn sensor(bus: &Arc<NotificationBus>) -> ThingHandle {
        let notifier: Arc<dyn Notifier> = bus.clone();
        let mut thing = Thing::builder()
            .id("urn:dev:ops:my-humidity-sensor-1234")
            .title("My Humidity Sensor")
            .capabilities(["MultiLevelSensor"])
            .notifier(notifier)
            .build()
            .unwrap();
        thing.add_property(
            Property::builder()
                .name("level")
                .value(json!(0.0))
                .metadata(json!({
                    "type": "number",
                    "minimum": 0,
                    "maximum": 100,
                    "readOnly": true
                }))
                .build()
                .unwrap(),
        );
        ThingHandle::new(thing)
    }

    async fn next_level(rx: &mut broadcast::Receiver<ThingNotification>) -> Value {
        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match notification.kind {
            NotificationKind::PropertyStatus { value, .. } => value,
            other => panic!("unexpected notification {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_commit_readings_to_read_only_property() {
        let bus = Arc::new(NotificationBus::new(16));
        let mut rx = bus.subscribe();
        let thing = sensor(&bus);
        let mut reading = 10.0;
        let updater = spawn_property_updater(&thing, "level", Duration::from_millis(5), move || {
            reading += 1.5;
            json!(reading)
        });

        assert_eq!(next_level(&mut rx).await, json!(11.5));
        assert_eq!(next_level(&mut rx).await, json!(13.0));
        updater.abort();

        let level = thing.read().get_property("level").unwrap();
        assert!(level.as_f64().unwrap() >= 13.0);
    }

    #[tokio::test]
    async fn should_skip_rejected_readings() {
        let bus = Arc::new(NotificationBus::new(16));
        let mut rx = bus.subscribe();
        let thing = sensor(&bus);
        let mut readings = vec![json!(42.0), json!(250.0)].into_iter();
        let updater = spawn_property_updater(&thing, "level", Duration::from_millis(5), move || {
            readings.next().unwrap_or(json!(42.0))
        });

        assert_eq!(next_level(&mut rx).await, json!(42.0));
        assert_eq!(next_level(&mut rx).await, json!(42.0));
        updater.abort();
    }

    #[tokio::test]
    async fn should_stop_when_thing_dropped() {
        let bus = Arc::new(NotificationBus::new(16));
        let thing = sensor(&bus);
        let updater =
            spawn_property_updater(&thing, "level", Duration::from_millis(5), || json!(1.0));

        drop(thing);

        tokio::time::timeout(Duration::from_secs(2), updater)
            .await
            .unwrap()
            .unwrap();
    }
}
