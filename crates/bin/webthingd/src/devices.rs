//! Devices served by the daemon: the built-in lamp and humidity sensor, and
//! Things assembled from configuration.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use webthing_app::ports::ActionGenerator;
use webthing_domain::error::{ForwarderError, ValidationError};
use webthing_domain::{Action, Event, Notifier, Property, Thing, ThingHandle};

use crate::config::ThingConfig;

/// The dimmable lamp: `on`, `brightness`, a `fade` action and an
/// `overheated` event.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any fixed definition is rejected.
pub fn lamp(notifier: Arc<dyn Notifier>) -> Result<ThingHandle, ValidationError> {
    let mut thing = Thing::builder()
        .id("urn:dev:ops:my-lamp-1234")
        .title("My Lamp")
        .capabilities(["OnOffSwitch", "Light"])
        .description("A web connected lamp")
        .notifier(notifier)
        .build()?;

    thing.add_property(
        Property::builder()
            .name("on")
            .value(json!(true))
            .metadata(json!({
                "@type": "OnOffProperty",
                "title": "On/Off",
                "type": "boolean",
                "description": "Whether the lamp is turned on"
            }))
            .forwarder(|value: Value| -> Result<Value, ForwarderError> {
                tracing::info!(%value, "lamp switched");
                Ok(value)
            })
            .build()?,
    );
    thing.add_property(
        Property::builder()
            .name("brightness")
            .value(json!(50))
            .metadata(json!({
                "@type": "BrightnessProperty",
                "title": "Brightness",
                "type": "integer",
                "description": "The level of light from 0-100",
                "minimum": 0,
                "maximum": 100,
                "unit": "percent"
            }))
            .build()?,
    );
    thing.add_available_action(
        "fade",
        json!({
            "title": "Fade",
            "description": "Fade the lamp to a given level",
            "input": {
                "type": "object",
                "required": ["brightness", "duration"],
                "properties": {
                    "brightness": {"type": "integer", "minimum": 0, "maximum": 100},
                    "duration": {"type": "integer", "minimum": 1}
                }
            }
        }),
    )?;
    thing.add_available_event(
        "overheated",
        json!({
            "description": "The lamp has exceeded its safe operating temperature",
            "type": "number",
            "unit": "degree celsius"
        }),
    )?;

    Ok(ThingHandle::new(thing))
}

/// The humidity sensor: a single read-only `level` property.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any fixed definition is rejected.
pub fn humidity_sensor(notifier: Arc<dyn Notifier>) -> Result<ThingHandle, ValidationError> {
    let mut thing = Thing::builder()
        .id("urn:dev:ops:my-humidity-sensor-1234")
        .title("My Humidity Sensor")
        .capabilities(["MultiLevelSensor"])
        .description("A web connected humidity sensor")
        .notifier(notifier)
        .build()?;

    thing.add_property(
        Property::builder()
            .name("level")
            .value(json!(0.0))
            .metadata(json!({
                "@type": "LevelProperty",
                "title": "Humidity",
                "type": "number",
                "description": "The current humidity in %",
                "minimum": 0,
                "maximum": 100,
                "unit": "percent",
                "readOnly": true
            }))
            .build()?,
    );

    Ok(ThingHandle::new(thing))
}

/// A slowly drifting humidity reading in `[20, 80]`.
pub fn humidity_readings() -> impl FnMut() -> Value + Send + 'static {
    let mut step: u32 = 0;
    move || {
        step = step.wrapping_add(1);
        let phase = f64::from(step % 360).to_radians();
        let level = (50.0 + 30.0 * phase.sin()) * 10.0;
        json!(level.round() / 10.0)
    }
}

/// Build a Thing from its configuration.
///
/// # Errors
///
/// Returns a [`ValidationError`] for an empty id or name, or metadata that
/// is not a JSON object.
pub fn from_config(
    config: &ThingConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<ThingHandle, ValidationError> {
    let mut thing = Thing::builder()
        .id(&config.id)
        .title(&config.title)
        .description(&config.description)
        .capabilities(&config.types)
        .notifier(notifier)
        .build()?;

    for property in &config.properties {
        thing.add_property(
            Property::builder()
                .name(&property.name)
                .value(property.value.clone())
                .metadata(property.metadata.clone())
                .build()?,
        );
    }
    for (name, metadata) in &config.actions {
        thing.add_available_action(name, metadata.clone())?;
    }
    for (name, metadata) in &config.events {
        thing.add_available_event(name, metadata.clone())?;
    }

    Ok(ThingHandle::new(thing))
}

/// Generates actions for every declared action name.
///
/// The lamp's `fade` waits for `duration` milliseconds, applies the target
/// brightness, reports the lamp as overheated and completes. Any other
/// declared action completes as soon as it is performed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceActions;

impl ActionGenerator for DeviceActions {
    fn generate(&self, thing: &ThingHandle, name: &str, input: Option<Value>) -> Option<Action> {
        if thing.read().available_action(name).is_none() {
            tracing::debug!(name, "no such action declared");
            return None;
        }

        let builder = Action::builder(thing).name(name).input(input.clone());
        let action = if name == "fade" {
            let input = input?;
            let brightness = input.get("brightness")?.clone();
            let duration = input.get("duration")?.as_u64()?;
            builder.perform(move |thing, name, id| {
                std::thread::sleep(Duration::from_millis(duration));
                if let Err(err) = thing.update_property("brightness", brightness.clone()) {
                    tracing::warn!(%err, "fade target rejected");
                }
                thing.add_event(Event::new("overheated", Some(json!(102))));
                thing.finish_action(name, id);
                tracing::info!(name, id, "finished action");
            })
        } else {
            builder.perform(|thing, name, id| {
                thing.finish_action(name, id);
            })
        };

        action.build().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyConfig;
    use webthing_domain::ActionStatus;

    struct Silent;

    impl Notifier for Silent {
        fn on_property_changed(&self, _: &str, _: &str, _: &Value) {}
        fn on_action_status_changed(&self, _: &str, _: &Value) {}
        fn on_event(&self, _: &str, _: &str, _: &Value) {}
    }

    fn silent() -> Arc<dyn Notifier> {
        Arc::new(Silent)
    }

    #[test]
    fn should_describe_builtin_lamp() {
        let lamp = lamp(silent()).unwrap();
        let description = lamp.description();
        assert_eq!(description["title"], json!("My Lamp"));
        assert_eq!(description["@type"], json!(["OnOffSwitch", "Light"]));
        assert_eq!(
            description["actions"]["fade"]["links"][0]["href"],
            json!("/actions/fade")
        );
        assert_eq!(lamp.read().get_property("brightness"), Some(json!(50)));
    }

    #[test]
    fn should_reject_external_write_to_humidity() {
        let sensor = humidity_sensor(silent()).unwrap();
        let err = sensor.set_property("level", json!(12.0)).unwrap_err();
        assert_eq!(err.to_string(), "Read-only property");
        assert!(sensor.update_property("level", json!(12.0)).is_ok());
    }

    #[test]
    fn should_keep_readings_in_range() {
        let mut readings = humidity_readings();
        for _ in 0..720 {
            let level = readings().as_f64().unwrap();
            assert!((20.0..=80.0).contains(&level), "{level}");
        }
    }

    #[test]
    fn should_build_thing_from_config() {
        let config = ThingConfig {
            id: "urn:dev:ops:plug".to_string(),
            title: "Plug".to_string(),
            types: vec!["SmartPlug".to_string()],
            properties: vec![PropertyConfig {
                name: "on".to_string(),
                value: json!(false),
                metadata: json!({"type": "boolean"}),
            }],
            actions: [("toggle".to_string(), json!({"title": "Toggle"}))].into(),
            ..ThingConfig::default()
        };

        let plug = from_config(&config, silent()).unwrap();

        let description = plug.description();
        assert_eq!(description["id"], json!("urn:dev:ops:plug"));
        assert_eq!(description["properties"]["on"]["type"], json!("boolean"));
        assert!(description.get("description").is_none());
        assert!(plug.read().available_action("toggle").is_some());
    }

    #[test]
    fn should_reject_config_with_non_object_metadata() {
        let config = ThingConfig {
            id: "urn:dev:ops:plug".to_string(),
            properties: vec![PropertyConfig {
                name: "on".to_string(),
                value: json!(false),
                metadata: json!("boolean"),
            }],
            ..ThingConfig::default()
        };
        assert_eq!(
            from_config(&config, silent()).unwrap_err(),
            ValidationError::InvalidMetadata
        );
    }

    #[test]
    fn should_decline_fade_without_duration() {
        let lamp = lamp(silent()).unwrap();
        assert!(
            DeviceActions
                .generate(&lamp, "fade", Some(json!({"brightness": 10})))
                .is_none()
        );
        assert!(DeviceActions.generate(&lamp, "explode", None).is_none());
    }

    #[test]
    fn should_fade_lamp_and_report_overheating() {
        let lamp = lamp(silent()).unwrap();
        let action = webthing_domain::ActionHandle::new(
            DeviceActions
                .generate(&lamp, "fade", Some(json!({"brightness": 10, "duration": 1})))
                .unwrap(),
        );
        lamp.add_action(action.clone()).unwrap();
        action.start();

        assert!(action.perform().unwrap());

        assert_eq!(action.status(), ActionStatus::Completed);
        assert_eq!(lamp.read().get_property("brightness"), Some(json!(10)));
        assert_eq!(lamp.read().events()[0].name(), "overheated");
    }
}
