//! Thing — the aggregate exposing properties, actions and events.
//!
//! A [`Thing`] is a plain value: every method assumes the caller already
//! holds the appropriate access (usually through a
//! [`ThingHandle`](crate::handle::ThingHandle) guard). Methods that would
//! need to call back into user code are split so the callback can run after
//! the guard is dropped; see [`Thing::cancel_action`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::action::Invocation;
use crate::error::{NotFoundError, ValidationError, WebThingError};
use crate::event::Event;
use crate::handle::ActionHandle;
use crate::notifier::Notifier;
use crate::property::{Property, PropertyMetadata, ValueType, push_link};

/// JSON-LD context every Thing Description carries.
pub const CONTEXT: &str = "https://iot.mozilla.org/schemas";

/// A virtual representation of a device.
pub struct Thing {
    id: String,
    title: String,
    description: String,
    context: String,
    types: Vec<String>,
    href_prefix: String,
    ui_href: Option<String>,
    properties: BTreeMap<String, Property>,
    available_actions: BTreeMap<String, Map<String, Value>>,
    available_events: BTreeMap<String, Map<String, Value>>,
    actions: BTreeMap<String, Vec<ActionHandle>>,
    events: Vec<Event>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl fmt::Debug for Thing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thing")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("types", &self.types)
            .field("href_prefix", &self.href_prefix)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Thing {
    /// Create a builder for constructing a [`Thing`].
    #[must_use]
    pub fn builder() -> ThingBuilder {
        ThingBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Capability types, in insertion order.
    #[must_use]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Add a capability type; duplicates are ignored.
    pub fn add_type(&mut self, capability: impl Into<String>) {
        let capability = capability.into();
        if !self.types.contains(&capability) {
            self.types.push(capability);
        }
    }

    #[must_use]
    pub fn href_prefix(&self) -> &str {
        &self.href_prefix
    }

    /// `/` when no prefix is set, otherwise the prefix itself.
    #[must_use]
    pub fn href(&self) -> String {
        if self.href_prefix.is_empty() {
            "/".to_owned()
        } else {
            self.href_prefix.clone()
        }
    }

    /// Set the prefix and push it down to every property and action.
    pub fn set_href_prefix(&mut self, prefix: impl Into<String>) {
        self.href_prefix = prefix.into();
        for property in self.properties.values_mut() {
            property.set_href_prefix(self.href_prefix.clone());
        }
        for handle in self.actions.values().flatten() {
            handle.write().set_href_prefix(self.href_prefix.clone());
        }
    }

    #[must_use]
    pub fn ui_href(&self) -> Option<&str> {
        self.ui_href.as_deref()
    }

    pub fn set_ui_href(&mut self, href: impl Into<String>) {
        self.ui_href = Some(href.into());
    }

    /// Attach the notifier that receives this Thing's change notifications.
    pub fn set_notifier(&mut self, notifier: Option<Arc<dyn Notifier>>) {
        self.notifier = notifier;
    }

    #[must_use]
    pub fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.clone()
    }

    // -- description -------------------------------------------------------

    /// The canonical Thing Description.
    ///
    /// Keys come out sorted (`@context, @type, actions, description, events,
    /// id, links, properties, title`) since JSON objects are ordered maps.
    #[must_use]
    pub fn as_thing_description(&self) -> Value {
        let mut description = Map::new();
        description.insert("@context".to_owned(), json!(self.context));
        description.insert("@type".to_owned(), json!(self.types));
        description.insert("id".to_owned(), json!(self.id));
        description.insert("title".to_owned(), json!(self.title));
        if !self.description.is_empty() {
            description.insert("description".to_owned(), json!(self.description));
        }
        description.insert(
            "properties".to_owned(),
            Value::Object(self.get_property_descriptions()),
        );
        description.insert(
            "actions".to_owned(),
            Value::Object(self.describe_available(&self.available_actions, "actions", "action")),
        );
        description.insert(
            "events".to_owned(),
            Value::Object(self.describe_available(&self.available_events, "events", "event")),
        );

        let mut links = vec![
            json!({"href": format!("{}/properties", self.href_prefix), "rel": "properties"}),
            json!({"href": format!("{}/actions", self.href_prefix), "rel": "actions"}),
            json!({"href": format!("{}/events", self.href_prefix), "rel": "events"}),
        ];
        if let Some(ui_href) = &self.ui_href {
            links.push(json!({"href": ui_href, "mediaType": "text/html", "rel": "alternate"}));
        }
        description.insert("links".to_owned(), Value::Array(links));

        Value::Object(description)
    }

    fn describe_available(
        &self,
        available: &BTreeMap<String, Map<String, Value>>,
        segment: &str,
        rel: &str,
    ) -> Map<String, Value> {
        available
            .iter()
            .map(|(name, metadata)| {
                let mut entry = metadata.clone();
                let href = format!("{}/{segment}/{name}", self.href_prefix);
                push_link(&mut entry, json!({"href": href, "rel": rel}));
                (name.clone(), Value::Object(entry))
            })
            .collect()
    }

    // -- properties --------------------------------------------------------

    /// Insert `property`, replacing any property with the same name.
    pub fn add_property(&mut self, mut property: Property) {
        property.set_href_prefix(self.href_prefix.clone());
        self.properties.insert(property.name().to_owned(), property);
    }

    /// Remove a property; no-op if absent.
    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Direct access to a property, for collaborators such as device loops.
    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn find_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name).map(Property::get_value)
    }

    /// Map of every property name to its current value.
    #[must_use]
    pub fn get_properties(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(name, property)| (name.clone(), property.get_value()))
            .collect()
    }

    #[must_use]
    pub fn get_property_descriptions(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(name, property)| (name.clone(), property.as_property_description()))
            .collect()
    }

    /// External write to a property (validation + forwarder).
    ///
    /// # Errors
    ///
    /// - [`WebThingError::NotFound`] (`"Property not found"`) if absent
    /// - any error from [`Property::set_value`]
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<(), WebThingError> {
        self.find_property_mut(name)
            .ok_or_else(|| NotFoundError::property(name))?
            .set_value(value)
    }

    /// Internal write to a property, bypassing the forwarder.
    ///
    /// # Errors
    ///
    /// - [`WebThingError::NotFound`] if absent
    /// - [`WebThingError::Validation`] if the value fails validation
    pub fn set_cached_property(&mut self, name: &str, value: Value) -> Result<(), WebThingError> {
        self.find_property_mut(name)
            .ok_or_else(|| NotFoundError::property(name))?
            .set_cached_value(value)?;
        Ok(())
    }

    // -- actions -----------------------------------------------------------

    /// Declare an action kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMetadata`] unless `metadata` is an
    /// object (or `null`, meaning no metadata).
    pub fn add_available_action(
        &mut self,
        name: impl Into<String>,
        metadata: Value,
    ) -> Result<(), ValidationError> {
        let metadata = PropertyMetadata::from_value(metadata)?.into_map();
        let name = name.into();
        self.actions.entry(name.clone()).or_default();
        self.available_actions.insert(name, metadata);
        Ok(())
    }

    #[must_use]
    pub fn available_action(&self, name: &str) -> Option<&Map<String, Value>> {
        self.available_actions.get(name)
    }

    /// Append an action instance.
    ///
    /// The action's input is checked against the declared `input` metadata
    /// (type, bounds and enum only). Ids are unique per action name.
    ///
    /// # Errors
    ///
    /// - [`WebThingError::UndeclaredAction`] if the name was never declared
    /// - [`WebThingError::DuplicateAction`] if an instance with the same id exists
    /// - [`WebThingError::InvalidActionInput`] if the input is rejected
    pub fn add_action(&mut self, action: ActionHandle) -> Result<(), WebThingError> {
        let (name, id) = {
            let guard = action.read();
            (guard.name().to_owned(), guard.id().to_owned())
        };
        let metadata = self
            .available_actions
            .get(&name)
            .ok_or_else(|| WebThingError::UndeclaredAction(name.clone()))?;
        if self.get_action(&name, &id).is_some() {
            return Err(WebThingError::DuplicateAction { name, id });
        }

        let mut guard = action.write();
        if let Some(schema) = metadata.get("input") {
            let schema = PropertyMetadata::from_value(schema.clone())
                .map_err(|_| WebThingError::InvalidActionInput)?;
            let input = guard.input().cloned().unwrap_or(Value::Null);
            let expects_value = schema
                .value_type()
                .is_some_and(|kind| kind != ValueType::Null);
            if input.is_null() && expects_value {
                return Err(WebThingError::InvalidActionInput);
            }
            schema
                .validate(&input)
                .map_err(|_| WebThingError::InvalidActionInput)?;
        }
        guard.set_href_prefix(self.href_prefix.clone());
        drop(guard);

        self.actions.entry(name).or_default().push(action);
        Ok(())
    }

    #[must_use]
    pub fn get_action(&self, name: &str, id: &str) -> Option<ActionHandle> {
        self.actions
            .get(name)?
            .iter()
            .find(|handle| handle.read().id() == id)
            .cloned()
    }

    /// Instances of one action name, in creation order.
    #[must_use]
    pub fn actions(&self, name: &str) -> &[ActionHandle] {
        self.actions.get(name).map_or(&[], Vec::as_slice)
    }

    /// Remove an action instance. Returns `true` iff one was removed.
    ///
    /// Removal does not cancel; the guarded
    /// [`ThingHandle::remove_action`](crate::handle::ThingHandle::remove_action)
    /// cancels first.
    pub fn remove_action(&mut self, name: &str, id: &str) -> bool {
        let Some(handles) = self.actions.get_mut(name) else {
            return false;
        };
        let before = handles.len();
        handles.retain(|handle| handle.read().id() != id);
        handles.len() != before
    }

    /// Drive `created → pending`. `false` if not found or not applicable.
    pub fn start_action(&mut self, name: &str, id: &str) -> bool {
        self.get_action(name, id)
            .is_some_and(|handle| handle.write().start())
    }

    /// Drive `pending → completed`. `false` if not found or not applicable.
    pub fn finish_action(&mut self, name: &str, id: &str) -> bool {
        self.get_action(name, id)
            .is_some_and(|handle| handle.write().finish())
    }

    /// Mark an action cancelled.
    ///
    /// The cancel callback is returned rather than run: it receives the
    /// Thing handle and must not run while the caller holds this Thing's
    /// guard. Run the [`Invocation`] after releasing it.
    pub fn cancel_action(&mut self, name: &str, id: &str) -> Option<Invocation> {
        self.get_action(name, id)?.write().cancel()
    }

    /// Descriptions of all instances of `name`, or of every action when
    /// `name` is `None`.
    #[must_use]
    pub fn get_action_descriptions(&self, name: Option<&str>) -> Value {
        let descriptions = match name {
            Some(name) => self
                .actions(name)
                .iter()
                .map(ActionHandle::description)
                .collect(),
            None => self
                .actions
                .values()
                .flatten()
                .map(ActionHandle::description)
                .collect(),
        };
        Value::Array(descriptions)
    }

    // -- events ------------------------------------------------------------

    /// Declare an event kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMetadata`] unless `metadata` is an
    /// object (or `null`).
    pub fn add_available_event(
        &mut self,
        name: impl Into<String>,
        metadata: Value,
    ) -> Result<(), ValidationError> {
        let metadata = PropertyMetadata::from_value(metadata)?.into_map();
        self.available_events.insert(name.into(), metadata);
        Ok(())
    }

    #[must_use]
    pub fn available_event(&self, name: &str) -> Option<&Map<String, Value>> {
        self.available_events.get(name)
    }

    /// Append an event to the log.
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// The event log, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn get_event_descriptions(&self, name: Option<&str>) -> Value {
        Value::Array(
            self.events
                .iter()
                .filter(|event| name.is_none_or(|name| event.name() == name))
                .map(Event::as_event_description)
                .collect(),
        )
    }

    // -- notifications -----------------------------------------------------

    /// Forward a property change to the notifier.
    ///
    /// Do not call this while holding the Thing's write guard; the
    /// [`ThingHandle`](crate::handle::ThingHandle) methods notify after
    /// releasing it.
    pub fn property_notify(&self, name: &str, value: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_property_changed(&self.id, name, value);
        }
    }

    /// Forward an action status change (action description) to the notifier.
    pub fn action_notify(&self, payload: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_action_status_changed(&self.id, payload);
        }
    }

    /// Forward an emitted event (event description) to the notifier.
    pub fn event_notify(&self, name: &str, payload: &Value) {
        if let Some(notifier) = &self.notifier {
            notifier.on_event(&self.id, name, payload);
        }
    }
}

/// Step-by-step builder for [`Thing`].
#[derive(Default)]
pub struct ThingBuilder {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    types: Vec<String>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ThingBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a capability type. Order is kept, duplicates are dropped.
    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.types.contains(&capability) {
            self.types.push(capability);
        }
        self
    }

    #[must_use]
    pub fn capabilities<I, S>(self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        capabilities
            .into_iter()
            .fold(self, |builder, capability| builder.capability(capability))
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Consume the builder, validate, and return a [`Thing`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] if `id` is missing or empty.
    pub fn build(self) -> Result<Thing, ValidationError> {
        let id = self.id.unwrap_or_default();
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }

        Ok(Thing {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            context: CONTEXT.to_owned(),
            types: self.types,
            href_prefix: String::new(),
            ui_href: None,
            properties: BTreeMap::new(),
            available_actions: BTreeMap::new(),
            available_events: BTreeMap::new(),
            actions: BTreeMap::new(),
            events: Vec::new(),
            notifier: self.notifier,
        })
    }
}
