//! # Serialization
//!
//! Converts component graphs to plain, tagged [`Value`] trees and back.
//!
//! ## Shape
//!
//! ```text
//! {"__component": "Movie", "_new": true, "id": "abc", "title": "Inception",
//!  "director": {"__component": "Person", "id": "p1", "name": "Nolan"}}
//! ```
//!
//! - Every instance carries `__component` with its class name.
//! - A class reference serializes to `{"__component": "typeof Movie"}`.
//! - `_new: true` marks instances that were never persisted. It is only emitted
//!   for the [`Remote`](SerializationTarget::Remote) target.
//! - Only set attributes that the selector includes are emitted. `undefined`
//!   values are kept (they become `$unset` entries or `{"__undefined": true}`).
//!
//! ## Targets
//!
//! | Target | `_new` | Referenced components |
//! |--------|--------|-----------------------|
//! | `Remote` | emitted | serialized whole (cycles become references) |
//! | `Store` | omitted | reduced to `{__component, <identifier>}` |
//!
//! A *referenced* component is one whose class is not embedded and has a primary
//! identifier. The value passed to [`serialize`] is never reduced.

use std::cell::RefCell;

use serde_json::Value as JsonValue;

use crate::attributes::AttributeSelector;
use crate::component::{Component, ComponentRegistry, ValueSource};
use crate::error::{ComponentryError, Result};
use crate::value::{Object, Value};

/// The class discriminator carried by every serialized component.
pub const COMPONENT_FIELD: &str = "__component";
/// Marks a serialized component that was never persisted.
pub const NEW_FIELD: &str = "_new";

const CLASS_REFERENCE_PREFIX: &str = "typeof ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationTarget {
    #[default]
    Remote,
    Store,
}

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub attribute_selector: AttributeSelector,
    pub target: SerializationTarget,
}

impl SerializeOptions {
    pub fn for_store(attribute_selector: AttributeSelector) -> Self {
        Self {
            attribute_selector,
            target: SerializationTarget::Store,
        }
    }
}

pub(crate) struct Serializer {
    target: SerializationTarget,
    visiting: RefCell<Vec<Component>>,
}

impl Serializer {
    fn new(target: SerializationTarget) -> Self {
        Self {
            target,
            visiting: RefCell::new(Vec::new()),
        }
    }

    /// Serialize a nested value. Components reached from here are not the root.
    pub(crate) fn serialize(&self, value: &Value, selector: &AttributeSelector) -> Result<Value> {
        match value {
            Value::Component(component) => self.serialize_component(component, selector, false),
            Value::ComponentClass(class) => Ok(Value::object([(
                COMPONENT_FIELD,
                format!("{}{}", CLASS_REFERENCE_PREFIX, class.name()),
            )])),
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.serialize(item, selector))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Value::Object(object) => {
                let mut serialized = Object::new();
                for (key, item) in object {
                    serialized.insert(key.clone(), self.serialize(item, &AttributeSelector::all())?);
                }
                Ok(Value::Object(serialized))
            }
            other => Ok(other.clone()),
        }
    }

    fn serialize_component(
        &self,
        component: &Component,
        selector: &AttributeSelector,
        is_root: bool,
    ) -> Result<Value> {
        let is_cycle = self.visiting.borrow().iter().any(|visited| visited == component);
        let is_reference = !is_root
            && self.target == SerializationTarget::Store
            && component.class().is_referenceable();
        if is_cycle || is_reference {
            return self.serialize_reference(component);
        }

        self.visiting.borrow_mut().push(component.clone());
        let result = self.serialize_attributes(component, selector);
        self.visiting.borrow_mut().pop();
        result
    }

    fn header(&self, component: &Component) -> Object {
        let mut object = Object::new();
        object.insert(
            COMPONENT_FIELD.to_string(),
            Value::from(component.class().name()),
        );
        if self.target == SerializationTarget::Remote && component.is_new() {
            object.insert(NEW_FIELD.to_string(), Value::Boolean(true));
        }
        object
    }

    fn serialize_reference(&self, component: &Component) -> Result<Value> {
        let mut object = self.header(component);
        object.extend(component.identifier_descriptor()?);
        Ok(Value::Object(object))
    }

    fn serialize_attributes(&self, component: &Component, selector: &AttributeSelector) -> Result<Value> {
        let mut object = self.header(component);
        for attribute in component.class().attributes() {
            let subselector = selector.get(attribute.name());
            if subselector.is_none() {
                continue;
            }
            let Some(value) = component.get_if_set(attribute.name()) else {
                continue;
            };
            let serialized = attribute
                .value_type()
                .serialize_value(&value, &subselector, self)?;
            object.insert(attribute.name().to_string(), serialized);
        }
        Ok(Value::Object(object))
    }
}

/// Serialize a value (usually a component) into a plain tagged tree.
pub fn serialize(value: &Value, options: &SerializeOptions) -> Result<Value> {
    let serializer = Serializer::new(options.target);
    match value {
        Value::Component(component) => {
            serializer.serialize_component(component, &options.attribute_selector, true)
        }
        other => serializer.serialize(other, &options.attribute_selector),
    }
}

/// Serialize straight to the JSON wire format.
pub fn serialize_to_json(value: &Value, options: &SerializeOptions) -> Result<JsonValue> {
    serialize(value, options)?.to_json()
}

#[derive(Debug, Clone)]
pub struct DeserializeOptions<'a> {
    pub registry: &'a ComponentRegistry,
    pub source: ValueSource,
}

impl<'a> DeserializeOptions<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            source: ValueSource::Local,
        }
    }

    pub fn with_source(mut self, source: ValueSource) -> Self {
        self.source = source;
        self
    }
}

/// Rebuild components from a tagged tree.
///
/// Each tagged object becomes a fresh instance (new if it carries `_new: true`).
pub fn deserialize(value: &Value, options: &DeserializeOptions<'_>) -> Result<Value> {
    match value {
        Value::Object(object) => match object.get(COMPONENT_FIELD) {
            Some(Value::String(name)) => {
                if let Some(class_name) = name.strip_prefix(CLASS_REFERENCE_PREFIX) {
                    return Ok(Value::ComponentClass(
                        options.registry.get_component(class_name)?,
                    ));
                }
                let class = options.registry.get_component(name)?;
                let is_new = matches!(object.get(NEW_FIELD), Some(Value::Boolean(true)));
                let component = Component::instantiate(&class, is_new);
                deserialize_attributes(&component, object, options)?;
                Ok(Value::Component(component))
            }
            Some(other) => Err(ComponentryError::InvalidComponent(format!(
                "'{}' must be a string (found: {})",
                COMPONENT_FIELD, other
            ))),
            None => {
                let mut deserialized = Object::new();
                for (key, item) in object {
                    deserialized.insert(key.clone(), deserialize(item, options)?);
                }
                Ok(Value::Object(deserialized))
            }
        },
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| deserialize(item, options))
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(other.clone()),
    }
}

/// Apply a tagged object onto an existing instance.
pub fn deserialize_into(
    component: &Component,
    value: &Value,
    options: &DeserializeOptions<'_>,
) -> Result<()> {
    let object = value.as_object().ok_or_else(|| {
        ComponentryError::InvalidOptions(format!(
            "cannot deserialize {} into a component",
            value.type_name()
        ))
    })?;

    if let Some(tag) = object.get(COMPONENT_FIELD) {
        if tag.as_str() != Some(component.class().name()) {
            return Err(ComponentryError::InvalidComponent(format!(
                "cannot deserialize {} into an instance of '{}'",
                tag,
                component.class().name()
            )));
        }
    }
    if let Some(Value::Boolean(is_new)) = object.get(NEW_FIELD) {
        if *is_new {
            component.mark_as_new();
        } else {
            component.mark_as_not_new();
        }
    }

    deserialize_attributes(component, object, options)
}

fn deserialize_attributes(
    component: &Component,
    object: &Object,
    options: &DeserializeOptions<'_>,
) -> Result<()> {
    for (name, item) in object {
        if name == COMPONENT_FIELD || name == NEW_FIELD {
            continue;
        }
        component.class().get_attribute(name)?;
        let value = deserialize(item, options)?;
        component.set_with_source(name, value, options.source)?;
    }
    Ok(())
}

/// Parse the JSON wire format and rebuild components.
pub fn deserialize_from_json(json: JsonValue, options: &DeserializeOptions<'_>) -> Result<Value> {
    deserialize(&Value::from_json(json), options)
}

/// Serialize to JSON text.
pub fn serialize_to_string(value: &Value, options: &SerializeOptions) -> Result<String> {
    Ok(serde_json::to_string(&serialize_to_json(value, options)?)?)
}

/// Parse JSON text and rebuild components.
pub fn deserialize_from_str(text: &str, options: &DeserializeOptions<'_>) -> Result<Value> {
    let json: JsonValue = serde_json::from_str(text)?;
    deserialize_from_json(json, options)
}
