//! Attribute selectors.
//!
//! An attribute selector describes which attributes of a (possibly nested)
//! component graph take part in an operation:
//!
//! - `true` selects the node and everything beneath it
//! - `false` excludes the node
//! - a map selects the listed attributes, each with its own sub-selector
//!
//! An empty map selects nothing beneath the node but keeps the node itself, so it
//! is distinct from `false`.
//!
//! ## Normal Form
//!
//! Maps never hold `false` entries in normal form: an attribute mapped to
//! `false` is the same as an attribute that is absent. Every operation in this
//! module returns normalized selectors, so [`merge`](AttributeSelector::merge)
//! and [`intersect`](AttributeSelector::intersect) are commutative, associative
//! and idempotent under `==` (map equality ignores key order).

use indexmap::IndexMap;

use crate::error::{ComponentryError, Result};
use crate::value::{Object, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSelector {
    Bool(bool),
    Map(IndexMap<String, AttributeSelector>),
}

impl Default for AttributeSelector {
    fn default() -> Self {
        AttributeSelector::Bool(true)
    }
}

impl From<bool> for AttributeSelector {
    fn from(value: bool) -> Self {
        AttributeSelector::Bool(value)
    }
}

impl AttributeSelector {
    pub fn all() -> Self {
        AttributeSelector::Bool(true)
    }

    pub fn none() -> Self {
        AttributeSelector::Bool(false)
    }

    /// A map that selects no attribute (but keeps the node).
    pub fn empty() -> Self {
        AttributeSelector::Map(IndexMap::new())
    }

    /// A map selecting each named attribute entirely.
    pub fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        AttributeSelector::Map(
            names
                .into_iter()
                .map(|name| (name.as_ref().to_string(), AttributeSelector::Bool(true)))
                .collect(),
        )
    }

    /// A map built from `(name, sub-selector)` pairs, normalized.
    pub fn from_entries<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, AttributeSelector)>,
    ) -> Self {
        AttributeSelector::Map(
            entries
                .into_iter()
                .map(|(name, selector)| (name.into(), selector))
                .collect(),
        )
        .normalize()
    }

    /// Parse a selector out of a dynamic value (`true`, `false`, `undefined` or
    /// an object of nested selectors).
    pub fn from_value(value: &Value) -> Result<Self> {
        let selector = match value {
            Value::Undefined => AttributeSelector::Bool(false),
            Value::Boolean(value) => AttributeSelector::Bool(*value),
            Value::Object(object) => {
                let mut map = IndexMap::new();
                for (name, subvalue) in object {
                    map.insert(name.clone(), AttributeSelector::from_value(subvalue)?);
                }
                AttributeSelector::Map(map)
            }
            other => {
                return Err(ComponentryError::InvalidAttributeSelector(format!(
                    "expected a boolean or an object, received {}",
                    other
                )))
            }
        };
        Ok(selector.normalize())
    }

    pub fn to_value(&self) -> Value {
        match self {
            AttributeSelector::Bool(value) => Value::Boolean(*value),
            AttributeSelector::Map(map) => Value::Object(
                map.iter()
                    .map(|(name, selector)| (name.clone(), selector.to_value()))
                    .collect::<Object>(),
            ),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, AttributeSelector::Bool(true))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AttributeSelector::Bool(false))
    }

    /// Drop `false` entries, recursively.
    pub fn normalize(&self) -> Self {
        match self {
            AttributeSelector::Bool(value) => AttributeSelector::Bool(*value),
            AttributeSelector::Map(map) => AttributeSelector::Map(
                map.iter()
                    .map(|(name, selector)| (name.clone(), selector.normalize()))
                    .filter(|(_, selector)| !selector.is_none())
                    .collect(),
            ),
        }
    }

    /// The sub-selector for an attribute.
    pub fn get(&self, name: &str) -> AttributeSelector {
        match self {
            AttributeSelector::Bool(value) => AttributeSelector::Bool(*value),
            AttributeSelector::Map(map) => map
                .get(name)
                .cloned()
                .unwrap_or(AttributeSelector::Bool(false)),
        }
    }

    /// Replace the sub-selector for an attribute. Setting into `true` is a no-op
    /// since everything is already selected.
    pub fn set(&mut self, name: &str, selector: AttributeSelector) {
        match self {
            AttributeSelector::Bool(true) => {}
            AttributeSelector::Bool(false) => {
                if !selector.is_none() {
                    let mut map = IndexMap::new();
                    map.insert(name.to_string(), selector.normalize());
                    *self = AttributeSelector::Map(map);
                }
            }
            AttributeSelector::Map(map) => {
                if selector.is_none() {
                    map.shift_remove(name);
                } else {
                    map.insert(name.to_string(), selector.normalize());
                }
            }
        }
    }

    /// Selected attribute names (for maps), in insertion order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            AttributeSelector::Map(map) => map.keys().map(String::as_str).collect(),
            AttributeSelector::Bool(_) => Vec::new(),
        }
    }

    /// Union.
    pub fn merge(&self, other: &AttributeSelector) -> AttributeSelector {
        use AttributeSelector::*;

        match (self, other) {
            (Bool(true), _) | (_, Bool(true)) => Bool(true),
            (Bool(false), other) => other.normalize(),
            (this, Bool(false)) => this.normalize(),
            (Map(left), Map(right)) => {
                let mut merged = IndexMap::new();
                for (name, selector) in left {
                    let selector = match right.get(name) {
                        Some(other) => selector.merge(other),
                        None => selector.normalize(),
                    };
                    if !selector.is_none() {
                        merged.insert(name.clone(), selector);
                    }
                }
                for (name, selector) in right {
                    if left.contains_key(name) {
                        continue;
                    }
                    let selector = selector.normalize();
                    if !selector.is_none() {
                        merged.insert(name.clone(), selector);
                    }
                }
                Map(merged)
            }
        }
    }

    /// Intersection.
    pub fn intersect(&self, other: &AttributeSelector) -> AttributeSelector {
        use AttributeSelector::*;

        match (self, other) {
            (Bool(false), _) | (_, Bool(false)) => Bool(false),
            (Bool(true), other) => other.normalize(),
            (this, Bool(true)) => this.normalize(),
            (Map(left), Map(right)) => {
                let mut intersected = IndexMap::new();
                for (name, selector) in left {
                    let Some(other) = right.get(name) else {
                        continue;
                    };
                    let selector = selector.intersect(other);
                    if !selector.is_none() {
                        intersected.insert(name.clone(), selector);
                    }
                }
                Map(intersected)
            }
        }
    }

    /// Whether everything selected by `other` is also selected by `self`.
    pub fn includes(&self, other: &AttributeSelector) -> bool {
        self.merge(other) == self.normalize()
    }
}

/// Project a concrete value down to the paths implied by the selector.
///
/// Arrays are projected item by item. Names listed in
/// `include_attribute_names` are kept at every object level even when the
/// selector omits them (used for `__component` and identifier fields).
pub fn pick(value: &Value, selector: &AttributeSelector, include_attribute_names: &[&str]) -> Value {
    let map = match selector {
        AttributeSelector::Bool(false) => return Value::Undefined,
        AttributeSelector::Bool(true) => return value.clone(),
        AttributeSelector::Map(map) => map,
    };

    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| pick(item, selector, include_attribute_names))
                .collect(),
        ),
        Value::Object(object) => {
            let mut picked = Object::new();
            for name in include_attribute_names {
                if let Some(value) = object.get(*name) {
                    picked.insert(name.to_string(), value.clone());
                }
            }
            for (name, subselector) in map {
                let Some(value) = object.get(name) else {
                    continue;
                };
                let value = pick(value, subselector, include_attribute_names);
                if !value.is_undefined() {
                    picked.insert(name.clone(), value);
                }
            }
            Value::Object(picked)
        }
        other => other.clone(),
    }
}
