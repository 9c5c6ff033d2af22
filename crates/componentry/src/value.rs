//! # Runtime Values
//!
//! [`Value`] is the dynamic representation of everything an attribute can hold,
//! everything a query can compare against, and everything a document is made of.
//!
//! ## Variants
//!
//! | Variant | Type specifier | Notes |
//! |---------|----------------|-------|
//! | `Undefined` | (absence) | Only accepted by optional types |
//! | `Null` | `any` | Only accepted by `any` |
//! | `Boolean` | `boolean` | |
//! | `Number` | `number` | Always `f64` |
//! | `String` | `string` | |
//! | `Date` | `Date` | UTC timestamp |
//! | `RegExp` | `RegExp` | Source and flags |
//! | `Array` | `T[]` | |
//! | `Object` | `object` | Plain, insertion-ordered |
//! | `Component` | `Name` | Handle to a component instance |
//! | `ComponentClass` | `typeof Name` | Handle to a component class |
//!
//! ## Wire Format
//!
//! [`Value::to_json`] and [`Value::from_json`] convert to and from
//! `serde_json::Value`. JSON has no `undefined`, dates, or regular expressions,
//! so these are tagged:
//!
//! ```text
//! undefined        <->  {"__undefined": true}
//! Date             <->  {"__date": "2020-01-01T00:00:00Z"}
//! RegExp           <->  {"__regExp": "/^abc/i"}
//! ```
//!
//! Components must go through [`crate::serialization::serialize`] first;
//! converting a live component handle to JSON is an error.

use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::component::{Component, ComponentClass};
use crate::error::{ComponentryError, Result};

/// A plain, insertion-ordered object.
pub type Object = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    RegExp(RegExp),
    Array(Vec<Value>),
    Object(Object),
    Component(Component),
    ComponentClass(Rc<ComponentClass>),
}

/// A regular expression, kept as source and flags.
///
/// Flags follow the usual single-letter convention (`i`, `m`, `s`, `x`).
/// Unsupported flags are ignored when matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    pub source: String,
    pub flags: String,
}

impl RegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Parse the `/source/flags` literal form.
    pub fn parse(literal: &str) -> Option<Self> {
        let rest = literal.strip_prefix('/')?;
        let end = rest.rfind('/')?;
        Some(Self::new(&rest[..end], &rest[end + 1..]))
    }

    /// Compile into a matcher.
    pub fn to_regex(&self) -> Result<regex::Regex> {
        let mut builder = regex::RegexBuilder::new(&self.source);
        for flag in self.flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                _ => {}
            }
        }
        builder
            .build()
            .map_err(|err| ComponentryError::InvalidOptions(format!("invalid RegExp: {}", err)))
    }
}

impl std::fmt::Display for RegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

const UNDEFINED_TAG: &str = "__undefined";
const DATE_TAG: &str = "__date";
const REGEXP_TAG: &str = "__regExp";

impl Value {
    /// Build a plain object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_plain_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Value::Component(component) => Some(component),
            _ => None,
        }
    }

    /// The runtime type name used in type mismatch messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Date(_) => "Date".to_string(),
            Value::RegExp(_) => "RegExp".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(_) => "object".to_string(),
            Value::Component(component) => component.class().name().to_string(),
            Value::ComponentClass(class) => format!("typeof {}", class.name()),
        }
    }

    /// Whether a component instance or class is reachable from this value.
    pub fn contains_components(&self) -> bool {
        match self {
            Value::Component(_) | Value::ComponentClass(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_components),
            Value::Object(object) => object.values().any(Value::contains_components),
            _ => false,
        }
    }

    /// Convert to the JSON wire representation.
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(match self {
            Value::Undefined => {
                let mut tagged = JsonMap::new();
                tagged.insert(UNDEFINED_TAG.to_string(), JsonValue::Bool(true));
                JsonValue::Object(tagged)
            }
            Value::Null => JsonValue::Null,
            Value::Boolean(value) => JsonValue::Bool(*value),
            Value::Number(value) => number_to_json(*value),
            Value::String(value) => JsonValue::String(value.clone()),
            Value::Date(date) => {
                let mut tagged = JsonMap::new();
                tagged.insert(
                    DATE_TAG.to_string(),
                    JsonValue::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
                JsonValue::Object(tagged)
            }
            Value::RegExp(regexp) => {
                let mut tagged = JsonMap::new();
                tagged.insert(REGEXP_TAG.to_string(), JsonValue::String(regexp.to_string()));
                JsonValue::Object(tagged)
            }
            Value::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(object) => {
                let mut map = JsonMap::new();
                for (key, value) in object {
                    map.insert(key.clone(), value.to_json()?);
                }
                JsonValue::Object(map)
            }
            Value::Component(_) | Value::ComponentClass(_) => {
                return Err(ComponentryError::InvalidOptions(format!(
                    "cannot convert a live {} to JSON, serialize it first",
                    self.type_name()
                )))
            }
        })
    }

    /// Convert from the JSON wire representation.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(value) => Value::Boolean(value),
            JsonValue::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(value) => Value::String(value),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => {
                if map.len() == 1 {
                    if let Some(JsonValue::Bool(true)) = map.get(UNDEFINED_TAG) {
                        return Value::Undefined;
                    }
                    if let Some(JsonValue::String(date)) = map.get(DATE_TAG) {
                        if let Ok(date) = DateTime::parse_from_rfc3339(date) {
                            return Value::Date(date.with_timezone(&Utc));
                        }
                    }
                    if let Some(JsonValue::String(literal)) = map.get(REGEXP_TAG) {
                        if let Some(regexp) = RegExp::parse(literal) {
                            return Value::RegExp(regexp);
                        }
                    }
                }
                Value::Object(
                    map.into_iter()
                        .map(|(key, value)| (key, Value::from_json(value)))
                        .collect(),
                )
            }
        }
    }
}

fn number_to_json(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return JsonValue::Number(JsonNumber::from(value as i64));
    }
    JsonNumber::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Number(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{:?}", value),
            Value::Date(date) => write!(f, "{}", date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::RegExp(regexp) => write!(f, "{}", regexp),
            Value::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                write!(f, "{{")?;
                for (index, (key, value)) in object.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Component(component) => write!(f, "<{}>", component.class().name()),
            Value::ComponentClass(class) => write!(f, "<typeof {}>", class.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<RegExp> for Value {
    fn from(value: RegExp) -> Self {
        Value::RegExp(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Undefined)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Component> for Value {
    fn from(value: Component) -> Self {
        Value::Component(value)
    }
}

impl From<Rc<ComponentClass>> for Value {
    fn from(value: Rc<ComponentClass>) -> Self {
        Value::ComponentClass(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::from_json(value)
    }
}
