//! # Documents, Projections and Patches
//!
//! A [`Document`] is the store-facing shape of one storable: the serialized
//! component (see [`crate::serialization`]) with its `__component` tag.
//!
//! ## Projections
//!
//! [`build_projection`] turns a resolved attribute selector into dotted paths:
//!
//! | Selector | Projection |
//! |----------|------------|
//! | `true` | `None` (whole document) |
//! | `false` | `{__component: 1}` |
//! | `{title: true, director: {name: true}}` | `{__component, title, director.__component, director.name}` |
//!
//! ## Patches
//!
//! [`build_document_patch`] walks a serialized document:
//!
//! - `undefined` at path `P` gives `$unset[P]`
//! - a nested object tagged with `__component` is walked field by field
//! - any other object or array is set whole under one `$set` key, with its
//!   `undefined` members removed
//!
//! Only component-tagged objects are diffed per field, so a nested component's
//! own fields stay individually addressable.

use indexmap::{IndexMap, IndexSet};

use crate::attributes::AttributeSelector;
use crate::serialization::COMPONENT_FIELD;
use crate::value::{Object, Value};

pub type Document = Object;

/// Dotted path to `1`.
pub type Projection = IndexMap<String, u8>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentPatch {
    pub set: IndexMap<String, Value>,
    pub unset: IndexSet<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// `{"$set": {...}, "$unset": {path: 1}}`
    pub fn to_value(&self) -> Value {
        let unset: Object = self
            .unset
            .iter()
            .map(|path| (path.clone(), Value::from(1)))
            .collect();
        Value::object([
            ("$set", Value::Object(self.set.clone())),
            ("$unset", Value::Object(unset)),
        ])
    }
}

pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

pub fn build_projection(selector: &AttributeSelector) -> Option<Projection> {
    match selector {
        AttributeSelector::Bool(true) => None,
        AttributeSelector::Bool(false) => {
            let mut projection = Projection::new();
            projection.insert(COMPONENT_FIELD.to_string(), 1);
            Some(projection)
        }
        AttributeSelector::Map(_) => {
            let mut projection = Projection::new();
            add_projection_paths(selector, "", &mut projection);
            Some(projection)
        }
    }
}

fn add_projection_paths(selector: &AttributeSelector, prefix: &str, projection: &mut Projection) {
    let AttributeSelector::Map(map) = selector else {
        return;
    };
    projection.insert(join_path(prefix, COMPONENT_FIELD), 1);
    for (name, subselector) in map {
        let path = join_path(prefix, name);
        match subselector {
            AttributeSelector::Bool(true) => {
                projection.insert(path, 1);
            }
            AttributeSelector::Bool(false) => {}
            AttributeSelector::Map(_) => add_projection_paths(subselector, &path, projection),
        }
    }
}

pub fn build_document_patch(document: &Document) -> DocumentPatch {
    let mut patch = DocumentPatch::default();
    add_patch_entries(document, "", &mut patch);
    patch
}

fn add_patch_entries(object: &Object, prefix: &str, patch: &mut DocumentPatch) {
    for (name, value) in object {
        let path = join_path(prefix, name);
        match value {
            Value::Undefined => {
                patch.unset.insert(path);
            }
            Value::Object(nested) if nested.contains_key(COMPONENT_FIELD) => {
                add_patch_entries(nested, &path, patch);
            }
            other => {
                patch.set.insert(path, strip_undefined(other));
            }
        }
    }
}

/// Remove `undefined` members from objects; `undefined` array items become `null`.
pub fn strip_undefined(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(strip_undefined_fields(object)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Undefined => Value::Null,
                    other => strip_undefined(other),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The document a new storable is created with.
pub fn strip_undefined_fields(document: &Document) -> Document {
    document
        .iter()
        .filter(|(_, value)| !value.is_undefined())
        .map(|(key, value)| (key.clone(), strip_undefined(value)))
        .collect()
}

/// Read a dotted path. The empty path is the value itself.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a dotted path, creating intermediate objects.
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };
    let mut current = document;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Object::new()));
        if !entry.is_plain_object() {
            *entry = Value::Object(Object::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

/// Remove a dotted path. Returns whether something was removed.
pub fn remove_path(document: &mut Document, path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return false;
    };
    let mut current = document;
    for segment in segments {
        match current.get_mut(segment) {
            Some(Value::Object(next)) => current = next,
            _ => return false,
        }
    }
    current.shift_remove(last).is_some()
}

pub fn apply_patch(document: &mut Document, patch: &DocumentPatch) {
    for (path, value) in &patch.set {
        set_path(document, path, value.clone());
    }
    for path in &patch.unset {
        remove_path(document, path);
    }
}

#[derive(Default)]
struct ProjectionNode {
    children: IndexMap<String, ProjectionNode>,
    is_leaf: bool,
}

/// Keep only the projected paths of a document. Paths reach through arrays.
pub fn apply_projection(document: &Document, projection: Option<&Projection>) -> Document {
    let Some(projection) = projection else {
        return document.clone();
    };
    let mut root = ProjectionNode::default();
    for path in projection.keys() {
        let mut node = &mut root;
        for segment in path.split('.') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.is_leaf = true;
    }
    project_object(document, &root)
}

fn project_object(object: &Object, node: &ProjectionNode) -> Object {
    let mut projected = Object::new();
    for (name, child) in &node.children {
        let Some(value) = object.get(name) else {
            continue;
        };
        if child.is_leaf {
            projected.insert(name.clone(), value.clone());
        } else if let Some(value) = project_value(value, child) {
            projected.insert(name.clone(), value);
        }
    }
    projected
}

fn project_value(value: &Value, node: &ProjectionNode) -> Option<Value> {
    match value {
        Value::Object(object) => Some(Value::Object(project_object(object, node))),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| project_value(item, node))
                .collect(),
        )),
        _ => None,
    }
}
