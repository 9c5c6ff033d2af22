//! # Components
//!
//! A component is a typed record: a [`ComponentClass`] declares named attributes,
//! each with a [`ValueType`](crate::attributes::ValueType), and a [`Component`]
//! holds values for them.
//!
//! ## Declaring Classes
//!
//! ```ignore
//! let movie = ComponentClass::builder("Movie")
//!     .attribute(AttributeDeclaration::primary_identifier("id", "string"))
//!     .attribute(AttributeDeclaration::new("title", "string").validator(not_empty()))
//!     .attribute(AttributeDeclaration::new("director", "Person?"))
//!     .storable()
//!     .build()?;
//! let registry = ComponentRegistry::with_components([&movie, &person])?;
//! ```
//!
//! Component references (`"Person"`, `"typeof Movie"`) are resolved by name
//! through the [`ComponentRegistry`] the owning class is registered in.
//!
//! ## Attribute State
//!
//! Each attribute of an instance is either **unset** or **set** to a value
//! (possibly `undefined`). Reading an unset attribute is an error.
//!
//! | Constructor | Attributes |
//! |-------------|------------|
//! | [`Component::create`] | every attribute set: given value, default, or `undefined`; marked new |
//! | [`Component::instantiate`] | all unset |
//! | [`Component::with_identifiers`] | only identifiers set; not new |
//!
//! Every set value remembers where it came from ([`ValueSource`]): assigned
//! locally, received from a remote peer, or confirmed by a store.
//!
//! ## Assignment
//!
//! [`Component::set`] runs the attribute's sanitizers and then type-checks the
//! result. Validators do not run on assignment; call [`Component::validate`].
//!
//! ## Forks
//!
//! [`Component::fork`] creates an independently mutable instance backed by its
//! base. Reads of attributes the fork never wrote fall through to the base's
//! *current* value. Values holding components are forked on first read and pinned
//! in the fork, so mutating a nested component through the fork never reaches the
//! base. Writes and unsets on the fork never affect the base.

mod class;
mod registry;

pub use class::{
    Attribute, AttributeDeclaration, AttributeKind, ComponentClass, ComponentClassBuilder,
    DefaultValue, IndexDeclaration,
};
pub use registry::ComponentRegistry;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::attributes::{
    AttributeContext, AttributeSelector, ResolveOptions, ValidationFailure,
};
use crate::error::{ComponentryError, Result};
use crate::value::{Object, Value};

/// Where an attribute value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Local,
    Remote,
    Store,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    source: ValueSource,
}

struct ComponentState {
    /// `None` marks an attribute explicitly unset, shadowing the base of a fork.
    slots: IndexMap<String, Option<Slot>>,
    is_new: bool,
}

struct ComponentInner {
    class: Rc<ComponentClass>,
    base: Option<Component>,
    state: RefCell<ComponentState>,
    resolving: Cell<bool>,
}

/// A handle to a component instance. Clones share the same instance.
#[derive(Clone)]
pub struct Component(Rc<ComponentInner>);

impl Component {
    /// A new instance with no attribute set.
    pub fn instantiate(class: &Rc<ComponentClass>, is_new: bool) -> Component {
        Component(Rc::new(ComponentInner {
            class: Rc::clone(class),
            base: None,
            state: RefCell::new(ComponentState {
                slots: IndexMap::new(),
                is_new,
            }),
            resolving: Cell::new(false),
        }))
    }

    /// A new instance with every attribute set, from `values`, from the
    /// attribute default, or to `undefined`.
    pub fn create<'a>(
        class: &Rc<ComponentClass>,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<Component> {
        let mut values: IndexMap<&str, Value> = values.into_iter().collect();
        let component = Component::instantiate(class, true);

        for name in values.keys() {
            class.get_attribute(name)?;
        }

        for attribute in class.attributes() {
            if let Some(value) = values.shift_remove(attribute.name()) {
                component.set(attribute.name(), value)?;
            } else if let Some(default) = attribute.default() {
                component.set(attribute.name(), default.produce())?;
            } else {
                component.write_slot(attribute.name(), Value::Undefined, ValueSource::Local);
            }
        }

        Ok(component)
    }

    /// An existing (not new) instance with only its identifiers set.
    pub fn with_identifiers(class: &Rc<ComponentClass>, identifiers: &Object) -> Result<Component> {
        let component = Component::instantiate(class, false);
        for (name, value) in identifiers {
            let attribute = class.get_attribute(name)?;
            if !attribute.kind().is_identifier() {
                return Err(ComponentryError::InvalidOptions(format!(
                    "'{}' is not an identifier attribute of '{}'",
                    name,
                    class.name()
                )));
            }
            component.set(name, value.clone())?;
        }
        Ok(component)
    }

    pub fn class(&self) -> &Rc<ComponentClass> {
        &self.0.class
    }

    /// Assign a value: sanitize, type-check, then store with a `Local` source.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let attribute = self.0.class.get_attribute(name)?;
        let value = attribute.value_type().sanitize_value(value.into());
        self.check(name, &value)?;
        self.write_slot(name, value, ValueSource::Local);
        Ok(())
    }

    /// Assign an already-sanitized value, recording where it came from.
    pub fn set_with_source(&self, name: &str, value: Value, source: ValueSource) -> Result<()> {
        self.check(name, &value)?;
        self.write_slot(name, value, source);
        Ok(())
    }

    fn check(&self, name: &str, value: &Value) -> Result<()> {
        let attribute = self.0.class.get_attribute(name)?;
        let context = AttributeContext::with_owner(&self.0.class, name);
        attribute.value_type().check_value(value, &context)
    }

    fn write_slot(&self, name: &str, value: Value, source: ValueSource) {
        self.0
            .state
            .borrow_mut()
            .slots
            .insert(name.to_string(), Some(Slot { value, source }));
    }

    fn slot(&self, name: &str) -> Option<Slot> {
        if let Some(own) = self.0.state.borrow().slots.get(name) {
            return own.clone();
        }
        let base = self.0.base.as_ref()?;
        let slot = base.slot(name)?;
        if !slot.value.contains_components() {
            return Some(slot);
        }
        let pinned = Slot {
            value: fork_value(&slot.value),
            source: slot.source,
        };
        self.0
            .state
            .borrow_mut()
            .slots
            .insert(name.to_string(), Some(pinned.clone()));
        Some(pinned)
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.0.class.get_attribute(name)?;
        self.slot(name)
            .map(|slot| slot.value)
            .ok_or_else(|| {
                ComponentryError::UnsetAttribute(format!("{}.{}", self.0.class.name(), name))
            })
    }

    /// The value of a set attribute, or `None` when unset or unknown.
    pub fn get_if_set(&self, name: &str) -> Option<Value> {
        self.slot(name).map(|slot| slot.value)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn unset(&self, name: &str) -> Result<()> {
        self.0.class.get_attribute(name)?;
        self.0
            .state
            .borrow_mut()
            .slots
            .insert(name.to_string(), None);
        Ok(())
    }

    pub fn value_source(&self, name: &str) -> Option<ValueSource> {
        self.slot(name).map(|slot| slot.source)
    }

    pub fn set_value_source(&self, name: &str, source: ValueSource) -> Result<()> {
        self.0.class.get_attribute(name)?;
        let slot = self.slot(name).ok_or_else(|| {
            ComponentryError::UnsetAttribute(format!("{}.{}", self.0.class.name(), name))
        })?;
        self.write_slot(name, slot.value, source);
        Ok(())
    }

    /// Stamp `source` on every selected, set attribute, descending into embedded
    /// components.
    pub fn set_value_sources(&self, selector: &AttributeSelector, source: ValueSource) {
        for attribute in self.0.class.attributes() {
            let subselector = selector.get(attribute.name());
            if subselector.is_none() {
                continue;
            }
            let Some(slot) = self.slot(attribute.name()) else {
                continue;
            };
            visit_components(&slot.value, &mut |component| {
                if !component.class().is_referenceable() {
                    component.set_value_sources(&subselector, source);
                }
            });
            self.write_slot(attribute.name(), slot.value, source);
        }
    }

    pub fn is_new(&self) -> bool {
        self.0.state.borrow().is_new
    }

    pub fn mark_as_new(&self) {
        self.0.state.borrow_mut().is_new = true;
    }

    pub fn mark_as_not_new(&self) {
        self.0.state.borrow_mut().is_new = false;
    }

    /// Names of the attributes currently set, in declaration order.
    pub fn set_attribute_names(&self) -> Vec<String> {
        self.0
            .class
            .attributes()
            .filter(|attribute| self.is_set(attribute.name()))
            .map(|attribute| attribute.name().to_string())
            .collect()
    }

    /// An independently mutable instance reading through to this one.
    pub fn fork(&self) -> Component {
        self.fork_as(&self.0.class)
    }

    /// Fork into a forked class of this instance's class.
    pub fn fork_with_class(&self, class: &Rc<ComponentClass>) -> Result<Component> {
        if !class.is_same_or_fork_of(&self.0.class) {
            return Err(ComponentryError::InvalidOptions(format!(
                "cannot fork an instance of '{}' into an unrelated class",
                self.0.class.name()
            )));
        }
        Ok(self.fork_as(class))
    }

    fn fork_as(&self, class: &Rc<ComponentClass>) -> Component {
        Component(Rc::new(ComponentInner {
            class: Rc::clone(class),
            base: Some(self.clone()),
            state: RefCell::new(ComponentState {
                slots: IndexMap::new(),
                is_new: self.is_new(),
            }),
            resolving: Cell::new(false),
        }))
    }

    pub fn base(&self) -> Option<&Component> {
        self.0.base.as_ref()
    }

    pub fn is_fork_of(&self, other: &Component) -> bool {
        let mut current = self.0.base.as_ref();
        while let Some(base) = current {
            if base == other {
                return true;
            }
            current = base.0.base.as_ref();
        }
        false
    }

    /// `{primary: value}` if the primary identifier is set, else the first set
    /// secondary identifier.
    pub fn identifier_descriptor(&self) -> Result<Object> {
        for attribute in self.0.class.identifier_attributes() {
            match self.get_if_set(attribute.name()) {
                Some(Value::Undefined) | None => continue,
                Some(value) => {
                    let mut descriptor = Object::new();
                    descriptor.insert(attribute.name().to_string(), value);
                    return Ok(descriptor);
                }
            }
        }
        Err(ComponentryError::MissingIdentifier(
            self.0.class.name().to_string(),
        ))
    }

    pub fn has_identifiers(&self) -> bool {
        self.identifier_descriptor().is_ok()
    }

    /// Narrow `selector` to the attributes of this instance.
    ///
    /// Cycles between instances are cut: an instance already being resolved
    /// returns the selector unchanged.
    pub fn resolve_attribute_selector(
        &self,
        selector: &AttributeSelector,
        options: &ResolveOptions,
    ) -> AttributeSelector {
        let selector = selector.normalize();
        if selector.is_none() {
            return selector;
        }
        if self.0.resolving.replace(true) {
            return selector;
        }

        let mut resolved = AttributeSelector::empty();
        for attribute in self.0.class.attributes() {
            let subselector = selector.get(attribute.name());
            if subselector.is_none() {
                continue;
            }
            let value = self.get_if_set(attribute.name());
            if options.set_attributes_only && value.is_none() {
                continue;
            }
            let attribute_selector = attribute.value_type().resolve_attribute_selector(
                &subselector,
                value.as_ref(),
                options,
            );
            resolved.set(attribute.name(), attribute_selector);
        }

        self.0.resolving.set(false);
        resolved
    }

    /// Validators that fail for the selected, set attributes, with their paths.
    pub fn run_validators(&self, selector: &AttributeSelector) -> Vec<ValidationFailure> {
        let resolved = self.resolve_attribute_selector(
            selector,
            &ResolveOptions {
                set_attributes_only: true,
                include_referenced_components: false,
                ..ResolveOptions::default()
            },
        );

        let mut failures = Vec::new();
        for attribute in self.0.class.attributes() {
            let subselector = resolved.get(attribute.name());
            if subselector.is_none() {
                continue;
            }
            let Some(value) = self.get_if_set(attribute.name()) else {
                continue;
            };
            failures.extend(
                attribute
                    .value_type()
                    .run_validators(&value, &subselector)
                    .into_iter()
                    .map(|failure| failure.prefixed(attribute.name())),
            );
        }
        failures
    }

    pub fn validate(&self, selector: &AttributeSelector) -> Result<()> {
        let failures = self.run_validators(selector);
        if failures.is_empty() {
            return Ok(());
        }
        Err(ComponentryError::Validation {
            component: self.0.class.name().to_string(),
            failures,
        })
    }

    pub fn is_valid(&self, selector: &AttributeSelector) -> bool {
        self.run_validators(selector).is_empty()
    }
}

fn fork_value(value: &Value) -> Value {
    match value {
        Value::Component(component) => Value::Component(component.fork()),
        Value::Array(items) => Value::Array(items.iter().map(fork_value).collect()),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, value)| (key.clone(), fork_value(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Call `visit` on every component instance directly held by `value`
/// (looking through arrays and plain objects, not into components).
pub(crate) fn visit_components(value: &Value, visit: &mut dyn FnMut(&Component)) {
    match value {
        Value::Component(component) => visit(component),
        Value::Array(items) => items.iter().for_each(|item| visit_components(item, visit)),
        Value::Object(object) => object
            .values()
            .for_each(|item| visit_components(item, visit)),
        _ => {}
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("class", &self.0.class.name())
            .field("is_new", &self.is_new())
            .field("set", &self.set_attribute_names())
            .finish()
    }
}

/// Instances compare by identity.
impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
