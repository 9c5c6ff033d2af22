//! # Value Types
//!
//! A [`ValueType`] is a node in a small, closed type algebra. Every declared
//! attribute owns one, built by [`create_value_type`](super::create_value_type)
//! from a type specifier such as `"string"`, `"number?[]?"` or `"typeof Movie"`.
//!
//! ## Variants
//!
//! | Kind | Accepts |
//! |------|---------|
//! | `Any` | anything, including `undefined` |
//! | `Boolean`, `Number`, `String` | the matching scalar |
//! | `Object` | a plain object |
//! | `Date`, `RegExp` | the matching value |
//! | `Array(item)` | an array whose every item is accepted by `item` |
//! | `Component { name, is_class_reference }` | an instance (or class) of the named component, or a fork of it |
//!
//! Optionality is carried by each node and never inherited: `number?[]` is a
//! required array of optional numbers, `number[]?` an optional array of required
//! numbers.
//!
//! ## Operations
//!
//! - [`check_value`](ValueType::check_value) raises a type mismatch
//! - [`resolve_attribute_selector`](ValueType::resolve_attribute_selector) narrows a
//!   selector against a concrete value
//! - [`run_validators`](ValueType::run_validators) collects failed validators with
//!   their paths
//! - [`sanitize_value`](ValueType::sanitize_value) applies sanitizers, items first

use std::fmt;
use std::rc::Rc;

use crate::component::ComponentClass;
use crate::error::{ComponentryError, Result};
use crate::serialization::Serializer;
use crate::value::Value;

use super::sanitizer::Sanitizer;
use super::selector::AttributeSelector;
use super::validation::{required, ValidationFailure, Validator};

#[derive(Debug, Clone, PartialEq)]
pub enum ValueTypeKind {
    Any,
    Boolean,
    Number,
    String,
    Object,
    Date,
    RegExp,
    Array(Box<ValueType>),
    Component {
        name: String,
        is_class_reference: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueType {
    kind: ValueTypeKind,
    is_optional: bool,
    validators: Vec<Validator>,
    sanitizers: Vec<Sanitizer>,
}

/// Where a value type sits: which attribute of which component.
///
/// `owner` is used to resolve component references by name. Without it,
/// references are matched by class name only.
#[derive(Debug, Clone, Copy)]
pub struct AttributeContext<'a> {
    pub component: &'a str,
    pub attribute: &'a str,
    pub owner: Option<&'a Rc<ComponentClass>>,
}

impl<'a> AttributeContext<'a> {
    pub fn new(component: &'a str, attribute: &'a str) -> Self {
        Self {
            component,
            attribute,
            owner: None,
        }
    }

    pub fn with_owner(owner: &'a Rc<ComponentClass>, attribute: &'a str) -> Self {
        Self {
            component: owner.name(),
            attribute,
            owner: Some(owner),
        }
    }

    /// `Movie.title`
    pub fn describe(&self) -> String {
        if self.component.is_empty() {
            return self.attribute.to_string();
        }
        format!("{}.{}", self.component, self.attribute)
    }
}

/// How array items combine when a selector is resolved against an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorAggregation {
    /// Keep anything selected by at least one item.
    #[default]
    Union,
    /// Keep only what every item selects.
    Intersection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub aggregation: SelectorAggregation,
    /// Skip attributes that are not set on the component being resolved.
    pub set_attributes_only: bool,
    /// When false, referenced (non-embedded) components resolve to their
    /// identifier attributes only.
    pub include_referenced_components: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            aggregation: SelectorAggregation::Union,
            set_attributes_only: false,
            include_referenced_components: true,
        }
    }
}

impl ValueType {
    pub fn new(kind: ValueTypeKind, is_optional: bool) -> Self {
        Self {
            kind,
            is_optional,
            validators: Vec::new(),
            sanitizers: Vec::new(),
        }
    }

    pub fn with_validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_sanitizers(mut self, sanitizers: Vec<Sanitizer>) -> Self {
        self.sanitizers = sanitizers;
        self
    }

    pub fn kind(&self) -> &ValueTypeKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn sanitizers(&self) -> &[Sanitizer] {
        &self.sanitizers
    }

    pub fn item_type(&self) -> Option<&ValueType> {
        match &self.kind {
            ValueTypeKind::Array(item) => Some(item),
            _ => None,
        }
    }

    /// The component reference at the bottom of this type, looking through arrays.
    pub fn component_reference(&self) -> Option<(&str, bool)> {
        match &self.kind {
            ValueTypeKind::Array(item) => item.component_reference(),
            ValueTypeKind::Component {
                name,
                is_class_reference,
            } => Some((name, *is_class_reference)),
            _ => None,
        }
    }

    /// Check that `value` is acceptable, raising a type mismatch otherwise.
    ///
    /// For arrays, every item is checked and the first failing item's error is
    /// returned; it names the item type rather than the array type.
    pub fn check_value(&self, value: &Value, context: &AttributeContext<'_>) -> Result<()> {
        if matches!(self.kind, ValueTypeKind::Any) {
            return Ok(());
        }

        if value.is_undefined() {
            if self.is_optional {
                return Ok(());
            }
            return Err(self.mismatch(value, context));
        }

        let accepted = match (&self.kind, value) {
            (ValueTypeKind::Boolean, Value::Boolean(_))
            | (ValueTypeKind::Number, Value::Number(_))
            | (ValueTypeKind::String, Value::String(_))
            | (ValueTypeKind::Object, Value::Object(_))
            | (ValueTypeKind::Date, Value::Date(_))
            | (ValueTypeKind::RegExp, Value::RegExp(_)) => true,
            (ValueTypeKind::Array(item), Value::Array(items)) => {
                let mut first_error = None;
                for item_value in items {
                    if let Err(err) = item.check_value(item_value, context) {
                        first_error.get_or_insert(err);
                    }
                }
                return match first_error {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            (
                ValueTypeKind::Component {
                    name,
                    is_class_reference: true,
                },
                Value::ComponentClass(class),
            ) => class_matches(class, name, context),
            (
                ValueTypeKind::Component {
                    name,
                    is_class_reference: false,
                },
                Value::Component(component),
            ) => class_matches(component.class(), name, context),
            _ => false,
        };

        if accepted {
            Ok(())
        } else {
            Err(self.mismatch(value, context))
        }
    }

    fn mismatch(&self, value: &Value, context: &AttributeContext<'_>) -> ComponentryError {
        ComponentryError::TypeMismatch {
            attribute: context.describe(),
            expected: self.to_string(),
            actual: value.type_name(),
        }
    }

    /// Narrow `selector` against a concrete value (or against no value at all).
    ///
    /// Scalars resolve to `true` unless the selector is `false`. Arrays resolve
    /// each item and aggregate according to `options.aggregation`; an empty array
    /// resolves as if no value were given. Component values delegate to the
    /// component itself.
    pub fn resolve_attribute_selector(
        &self,
        selector: &AttributeSelector,
        value: Option<&Value>,
        options: &ResolveOptions,
    ) -> AttributeSelector {
        if selector.is_none() {
            return AttributeSelector::none();
        }

        match &self.kind {
            ValueTypeKind::Array(item) => {
                let items = match value {
                    Some(Value::Array(items)) if !items.is_empty() => items,
                    _ => return item.resolve_attribute_selector(selector, None, options),
                };
                let mut resolved: Option<AttributeSelector> = None;
                for item_value in items {
                    let item_selector =
                        item.resolve_attribute_selector(selector, Some(item_value), options);
                    resolved = Some(match resolved {
                        None => item_selector,
                        Some(accumulated) => match options.aggregation {
                            SelectorAggregation::Union => accumulated.merge(&item_selector),
                            SelectorAggregation::Intersection => {
                                accumulated.intersect(&item_selector)
                            }
                        },
                    });
                }
                resolved.unwrap_or_else(AttributeSelector::none)
            }
            ValueTypeKind::Component {
                is_class_reference: false,
                ..
            } => match value {
                Some(Value::Component(component)) => {
                    if !options.include_referenced_components && component.class().is_referenceable()
                    {
                        return component.class().identifier_attribute_selector();
                    }
                    component.resolve_attribute_selector(selector, options)
                }
                _ => selector.normalize(),
            },
            _ => AttributeSelector::all(),
        }
    }

    /// Run attached validators (and nested ones) against `value`.
    ///
    /// An `undefined` value fails with the `required()` validator unless the type
    /// is optional, in which case nothing else runs.
    pub fn run_validators(&self, value: &Value, selector: &AttributeSelector) -> Vec<ValidationFailure> {
        if value.is_undefined() {
            if self.is_optional || matches!(self.kind, ValueTypeKind::Any) {
                return Vec::new();
            }
            return vec![ValidationFailure::new(required(), "")];
        }

        let mut failures: Vec<ValidationFailure> = self
            .validators
            .iter()
            .filter(|validator| !validator.run(value))
            .map(|validator| ValidationFailure::new(validator.clone(), ""))
            .collect();

        match (&self.kind, value) {
            (ValueTypeKind::Array(item), Value::Array(items)) => {
                for (index, item_value) in items.iter().enumerate() {
                    let segment = format!("[{}]", index);
                    failures.extend(
                        item.run_validators(item_value, selector)
                            .into_iter()
                            .map(|failure| failure.prefixed(&segment)),
                    );
                }
            }
            (
                ValueTypeKind::Component {
                    is_class_reference: false,
                    ..
                },
                Value::Component(component),
            ) => failures.extend(component.run_validators(selector)),
            _ => {}
        }

        failures
    }

    pub fn sanitize_value(&self, value: Value) -> Value {
        let value = match (&self.kind, value) {
            (ValueTypeKind::Array(item), Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item_value| item.sanitize_value(item_value))
                    .collect(),
            ),
            (_, value) => value,
        };
        self.sanitizers
            .iter()
            .fold(value, |value, sanitizer| sanitizer.run(value))
    }

    pub(crate) fn serialize_value(
        &self,
        value: &Value,
        selector: &AttributeSelector,
        serializer: &Serializer,
    ) -> Result<Value> {
        match (&self.kind, value) {
            (ValueTypeKind::Array(item), Value::Array(items)) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item_value| item.serialize_value(item_value, selector, serializer))
                    .collect::<Result<Vec<_>>>()?,
            )),
            _ => serializer.serialize(value, selector),
        }
    }
}

fn class_matches(class: &Rc<ComponentClass>, name: &str, context: &AttributeContext<'_>) -> bool {
    if let Some(owner) = context.owner {
        if let Ok(expected) = owner.get_component(name) {
            return class.is_same_or_fork_of(&expected);
        }
    }
    class.name() == name
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueTypeKind::Any => write!(f, "any")?,
            ValueTypeKind::Boolean => write!(f, "boolean")?,
            ValueTypeKind::Number => write!(f, "number")?,
            ValueTypeKind::String => write!(f, "string")?,
            ValueTypeKind::Object => write!(f, "object")?,
            ValueTypeKind::Date => write!(f, "Date")?,
            ValueTypeKind::RegExp => write!(f, "RegExp")?,
            ValueTypeKind::Array(item) => write!(f, "{}[]", item)?,
            ValueTypeKind::Component {
                name,
                is_class_reference,
            } => {
                if *is_class_reference {
                    write!(f, "typeof ")?;
                }
                write!(f, "{}", name)?;
            }
        }
        if self.is_optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::validation::{min_length, not_empty};
    use crate::attributes::sanitizer::{compact, trim};

    fn context() -> AttributeContext<'static> {
        AttributeContext::new("Movie", "ratings")
    }

    fn number(is_optional: bool) -> ValueType {
        ValueType::new(ValueTypeKind::Number, is_optional)
    }

    fn array_of(item: ValueType, is_optional: bool) -> ValueType {
        ValueType::new(ValueTypeKind::Array(Box::new(item)), is_optional)
    }

    fn mismatch_expected(result: Result<()>) -> String {
        match result {
            Err(ComponentryError::TypeMismatch { expected, .. }) => expected,
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn scalars_check_their_runtime_type() {
        let ctx = context();
        assert!(number(false).check_value(&Value::from(1), &ctx).is_ok());
        assert!(number(false).check_value(&Value::from("1"), &ctx).is_err());
        assert!(ValueType::new(ValueTypeKind::String, false)
            .check_value(&Value::from("x"), &ctx)
            .is_ok());
        assert!(ValueType::new(ValueTypeKind::Object, false)
            .check_value(&Value::Null, &ctx)
            .is_err());
    }

    #[test]
    fn any_accepts_undefined_even_when_required() {
        let any = ValueType::new(ValueTypeKind::Any, false);
        assert!(any.check_value(&Value::Undefined, &context()).is_ok());
        assert!(any.check_value(&Value::Null, &context()).is_ok());
    }

    #[test]
    fn mismatch_names_attribute_and_types() {
        let err = number(false)
            .check_value(&Value::from("x"), &context())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot assign a value of type 'string' to Movie.ratings (expected type: 'number')"
        );
    }

    #[test]
    fn array_item_errors_cite_the_item_type() {
        let ratings = array_of(number(false), false);
        let ctx = context();
        assert_eq!(
            mismatch_expected(ratings.check_value(&Value::from(vec![Value::from(1), Value::Undefined]), &ctx)),
            "number"
        );
        assert_eq!(
            mismatch_expected(ratings.check_value(&Value::from(vec![Value::Undefined, Value::from(1)]), &ctx)),
            "number"
        );
        assert_eq!(
            mismatch_expected(ratings.check_value(&Value::from(1), &ctx)),
            "number[]"
        );
    }

    #[test]
    fn array_and_item_optionality_are_independent() {
        let ctx = context();
        let both = array_of(number(true), true);
        assert!(both.check_value(&Value::Undefined, &ctx).is_ok());
        assert!(both.check_value(&Value::from(vec![Value::Undefined]), &ctx).is_ok());
        assert!(both
            .check_value(&Value::from(vec![Value::from(1), Value::Undefined]), &ctx)
            .is_ok());

        let array_only = array_of(number(false), true);
        assert!(array_only.check_value(&Value::Undefined, &ctx).is_ok());
        assert_eq!(
            mismatch_expected(array_only.check_value(&Value::from(vec![Value::Undefined]), &ctx)),
            "number"
        );
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(array_of(number(true), true).to_string(), "number?[]?");
        assert_eq!(array_of(number(false), true).to_string(), "number[]?");
        assert_eq!(array_of(number(true), false).to_string(), "number?[]");
        assert_eq!(
            array_of(array_of(number(false), false), false).to_string(),
            "number[][]"
        );
        let class_reference = ValueType::new(
            ValueTypeKind::Component {
                name: "Movie".into(),
                is_class_reference: true,
            },
            true,
        );
        assert_eq!(class_reference.to_string(), "typeof Movie?");
    }

    #[test]
    fn scalar_selector_resolution() {
        let options = ResolveOptions::default();
        assert!(number(false)
            .resolve_attribute_selector(&AttributeSelector::empty(), None, &options)
            .is_all());
        assert!(number(false)
            .resolve_attribute_selector(&AttributeSelector::none(), None, &options)
            .is_none());
    }

    #[test]
    fn validators_report_paths_for_array_items() {
        let tags = array_of(
            ValueType::new(ValueTypeKind::String, false).with_validators(vec![not_empty()]),
            false,
        )
        .with_validators(vec![min_length(1)]);

        let failures = tags.run_validators(
            &Value::from(vec![Value::from("a"), Value::from(""), Value::Undefined]),
            &AttributeSelector::all(),
        );
        let paths: Vec<_> = failures.iter().map(|failure| failure.path.as_str()).collect();
        assert_eq!(paths, vec!["[1]", "[2]"]);
        assert_eq!(failures[0].validator.name(), "notEmpty");
        assert_eq!(failures[1].validator.name(), "required");
    }

    #[test]
    fn undefined_skips_validators_when_optional() {
        let title = ValueType::new(ValueTypeKind::String, true).with_validators(vec![not_empty()]);
        assert!(title
            .run_validators(&Value::Undefined, &AttributeSelector::all())
            .is_empty());

        let required_title = ValueType::new(ValueTypeKind::String, false);
        let failures = required_title.run_validators(&Value::Undefined, &AttributeSelector::all());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].validator.name(), "required");
    }

    #[test]
    fn sanitizers_run_on_items_first() {
        let tags = array_of(
            ValueType::new(ValueTypeKind::String, false).with_sanitizers(vec![trim()]),
            false,
        )
        .with_sanitizers(vec![compact()]);

        let sanitized = tags.sanitize_value(Value::from(vec![
            Value::from(" a "),
            Value::from("   "),
            Value::from("b"),
        ]));
        assert_eq!(sanitized, Value::from(vec![Value::from("a"), Value::from("b")]));
    }
}
