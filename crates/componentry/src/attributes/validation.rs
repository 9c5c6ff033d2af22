//! Value-level validators.
//!
//! Validators attach to a [`ValueType`](super::ValueType) node and run against
//! the values it holds. Failures are reported as [`ValidationFailure`]s with the
//! attribute path where they happened (`title`, `director.name`, `tags[2]`).

use std::rc::Rc;

use crate::value::{RegExp, Value};

type ValidatorFn = dyn Fn(&Value, &[Value]) -> bool;

/// A named predicate with arguments.
#[derive(Clone)]
pub struct Validator {
    name: String,
    arguments: Vec<Value>,
    message: Option<String>,
    function: Rc<ValidatorFn>,
}

impl Validator {
    pub fn new(name: impl Into<String>, function: impl Fn(&Value, &[Value]) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            message: None,
            function: Rc::new(function),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Replace the default failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn run(&self, value: &Value) -> bool {
        (self.function)(value, &self.arguments)
    }

    /// `minLength(3)`, `notEmpty()`, ...
    pub fn signature(&self) -> String {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, arguments)
    }

    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("The validator `{}` failed", self.signature()))
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("signature", &self.signature())
            .finish()
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arguments == other.arguments
    }
}

/// A validator that did not pass, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub validator: Validator,
    pub path: String,
}

impl ValidationFailure {
    pub fn new(validator: Validator, path: impl Into<String>) -> Self {
        Self {
            validator,
            path: path.into(),
        }
    }

    /// Prefix the failure path with a parent segment.
    pub fn prefixed(mut self, segment: &str) -> Self {
        self.path = join_attribute_path(&[segment, &self.path]);
        self
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.validator.message())
        } else {
            write!(f, "{} (path: '{}')", self.validator.message(), self.path)
        }
    }
}

/// Join attribute path segments: `["director", "name"]` gives `director.name`,
/// `["tags", "[2]"]` gives `tags[2]`. Empty segments are skipped.
pub fn join_attribute_path(segments: &[&str]) -> String {
    let mut joined = String::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() && !segment.starts_with('[') {
            joined.push('.');
        }
        joined.push_str(segment);
    }
    joined
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(string) => Some(string.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn number_argument(arguments: &[Value], index: usize) -> f64 {
    arguments
        .get(index)
        .and_then(Value::as_f64)
        .unwrap_or(f64::NAN)
}

/// Fails on `undefined`. Attached implicitly to every non-optional attribute.
pub fn required() -> Validator {
    Validator::new("required", |value, _| !value.is_undefined())
        .with_message("A required value is missing")
}

/// Strings and arrays must not be empty.
pub fn not_empty() -> Validator {
    Validator::new("notEmpty", |value, _| {
        length_of(value).map(|length| length > 0).unwrap_or(false)
    })
}

pub fn min_length(min: usize) -> Validator {
    Validator::new("minLength", |value, arguments| {
        let min = number_argument(arguments, 0);
        length_of(value)
            .map(|length| length as f64 >= min)
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(min)])
}

pub fn max_length(max: usize) -> Validator {
    Validator::new("maxLength", |value, arguments| {
        let max = number_argument(arguments, 0);
        length_of(value)
            .map(|length| length as f64 <= max)
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(max)])
}

pub fn range_length(min: usize, max: usize) -> Validator {
    Validator::new("rangeLength", |value, arguments| {
        let (min, max) = (number_argument(arguments, 0), number_argument(arguments, 1));
        length_of(value)
            .map(|length| length as f64 >= min && length as f64 <= max)
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(min), Value::from(max)])
}

pub fn min_value(min: f64) -> Validator {
    Validator::new("minValue", |value, arguments| {
        value
            .as_f64()
            .map(|number| number >= number_argument(arguments, 0))
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(min)])
}

pub fn max_value(max: f64) -> Validator {
    Validator::new("maxValue", |value, arguments| {
        value
            .as_f64()
            .map(|number| number <= number_argument(arguments, 0))
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(max)])
}

pub fn range(min: f64, max: f64) -> Validator {
    Validator::new("range", |value, arguments| {
        value
            .as_f64()
            .map(|number| {
                number >= number_argument(arguments, 0) && number <= number_argument(arguments, 1)
            })
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::from(min), Value::from(max)])
}

pub fn integer() -> Validator {
    Validator::new("integer", |value, _| {
        value
            .as_f64()
            .map(|number| number.is_finite() && number.fract() == 0.0)
            .unwrap_or(false)
    })
}

pub fn positive() -> Validator {
    Validator::new("positive", |value, _| {
        value.as_f64().map(|number| number > 0.0).unwrap_or(false)
    })
}

pub fn negative() -> Validator {
    Validator::new("negative", |value, _| {
        value.as_f64().map(|number| number < 0.0).unwrap_or(false)
    })
}

pub fn any_of(values: Vec<Value>) -> Validator {
    Validator::new("anyOf", |value, arguments| arguments.contains(value)).with_arguments(values)
}

pub fn none_of(values: Vec<Value>) -> Validator {
    Validator::new("noneOf", |value, arguments| !arguments.contains(value)).with_arguments(values)
}

/// Strings must match the regular expression.
pub fn matches(regexp: RegExp) -> Validator {
    Validator::new("match", |value, arguments| {
        let (Some(Value::RegExp(regexp)), Some(string)) = (arguments.first(), value.as_str()) else {
            return false;
        };
        regexp
            .to_regex()
            .map(|regex| regex.is_match(string))
            .unwrap_or(false)
    })
    .with_arguments(vec![Value::RegExp(regexp)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_indexes_and_empty_segments() {
        assert_eq!(join_attribute_path(&["director", "name"]), "director.name");
        assert_eq!(join_attribute_path(&["tags", "[2]"]), "tags[2]");
        assert_eq!(join_attribute_path(&["", "title"]), "title");
        assert_eq!(join_attribute_path(&["[0]", "[1]"]), "[0][1]");
        assert_eq!(join_attribute_path(&["title", ""]), "title");
    }

    #[test]
    fn signature_lists_arguments() {
        assert_eq!(min_length(3).signature(), "minLength(3)");
        assert_eq!(not_empty().signature(), "notEmpty()");
        assert_eq!(range_length(1, 5).signature(), "rangeLength(1, 5)");
    }

    #[test]
    fn length_validators() {
        assert!(not_empty().run(&Value::from("x")));
        assert!(!not_empty().run(&Value::from("")));
        assert!(!not_empty().run(&Value::Array(vec![])));
        assert!(min_length(2).run(&Value::from("ab")));
        assert!(!min_length(2).run(&Value::from("a")));
        assert!(max_length(2).run(&Value::Array(vec![Value::from(1)])));
        assert!(!max_length(1).run(&Value::from("héllo")));
        assert!(range_length(1, 3).run(&Value::from("abc")));
        assert!(!range_length(1, 3).run(&Value::from(3)));
    }

    #[test]
    fn numeric_validators() {
        assert!(min_value(1.0).run(&Value::from(1)));
        assert!(!min_value(1.0).run(&Value::from(0)));
        assert!(max_value(10.0).run(&Value::from(10)));
        assert!(range(1.0, 2.0).run(&Value::from(1.5)));
        assert!(integer().run(&Value::from(2010)));
        assert!(!integer().run(&Value::from(1.5)));
        assert!(positive().run(&Value::from(1)));
        assert!(!positive().run(&Value::from(0)));
        assert!(negative().run(&Value::from(-1)));
    }

    #[test]
    fn membership_validators() {
        let genres = vec![Value::from("drama"), Value::from("comedy")];
        assert!(any_of(genres.clone()).run(&Value::from("drama")));
        assert!(!any_of(genres.clone()).run(&Value::from("horror")));
        assert!(none_of(genres).run(&Value::from("horror")));
    }

    #[test]
    fn match_validator() {
        let validator = matches(RegExp::new("^[a-z]+$", ""));
        assert!(validator.run(&Value::from("abc")));
        assert!(!validator.run(&Value::from("Abc")));
        assert!(!validator.run(&Value::from(1)));
    }

    #[test]
    fn required_rejects_undefined_only() {
        assert!(!required().run(&Value::Undefined));
        assert!(required().run(&Value::Null));
        assert!(required().run(&Value::from("")));
    }

    #[test]
    fn failure_display_includes_path() {
        let failure = ValidationFailure::new(not_empty(), "").prefixed("title");
        assert_eq!(failure.path, "title");
        assert_eq!(
            failure.to_string(),
            "The validator `notEmpty()` failed (path: 'title')"
        );
    }

    #[test]
    fn custom_message_overrides_default() {
        let validator = not_empty().with_message("Title is required");
        assert_eq!(validator.message(), "Title is required");
    }
}
