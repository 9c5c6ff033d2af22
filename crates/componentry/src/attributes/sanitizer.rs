//! Value sanitizers.
//!
//! Sanitizers run when a value is assigned to an attribute, before the value is
//! type-checked. They never fail: a sanitizer that does not apply to the value it
//! receives returns it unchanged.

use std::rc::Rc;

use crate::value::Value;

type SanitizerFn = dyn Fn(Value) -> Value;

#[derive(Clone)]
pub struct Sanitizer {
    name: String,
    function: Rc<SanitizerFn>,
}

impl Sanitizer {
    pub fn new(name: impl Into<String>, function: impl Fn(Value) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            function: Rc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, value: Value) -> Value {
        (self.function)(value)
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sanitizer({})", self.name)
    }
}

impl PartialEq for Sanitizer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Trim leading and trailing whitespace from strings.
pub fn trim() -> Sanitizer {
    Sanitizer::new("trim", |value| match value {
        Value::String(string) => Value::String(string.trim().to_string()),
        other => other,
    })
}

/// Remove `undefined`, `null` and empty-string items from arrays.
pub fn compact() -> Sanitizer {
    Sanitizer::new("compact", |value| match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| match item {
                    Value::Undefined | Value::Null => false,
                    Value::String(string) => !string.is_empty(),
                    _ => true,
                })
                .collect(),
        ),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_only_touches_strings() {
        assert_eq!(trim().run(Value::from("  hi ")), Value::from("hi"));
        assert_eq!(trim().run(Value::from(3)), Value::from(3));
    }

    #[test]
    fn compact_drops_empty_items() {
        let value = Value::Array(vec![
            Value::from("a"),
            Value::Undefined,
            Value::from(""),
            Value::Null,
            Value::from(0),
        ]);
        assert_eq!(
            compact().run(value),
            Value::Array(vec![Value::from("a"), Value::from(0)])
        );
    }

    #[test]
    fn compact_ignores_non_arrays() {
        assert_eq!(compact().run(Value::from("")), Value::from(""));
    }
}
