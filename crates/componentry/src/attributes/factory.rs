//! Parsing of type specifiers into [`ValueType`] trees.
//!
//! ```text
//! specifier  := element "?"?
//! element    := specifier "[]" | scalar | component
//! scalar     := "any" | "boolean" | "number" | "string" | "object" | "Date" | "RegExp"
//! component  := "typeof "? Name
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ComponentryError, Result};

use super::sanitizer::Sanitizer;
use super::validation::Validator;
use super::value_type::{AttributeContext, ValueType, ValueTypeKind};

static COMPONENT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(typeof )?([A-Z][A-Za-z0-9_]*)$").expect("component type pattern is valid")
});

/// Validators and sanitizers to attach while building a value type.
///
/// `items` applies to the item type of an array, and nests for arrays of arrays.
#[derive(Debug, Clone, Default)]
pub struct TypeOptions {
    pub validators: Vec<Validator>,
    pub sanitizers: Vec<Sanitizer>,
    pub items: Option<Box<TypeOptions>>,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizers.push(sanitizer);
        self
    }

    pub fn items(mut self, items: TypeOptions) -> Self {
        self.items = Some(Box::new(items));
        self
    }
}

/// Build a value type from a specifier.
///
/// A missing or empty specifier means `any`.
pub fn create_value_type(
    specifier: Option<&str>,
    context: &AttributeContext<'_>,
    options: TypeOptions,
) -> Result<ValueType> {
    let raw = specifier.unwrap_or("");
    let raw = if raw.is_empty() { "any" } else { raw };

    let (bare, is_optional) = match raw.strip_suffix('?') {
        Some("") => ("any", true),
        Some(stripped) => (stripped, true),
        None => (raw, false),
    };

    let TypeOptions {
        validators,
        sanitizers,
        items,
    } = options;

    if let Some(item_specifier) = bare.strip_suffix("[]") {
        let item_options = items.map(|items| *items).unwrap_or_default();
        let item = create_value_type(Some(item_specifier), context, item_options)?;
        return Ok(ValueType::new(ValueTypeKind::Array(Box::new(item)), is_optional)
            .with_validators(validators)
            .with_sanitizers(sanitizers));
    }

    if items.is_some() {
        return Err(ComponentryError::UnexpectedItemsOption {
            attribute: context.describe(),
            specifier: raw.to_string(),
        });
    }

    let kind = match bare {
        "any" => ValueTypeKind::Any,
        "boolean" => ValueTypeKind::Boolean,
        "number" => ValueTypeKind::Number,
        "string" => ValueTypeKind::String,
        "object" => ValueTypeKind::Object,
        "Date" => ValueTypeKind::Date,
        "RegExp" => ValueTypeKind::RegExp,
        other => {
            let captures = COMPONENT_TYPE.captures(other).ok_or_else(|| {
                ComponentryError::InvalidTypeSpecifier {
                    attribute: context.describe(),
                    specifier: raw.to_string(),
                }
            })?;
            ValueTypeKind::Component {
                name: captures[2].to_string(),
                is_class_reference: captures.get(1).is_some(),
            }
        }
    };

    Ok(ValueType::new(kind, is_optional)
        .with_validators(validators)
        .with_sanitizers(sanitizers))
}
