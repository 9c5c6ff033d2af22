use thiserror::Error;

use crate::attributes::ValidationFailure;

/// Machine-readable codes carried by store domain errors.
///
/// Callers are expected to branch on these rather than on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorCode {
    ComponentIsMissingFromStore,
    ComponentAlreadyExistsInStore,
    UniqueAttributeAlreadyExistsInStore,
}

impl StoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorCode::ComponentIsMissingFromStore => "COMPONENT_IS_MISSING_FROM_STORE",
            StoreErrorCode::ComponentAlreadyExistsInStore => "COMPONENT_ALREADY_EXISTS_IN_STORE",
            StoreErrorCode::UniqueAttributeAlreadyExistsInStore => {
                "UNIQUE_ATTRIBUTE_ALREADY_EXISTS_IN_STORE"
            }
        }
    }
}

impl std::fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ComponentryError {
    #[error("Cannot assign a value of type '{actual}' to {attribute} (expected type: '{expected}')")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("The specified type is invalid (attribute: '{attribute}', type: '{specifier}')")]
    InvalidTypeSpecifier {
        attribute: String,
        specifier: String,
    },

    #[error(
        "The 'items' option cannot be specified for a type that is not an array (attribute: '{attribute}', type: '{specifier}')"
    )]
    UnexpectedItemsOption {
        attribute: String,
        specifier: String,
    },

    #[error("Invalid attribute selector: {0}")]
    InvalidAttributeSelector(String),

    #[error("The attribute '{attribute}' does not exist in component '{component}'")]
    UnknownAttribute { component: String, attribute: String },

    #[error("Cannot get the value of an unset attribute ({0})")]
    UnsetAttribute(String),

    #[error("Cannot get the component '{name}' from '{from}'")]
    UnknownComponent { name: String, from: String },

    #[error("Invalid component definition: {0}")]
    InvalidComponent(String),

    #[error("Cannot get an identifier descriptor from component '{0}' (no identifier is set)")]
    MissingIdentifier(String),

    #[error("The following error(s) occurred while validating the component '{}': {}", .component, describe_failures(.failures))]
    Validation {
        component: String,
        failures: Vec<ValidationFailure>,
    },

    #[error("A query must be an object (query: {0})")]
    InvalidQuery(String),

    #[error("The operator '{operator}' cannot be used at the root of a query (query: {query})")]
    QueryOperatorAtRoot { operator: String, query: String },

    #[error("A subquery cannot mix attribute names and operators (subquery: {0})")]
    QueryMixedKeys(String),

    #[error("An unexpected object was found in a query (operator: '{operator}', operand: {operand})")]
    UnexpectedQueryObject { operator: String, operand: String },

    #[error("The operator '{operator}' is not supported (query: {query})")]
    UnknownQueryOperator { operator: String, query: String },

    #[error("The operator '{operator}' expects {expected} (operand: {operand})")]
    InvalidQueryOperand {
        operator: String,
        expected: &'static str,
        operand: String,
    },

    #[error("{message}")]
    Store {
        code: StoreErrorCode,
        message: String,
        index_name: Option<String>,
    },

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Duplicate key in collection '{collection}' (index: '{index_name}')")]
    DuplicateKey {
        collection: String,
        index_name: String,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ComponentryError {
    /// Returns the store error code, if this is a store domain error.
    pub fn code(&self) -> Option<StoreErrorCode> {
        match self {
            ComponentryError::Store { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn store(code: StoreErrorCode, message: impl Into<String>) -> Self {
        ComponentryError::Store {
            code,
            message: message.into(),
            index_name: None,
        }
    }
}

fn describe_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ComponentryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_exposes_code() {
        let err = ComponentryError::store(
            StoreErrorCode::ComponentIsMissingFromStore,
            "Cannot load a component that is missing from the store",
        );
        assert_eq!(err.code(), Some(StoreErrorCode::ComponentIsMissingFromStore));
        assert!(err.to_string().contains("missing from the store"));
    }

    #[test]
    fn non_store_errors_have_no_code() {
        let err = ComponentryError::UnsetAttribute("Movie.title".into());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn code_strings_are_stable() {
        assert_eq!(
            StoreErrorCode::ComponentIsMissingFromStore.as_str(),
            "COMPONENT_IS_MISSING_FROM_STORE"
        );
        assert_eq!(
            StoreErrorCode::ComponentAlreadyExistsInStore.to_string(),
            "COMPONENT_ALREADY_EXISTS_IN_STORE"
        );
        assert_eq!(
            StoreErrorCode::UniqueAttributeAlreadyExistsInStore.as_str(),
            "UNIQUE_ATTRIBUTE_ALREADY_EXISTS_IN_STORE"
        );
    }

    #[test]
    fn type_mismatch_display() {
        let err = ComponentryError::TypeMismatch {
            attribute: "Movie.year".into(),
            expected: "number".into(),
            actual: "string".into(),
        };
        let message = err.to_string();
        assert!(message.contains("Movie.year"));
        assert!(message.contains("'number'"));
        assert!(message.contains("'string'"));
    }
}
