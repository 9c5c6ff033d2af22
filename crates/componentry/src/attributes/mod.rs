//! # Attribute Type System
//!
//! Every attribute declared on a component class carries a [`ValueType`]: a
//! node in a small type algebra that checks assigned values, runs validators and
//! sanitizers, and narrows [`AttributeSelector`]s against concrete values.
//!
//! ## Type Specifiers
//!
//! Value types are written as compact specifiers and parsed by
//! [`create_value_type`]:
//!
//! | Specifier | Meaning |
//! |-----------|---------|
//! | `string` | required string |
//! | `number?` | optional number |
//! | `number?[]?` | optional array of optional numbers |
//! | `Person` | instance of the `Person` component (or a fork of it) |
//! | `typeof Movie` | the `Movie` class itself |
//!
//! The canonical form produced by `Display` parses back to the same tree.
//!
//! ## Attribute Selectors
//!
//! [`AttributeSelector`] masks which attributes of a component graph take part
//! in an operation. Selectors form a lattice under
//! [`merge`](AttributeSelector::merge) and
//! [`intersect`](AttributeSelector::intersect) and can [`pick`] matching paths
//! out of plain values.
//!
//! ## Modules
//!
//! - [`value_type`]: the type algebra
//! - [`factory`]: specifier parsing
//! - [`selector`]: selector algebra
//! - [`validation`]: validators and failure paths
//! - [`sanitizer`]: sanitizers

pub mod factory;
pub mod sanitizer;
pub mod selector;
pub mod validation;
pub mod value_type;

pub use factory::{create_value_type, TypeOptions};
pub use sanitizer::Sanitizer;
pub use selector::{pick, AttributeSelector};
pub use validation::{ValidationFailure, Validator};
pub use value_type::{
    AttributeContext, ResolveOptions, SelectorAggregation, ValueType, ValueTypeKind,
};
