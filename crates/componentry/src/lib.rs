//! # Componentry Architecture
//!
//! Componentry is a **typed component model with pluggable persistence**. A
//! component class declares typed attributes; instances are checked on every
//! assignment, validated on demand, serialized to tagged plain trees, and
//! saved to any document store that implements a small backend contract.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Store (store/mod.rs)                                       │
//! │  - load / save / delete / find / count / migrate            │
//! │  - Registration, tracing, new/persisted state               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Document Layer (store/document, query, schema)             │
//! │  - Projections and patches from selectors and documents     │
//! │  - Query compilation into flat expressions                  │
//! │  - Index schemas derived from classes                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Backend (store/backend.rs)                                 │
//! │  - Abstract StoreBackend trait                              │
//! │  - MemoryBackend (testing)                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Underneath the store sit the component model ([`component`]), the attribute
//! type algebra ([`attributes`]) and the serialization engine
//! ([`serialization`]). None of them perform I/O.
//!
//! ## Example
//!
//! ```ignore
//! use componentry::prelude::*;
//!
//! let movie = ComponentClass::builder("Movie")
//!     .attribute(AttributeDeclaration::primary_identifier("id", "string"))
//!     .attribute(AttributeDeclaration::new("title", "string").validator(not_empty()))
//!     .storable()
//!     .build()?;
//! let registry = ComponentRegistry::with_components([&movie])?;
//!
//! let store = Store::new(MemoryBackend::new());
//! store.register_root_component(&registry)?;
//!
//! let inception = Component::create(&movie, [("title", "Inception".into())])?;
//! store.save(&inception, SaveOptions::default())?;
//! ```
//!
//! ## Module Overview
//!
//! - [`value`]: The dynamic runtime value and its JSON wire form
//! - [`attributes`]: Value types, the type factory, selectors, validators, sanitizers
//! - [`component`]: Component classes, instances, registries and forks
//! - [`serialization`]: Component graphs to tagged trees and back
//! - [`store`]: Persistence through an abstract backend
//! - [`config`]: Store configuration
//! - [`error`]: Error types

pub mod attributes;
pub mod component;
pub mod config;
pub mod error;
pub mod serialization;
pub mod store;
pub mod value;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{ComponentryError, Result, StoreErrorCode};
pub use value::{Object, RegExp, Value};

pub mod prelude {
    pub use crate::attributes::validation::{
        any_of, integer, matches, max_length, max_value, min_length, min_value, negative,
        none_of, not_empty, positive, range, range_length, required,
    };
    pub use crate::attributes::sanitizer::{compact, trim};
    pub use crate::attributes::{AttributeSelector, TypeOptions};
    pub use crate::component::{
        AttributeDeclaration, Component, ComponentClass, ComponentRegistry, IndexDeclaration,
        ValueSource,
    };
    pub use crate::config::StoreConfig;
    pub use crate::error::{ComponentryError, Result, StoreErrorCode};
    pub use crate::serialization::{
        deserialize, serialize, DeserializeOptions, SerializationTarget, SerializeOptions,
    };
    pub use crate::store::mem_backend::MemoryBackend;
    pub use crate::store::schema::SortDirection;
    pub use crate::store::{
        DeleteOptions, FindOptions, LoadOptions, SaveOptions, Store,
    };
    pub use crate::value::{Object, RegExp, Value};
}
