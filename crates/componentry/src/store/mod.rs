//! # Store
//!
//! [`Store`] persists storable components through a [`StoreBackend`]. The
//! backend only sees documents, expressions and projections; the store owns
//! everything about components: selectors, validation, serialization, and the
//! new/persisted state of each instance.
//!
//! ## Lifecycle
//!
//! ```text
//!   Component::create ──► New ──save()──► Persisted ──save()──► Persisted
//!                          ▲                  │
//!                          └─────delete()─────┘
//! ```
//!
//! `load()` refreshes attributes from either state.
//!
//! ## Options
//!
//! | Operation | Option | Default |
//! |-----------|--------|---------|
//! | `load` | `attribute_selector` | `true` (identifiers are always added) |
//! | `load` | `throw_if_missing` | `true` |
//! | `save` | `attribute_selector` | `true` |
//! | `save` | `throw_if_missing` | `!is_new` |
//! | `save` | `throw_if_exists` | `is_new` |
//! | `delete` | `throw_if_missing` | `true` |
//! | `find` | `attribute_selector` | `false` (identifiers only) |
//!
//! Operations that do not throw on a missing (or existing) document return
//! `Ok(None)` instead.
//!
//! ## Registration
//!
//! Storable classes become known to a store through
//! [`Store::register_root_component`], which registers every class of a
//! [`ComponentRegistry`]. A storable class belongs to at most one store.
//!
//! ## Collections
//!
//! Each storable class maps to one collection named after the class, prefixed
//! with [`StoreConfig::collection_prefix`].

pub mod backend;
pub mod document;
pub mod mem_backend;
pub mod query;
pub mod schema;
pub mod trace;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::attributes::{pick, AttributeSelector, ResolveOptions, ValueTypeKind};
use crate::component::{visit_components, Component, ComponentClass, ComponentRegistry, ValueSource};
use crate::config::StoreConfig;
use crate::error::{ComponentryError, Result, StoreErrorCode};
use crate::serialization::{
    deserialize_into, serialize, DeserializeOptions, SerializeOptions, COMPONENT_FIELD,
};
use crate::value::{Object, Value};

use self::backend::{
    CountDocumentsParams, CreateDocumentParams, DeleteDocumentParams, FindDocumentsParams,
    MigrateCollectionParams, MigrateCollectionResult, ReadDocumentParams, StoreBackend,
    UpdateDocumentParams,
};
use self::document::{build_document_patch, build_projection, strip_undefined_fields};
use self::query::{to_document_expressions, Expression};
use self::schema::{get_collection_schema, SortDirection};
use self::trace::{TraceEntry, TraceOutcome};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub attribute_selector: AttributeSelector,
    pub throw_if_missing: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            attribute_selector: AttributeSelector::all(),
            throw_if_missing: true,
        }
    }
}

impl LoadOptions {
    pub fn selecting(attribute_selector: AttributeSelector) -> Self {
        Self {
            attribute_selector,
            ..Default::default()
        }
    }
}

/// `None` flags default from the storable's new state.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub attribute_selector: AttributeSelector,
    pub throw_if_missing: Option<bool>,
    pub throw_if_exists: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub throw_if_missing: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            throw_if_missing: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Attributes to load after the query; `false` leaves identifiers only.
    pub attribute_selector: AttributeSelector,
    pub sort: IndexMap<String, SortDirection>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            attribute_selector: AttributeSelector::none(),
            sort: IndexMap::new(),
            skip: None,
            limit: None,
        }
    }
}

pub struct Store<B: StoreBackend> {
    backend: B,
    config: StoreConfig,
    id: u64,
    registry: ComponentRegistry,
    root_components: RefCell<Vec<ComponentRegistry>>,
    storables: RefCell<IndexMap<String, Rc<ComponentClass>>>,
    trace: RefCell<Option<Vec<TraceEntry>>>,
}

impl<B: StoreBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        let trace = config.trace.then(Vec::new);
        Self {
            backend,
            config,
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            registry: ComponentRegistry::new(),
            root_components: RefCell::new(Vec::new()),
            storables: RefCell::new(IndexMap::new()),
            trace: RefCell::new(trace),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Registration ---

    /// Register every class of `registry`; storable ones get a collection.
    /// Registering the same registry twice is a no-op.
    pub fn register_root_component(&self, registry: &ComponentRegistry) -> Result<()> {
        if self
            .root_components
            .borrow()
            .iter()
            .any(|registered| registered.ptr_eq(registry))
        {
            return Ok(());
        }

        // Validate the whole graph before registering anything.
        let classes = registry.components();
        for class in &classes {
            if let Some(existing) = self.registry.get(class.name()) {
                if !Rc::ptr_eq(&existing, class) {
                    return Err(ComponentryError::Registration(format!(
                        "A component with the same name is already registered (component: '{}')",
                        class.name()
                    )));
                }
            }
            if class.is_storable() {
                self.check_storable(class)?;
            }
        }

        for class in &classes {
            self.registry.register(class)?;
            if class.is_storable() {
                self.register_storable(class)?;
            }
        }
        self.root_components.borrow_mut().push(registry.clone());
        Ok(())
    }

    pub fn register_storable(&self, class: &Rc<ComponentClass>) -> Result<()> {
        if self.check_storable(class)? {
            return Ok(());
        }

        if !self.registry.contains(class.name()) {
            self.registry.register(class)?;
        }
        class.set_store_id(self.id);
        self.storables
            .borrow_mut()
            .insert(class.name().to_string(), Rc::clone(class));
        info!(
            component = class.name(),
            collection = %self.collection_name(class),
            "Registered storable"
        );
        Ok(())
    }

    /// Ok(true) when `class` is already registered here.
    fn check_storable(&self, class: &Rc<ComponentClass>) -> Result<bool> {
        if !class.is_storable() {
            return Err(ComponentryError::Registration(format!(
                "Cannot register a component that is not storable (component: '{}')",
                class.name()
            )));
        }
        if let Some(registered) = self.storables.borrow().get(class.name()) {
            if Rc::ptr_eq(registered, class) {
                return Ok(true);
            }
            return Err(ComponentryError::Registration(format!(
                "A storable component with the same name is already registered (component: '{}')",
                class.name()
            )));
        }
        if class.store_id().is_some_and(|store_id| store_id != self.id) {
            return Err(ComponentryError::Registration(format!(
                "Cannot register a storable component that is already registered in another store (component: '{}')",
                class.name()
            )));
        }
        Ok(false)
    }

    pub fn get_storable(&self, name: &str) -> Result<Rc<ComponentClass>> {
        self.storables
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentryError::UnknownComponent {
                name: name.to_string(),
                from: "store".to_string(),
            })
    }

    pub fn storables(&self) -> Vec<Rc<ComponentClass>> {
        self.storables.borrow().values().cloned().collect()
    }

    /// The store's view of every registered class, used to rebuild references.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn is_registered(&self, class: &ComponentClass) -> bool {
        self.storables
            .borrow()
            .get(class.name())
            .is_some_and(|registered| class.is_same_or_fork_of(registered))
    }

    fn check_registered(&self, class: &ComponentClass) -> Result<()> {
        if self.is_registered(class) {
            return Ok(());
        }
        Err(ComponentryError::Registration(format!(
            "The storable component '{}' is not registered in this store",
            class.name()
        )))
    }

    pub fn collection_name(&self, class: &ComponentClass) -> String {
        self.config.collection_name(class.name())
    }

    // --- Tracing ---

    pub fn start_trace(&self) {
        *self.trace.borrow_mut() = Some(Vec::new());
    }

    /// Stop tracing and return what was recorded.
    pub fn stop_trace(&self) -> Vec<TraceEntry> {
        self.trace.borrow_mut().take().unwrap_or_default()
    }

    pub fn get_trace(&self) -> Vec<TraceEntry> {
        self.trace.borrow().clone().unwrap_or_default()
    }

    pub fn is_tracing(&self) -> bool {
        self.trace.borrow().is_some()
    }

    fn traced<T: TraceValue>(
        &self,
        operation: &'static str,
        params: impl FnOnce() -> Vec<Value>,
        run: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        if !self.is_tracing() {
            return run();
        }
        let params = params();
        let result = run();
        let outcome = match &result {
            Ok(value) => TraceOutcome::Result(value.trace_value()),
            Err(err) => TraceOutcome::from_error(err),
        };
        if let Some(trace) = self.trace.borrow_mut().as_mut() {
            trace.push(TraceEntry {
                operation,
                params,
                outcome,
            });
        }
        result
    }

    // --- Operations ---

    /// Read the selected attributes of `storable` from its collection.
    ///
    /// Referenced storables reached through the selector are loaded from their
    /// own collections; missing ones are left with their identifiers only.
    pub fn load(&self, storable: &Component, options: LoadOptions) -> Result<Option<Component>> {
        self.traced(
            "load",
            || {
                vec![
                    Value::Component(storable.clone()),
                    Value::object([
                        ("attributeSelector", options.attribute_selector.to_value()),
                        ("throwIfMissing", Value::from(options.throw_if_missing)),
                    ]),
                ]
            },
            || {
                self.load_storable(
                    storable,
                    &options.attribute_selector,
                    options.throw_if_missing,
                    &mut Vec::new(),
                )
            },
        )
    }

    fn load_storable(
        &self,
        storable: &Component,
        attribute_selector: &AttributeSelector,
        throw_if_missing: bool,
        visited: &mut Vec<(String, Object)>,
    ) -> Result<Option<Component>> {
        let class = storable.class();
        self.check_registered(class)?;
        let identifier_descriptor = storable.identifier_descriptor()?;
        let collection_name = self.collection_name(class);

        let key = (collection_name.clone(), identifier_descriptor.clone());
        if visited.contains(&key) {
            return Ok(Some(storable.clone()));
        }
        visited.push(key);

        let selector = class.identifier_attribute_selector().merge(attribute_selector);
        let selector = storable.resolve_attribute_selector(&selector, &ResolveOptions::default());
        let selector = with_reference_identifiers(class, selector);

        let identifier = Value::Object(identifier_descriptor.clone());
        debug!(collection = %collection_name, identifier = %identifier, "load");
        let document = self.backend.read_document(ReadDocumentParams {
            collection_name,
            identifier_descriptor: identifier_descriptor.clone(),
            projection: build_projection(&selector),
        })?;

        let Some(document) = document else {
            if throw_if_missing {
                return Err(ComponentryError::store(
                    StoreErrorCode::ComponentIsMissingFromStore,
                    format!(
                        "Cannot load a component that is missing from the store (component: '{}', identifier: {})",
                        class.name(),
                        identifier
                    ),
                ));
            }
            return Ok(None);
        };

        let picked = match pick(&Value::Object(document), &selector, &[COMPONENT_FIELD]) {
            Value::Object(object) => object,
            other => {
                return Err(ComponentryError::Backend(format!(
                    "Expected a document, found {}",
                    other.type_name()
                )))
            }
        };
        let missing: Vec<String> = selector
            .names()
            .into_iter()
            .filter(|name| !picked.contains_key(*name))
            .map(str::to_string)
            .collect();

        let options = DeserializeOptions::new(&self.registry).with_source(ValueSource::Store);
        deserialize_into(storable, &Value::Object(picked), &options)?;

        // Stored documents omit undefined values.
        for name in &missing {
            let value_type = class.get_attribute(name)?.value_type();
            if value_type.is_optional() || matches!(value_type.kind(), ValueTypeKind::Any) {
                storable.set_with_source(name, Value::Undefined, ValueSource::Store)?;
            } else {
                storable.unset(name)?;
            }
        }
        storable.mark_as_not_new();

        for name in selector.names() {
            let Some(value) = storable.get_if_set(name) else {
                continue;
            };
            let subselector = selector.get(name);
            let mut referenced = Vec::new();
            visit_components(&value, &mut |component| referenced.push(component.clone()));
            for component in referenced {
                if !self.is_registered(component.class()) || !component.has_identifiers() {
                    continue;
                }
                if component
                    .class()
                    .identifier_attribute_selector()
                    .includes(&subselector)
                {
                    continue;
                }
                self.load_storable(&component, &subselector, false, visited)?;
            }
        }

        Ok(Some(storable.clone()))
    }

    /// Validate and write the selected attributes of `storable`.
    pub fn save(&self, storable: &Component, options: SaveOptions) -> Result<Option<Component>> {
        self.traced(
            "save",
            || {
                vec![
                    Value::Component(storable.clone()),
                    Value::object([
                        ("attributeSelector", options.attribute_selector.to_value()),
                        ("throwIfMissing", Value::from(options.throw_if_missing)),
                        ("throwIfExists", Value::from(options.throw_if_exists)),
                    ]),
                ]
            },
            || self.save_storable(storable, &options),
        )
    }

    fn save_storable(&self, storable: &Component, options: &SaveOptions) -> Result<Option<Component>> {
        let class = storable.class();
        self.check_registered(class)?;

        let is_new = storable.is_new();
        let throw_if_missing = options.throw_if_missing.unwrap_or(!is_new);
        let throw_if_exists = options.throw_if_exists.unwrap_or(is_new);
        if throw_if_missing && throw_if_exists {
            return Err(ComponentryError::InvalidOptions(
                "The 'throwIfMissing' and 'throwIfExists' options cannot be both set to true"
                    .to_string(),
            ));
        }

        let selector = class.identifier_attribute_selector().merge(&options.attribute_selector);
        let selector = storable.resolve_attribute_selector(
            &selector,
            &ResolveOptions {
                set_attributes_only: true,
                include_referenced_components: false,
                ..ResolveOptions::default()
            },
        );
        storable.validate(&selector)?;

        let identifier_descriptor = storable.identifier_descriptor()?;
        let collection_name = self.collection_name(class);
        let document = match serialize(
            &Value::Component(storable.clone()),
            &SerializeOptions::for_store(selector.clone()),
        )? {
            Value::Object(object) => object,
            other => {
                return Err(ComponentryError::InvalidComponent(format!(
                    "'{}' serialized to {}",
                    class.name(),
                    other.type_name()
                )))
            }
        };

        let identifier = Value::Object(identifier_descriptor.clone());
        debug!(collection = %collection_name, identifier = %identifier, is_new, "save");

        let written = if is_new {
            self.backend.create_document(CreateDocumentParams {
                collection_name,
                identifier_descriptor: identifier_descriptor.clone(),
                document: strip_undefined_fields(&document),
            })
        } else {
            self.backend.update_document(UpdateDocumentParams {
                collection_name,
                identifier_descriptor: identifier_descriptor.clone(),
                document_patch: build_document_patch(&document),
            })
        }
        .map_err(|err| unique_violation(class, err))?;

        if !written {
            if is_new && throw_if_exists {
                return Err(ComponentryError::store(
                    StoreErrorCode::ComponentAlreadyExistsInStore,
                    format!(
                        "Cannot save a new component that already exists in the store (component: '{}', identifier: {})",
                        class.name(),
                        identifier
                    ),
                ));
            }
            if !is_new && throw_if_missing {
                return Err(ComponentryError::store(
                    StoreErrorCode::ComponentIsMissingFromStore,
                    format!(
                        "Cannot save an existing component that is missing from the store (component: '{}', identifier: {})",
                        class.name(),
                        identifier
                    ),
                ));
            }
            return Ok(None);
        }

        storable.mark_as_not_new();
        storable.set_value_sources(&selector, ValueSource::Store);
        Ok(Some(storable.clone()))
    }

    /// Remove `storable` from its collection. The instance is new again afterwards.
    pub fn delete(&self, storable: &Component, options: DeleteOptions) -> Result<Option<Component>> {
        self.traced(
            "delete",
            || {
                vec![
                    Value::Component(storable.clone()),
                    Value::object([("throwIfMissing", Value::from(options.throw_if_missing))]),
                ]
            },
            || {
                let class = storable.class();
                self.check_registered(class)?;
                let identifier_descriptor = storable.identifier_descriptor()?;
                let collection_name = self.collection_name(class);
                let identifier = Value::Object(identifier_descriptor.clone());
                debug!(collection = %collection_name, identifier = %identifier, "delete");

                let deleted = self.backend.delete_document(DeleteDocumentParams {
                    collection_name,
                    identifier_descriptor: identifier_descriptor.clone(),
                })?;
                if !deleted {
                    if options.throw_if_missing {
                        return Err(ComponentryError::store(
                            StoreErrorCode::ComponentIsMissingFromStore,
                            format!(
                                "Cannot delete a component that is missing from the store (component: '{}', identifier: {})",
                                class.name(),
                                identifier
                            ),
                        ));
                    }
                    return Ok(None);
                }

                storable.mark_as_new();
                Ok(Some(storable.clone()))
            },
        )
    }

    /// Instances matching `query`, identifiers set. Further attributes are
    /// loaded when `options.attribute_selector` selects any.
    pub fn find(
        &self,
        class: &Rc<ComponentClass>,
        query: &Value,
        options: FindOptions,
    ) -> Result<Vec<Component>> {
        self.traced(
            "find",
            || {
                let sort: Object = options
                    .sort
                    .iter()
                    .map(|(path, direction)| (path.clone(), Value::from(direction.as_str())))
                    .collect();
                vec![
                    Value::ComponentClass(Rc::clone(class)),
                    query.clone(),
                    Value::object([
                        ("attributeSelector", options.attribute_selector.to_value()),
                        ("sort", Value::Object(sort)),
                        ("skip", Value::from(options.skip)),
                        ("limit", Value::from(options.limit)),
                    ]),
                ]
            },
            || self.find_storables(class, query, &options),
        )
    }

    fn find_storables(
        &self,
        class: &Rc<ComponentClass>,
        query: &Value,
        options: &FindOptions,
    ) -> Result<Vec<Component>> {
        self.check_registered(class)?;
        let expressions = self.compile_query(query)?;
        let identifier_selector = class.identifier_attribute_selector();
        let collection_name = self.collection_name(class);
        debug!(collection = %collection_name, query = %query, "find");

        let documents = self.backend.find_documents(FindDocumentsParams {
            collection_name,
            expressions,
            projection: build_projection(&identifier_selector),
            sort: options.sort.clone(),
            skip: options.skip,
            limit: options.limit,
        })?;

        let mut storables = Vec::with_capacity(documents.len());
        for document in documents {
            let identifiers: Object = class
                .identifier_attributes()
                .into_iter()
                .filter_map(|attribute| {
                    document
                        .get(attribute.name())
                        .filter(|value| !value.is_undefined())
                        .map(|value| (attribute.name().to_string(), value.clone()))
                })
                .collect();
            let storable = Component::with_identifiers(class, &identifiers)?;
            storable.set_value_sources(&identifier_selector, ValueSource::Store);
            if !options.attribute_selector.is_none() {
                self.load_storable(&storable, &options.attribute_selector, true, &mut Vec::new())?;
            }
            storables.push(storable);
        }
        Ok(storables)
    }

    pub fn count(&self, class: &Rc<ComponentClass>, query: &Value) -> Result<usize> {
        self.traced(
            "count",
            || vec![Value::ComponentClass(Rc::clone(class)), query.clone()],
            || {
                self.check_registered(class)?;
                let expressions = self.compile_query(query)?;
                let collection_name = self.collection_name(class);
                debug!(collection = %collection_name, query = %query, "count");
                self.backend.count_documents(CountDocumentsParams {
                    collection_name,
                    expressions,
                })
            },
        )
    }

    /// Bring every storable collection's indexes in line with its class.
    pub fn migrate_storables(&self) -> Result<Vec<MigrateCollectionResult>> {
        self.traced("migrateStorables", Vec::new, || {
            let silent = self.config.silent_migrations;
            let mut results = Vec::new();
            for class in self.storables() {
                let collection_schema = get_collection_schema(&class)?;
                let result = self.backend.migrate_collection(MigrateCollectionParams {
                    collection_name: self.collection_name(&class),
                    collection_schema,
                    silent,
                })?;
                if !silent {
                    info!(
                        collection = %result.name,
                        created = result.created_indexes.len(),
                        "Migrated collection"
                    );
                    for name in &result.dropped_indexes {
                        warn!(collection = %result.name, index = %name, "Dropped index");
                    }
                }
                results.push(result);
            }
            Ok(results)
        })
    }

    /// Serialize the query for the store (references become identifiers), then compile.
    fn compile_query(&self, query: &Value) -> Result<Vec<Expression>> {
        let serialized = serialize(query, &SerializeOptions::for_store(AttributeSelector::all()))?;
        to_document_expressions(&serialized)
    }
}

/// Selecting part of a referenced storable must still read its identifiers,
/// or the reference cannot be followed.
fn with_reference_identifiers(class: &Rc<ComponentClass>, selector: AttributeSelector) -> AttributeSelector {
    let mut selector = selector;
    for attribute in class.attributes() {
        let subselector = selector.get(attribute.name());
        if !matches!(subselector, AttributeSelector::Map(_)) {
            continue;
        }
        let Some((name, false)) = attribute.value_type().component_reference() else {
            continue;
        };
        let Ok(referenced) = class.get_component(name) else {
            continue;
        };
        if referenced.is_referenceable() {
            let merged = subselector.merge(&referenced.identifier_attribute_selector());
            selector.set(attribute.name(), merged);
        }
    }
    selector
}

fn unique_violation(class: &ComponentClass, err: ComponentryError) -> ComponentryError {
    match err {
        ComponentryError::DuplicateKey { index_name, .. } => ComponentryError::Store {
            code: StoreErrorCode::UniqueAttributeAlreadyExistsInStore,
            message: format!(
                "Cannot save a component with an attribute value that should be unique but already exists in the store (component: '{}', index: '{}')",
                class.name(),
                index_name
            ),
            index_name: Some(index_name),
        },
        other => other,
    }
}

/// How an operation's result is recorded in the trace.
trait TraceValue {
    fn trace_value(&self) -> Value;
}

impl TraceValue for Option<Component> {
    fn trace_value(&self) -> Value {
        match self {
            Some(component) => Value::Component(component.clone()),
            None => Value::Undefined,
        }
    }
}

impl TraceValue for Vec<Component> {
    fn trace_value(&self) -> Value {
        Value::Array(self.iter().cloned().map(Value::Component).collect())
    }
}

impl TraceValue for usize {
    fn trace_value(&self) -> Value {
        Value::from(*self)
    }
}

impl TraceValue for Vec<MigrateCollectionResult> {
    fn trace_value(&self) -> Value {
        Value::Array(self.iter().map(Value::from).collect())
    }
}
