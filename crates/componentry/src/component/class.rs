use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::attributes::{
    create_value_type, AttributeContext, AttributeSelector, Sanitizer, TypeOptions, Validator,
    ValueType, ValueTypeKind,
};
use crate::error::{ComponentryError, Result};
use crate::store::schema::SortDirection;
use crate::value::Value;

use super::registry::{ComponentRegistry, RegistryInner};

/// What role an attribute plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Attribute,
    /// Uniquely identifies an instance in its collection. At most one per class.
    PrimaryIdentifier,
    /// Alternative unique key.
    SecondaryIdentifier,
}

impl AttributeKind {
    pub fn is_identifier(&self) -> bool {
        !matches!(self, AttributeKind::Attribute)
    }
}

/// How an attribute gets its initial value on new instances.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Generator(Rc<dyn Fn() -> Value>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Generator(generate) => generate(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => write!(f, "DefaultValue({})", value),
            DefaultValue::Generator(_) => write!(f, "DefaultValue(<generator>)"),
        }
    }
}

/// A declared index: attribute paths with their sort directions.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDeclaration {
    pub attributes: IndexMap<String, SortDirection>,
    pub is_unique: bool,
}

impl IndexDeclaration {
    pub fn new<S: Into<String>>(attributes: impl IntoIterator<Item = (S, SortDirection)>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(name, direction)| (name.into(), direction))
                .collect(),
            is_unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }
}

/// The declarative record of one attribute, consumed by
/// [`ComponentClassBuilder::build`].
#[derive(Debug, Clone)]
pub struct AttributeDeclaration {
    name: String,
    specifier: Option<String>,
    kind: AttributeKind,
    options: TypeOptions,
    default: Option<DefaultValue>,
    index: Option<bool>,
}

impl AttributeDeclaration {
    pub fn new(name: impl Into<String>, specifier: &str) -> Self {
        Self {
            name: name.into(),
            specifier: Some(specifier.to_string()),
            kind: AttributeKind::Attribute,
            options: TypeOptions::default(),
            default: None,
            index: None,
        }
    }

    /// A primary identifier. String identifiers default to a generated UUID.
    pub fn primary_identifier(name: impl Into<String>, specifier: &str) -> Self {
        Self {
            kind: AttributeKind::PrimaryIdentifier,
            ..Self::new(name, specifier)
        }
    }

    pub fn secondary_identifier(name: impl Into<String>, specifier: &str) -> Self {
        Self {
            kind: AttributeKind::SecondaryIdentifier,
            ..Self::new(name, specifier)
        }
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.options.validators.push(validator);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.options.sanitizers.push(sanitizer);
        self
    }

    /// Options for the item type of an array attribute.
    pub fn items(mut self, items: TypeOptions) -> Self {
        self.options.items = Some(Box::new(items));
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_with(mut self, generate: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Generator(Rc::new(generate)));
        self
    }

    /// Declare a single-attribute ascending index.
    pub fn index(mut self) -> Self {
        self.index = Some(false);
        self
    }

    pub fn unique_index(mut self) -> Self {
        self.index = Some(true);
        self
    }
}

/// A built attribute: name, role, value type and default.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    value_type: ValueType,
    default: Option<DefaultValue>,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

struct ClassDefinition {
    attributes: IndexMap<String, Attribute>,
    indexes: Vec<IndexDeclaration>,
    is_embedded: bool,
    is_storable: bool,
}

/// A component class: a named set of typed attributes.
///
/// Classes are built once with [`ComponentClass::builder`] and shared behind
/// `Rc`. A [fork](ComponentClass::fork) shares the definition with its base.
pub struct ComponentClass {
    name: String,
    definition: Rc<ClassDefinition>,
    base: Option<Rc<ComponentClass>>,
    registry: RefCell<Weak<RegistryInner>>,
    store_id: Cell<Option<u64>>,
}

impl ComponentClass {
    pub fn builder(name: impl Into<String>) -> ComponentClassBuilder {
        ComponentClassBuilder {
            name: name.into(),
            attributes: Vec::new(),
            indexes: Vec::new(),
            is_embedded: false,
            is_storable: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.definition.attributes.values()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.definition.attributes.contains_key(name)
    }

    pub fn get_attribute(&self, name: &str) -> Result<&Attribute> {
        self.definition
            .attributes
            .get(name)
            .ok_or_else(|| ComponentryError::UnknownAttribute {
                component: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn primary_identifier(&self) -> Option<&Attribute> {
        self.attributes()
            .find(|attribute| attribute.kind == AttributeKind::PrimaryIdentifier)
    }

    pub fn secondary_identifiers(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes()
            .filter(|attribute| attribute.kind == AttributeKind::SecondaryIdentifier)
    }

    /// Primary identifier first, then secondary identifiers in declaration order.
    pub fn identifier_attributes(&self) -> Vec<&Attribute> {
        self.primary_identifier()
            .into_iter()
            .chain(self.secondary_identifiers())
            .collect()
    }

    pub fn identifier_attribute_selector(&self) -> AttributeSelector {
        AttributeSelector::from_names(
            self.identifier_attributes()
                .into_iter()
                .map(|attribute| attribute.name()),
        )
    }

    pub fn indexes(&self) -> &[IndexDeclaration] {
        &self.definition.indexes
    }

    pub fn is_embedded(&self) -> bool {
        self.definition.is_embedded
    }

    pub fn is_storable(&self) -> bool {
        self.definition.is_storable
    }

    /// Instances are referenced by identifier rather than nested whole.
    pub fn is_referenceable(&self) -> bool {
        !self.is_embedded() && self.primary_identifier().is_some()
    }

    pub fn base(&self) -> Option<&Rc<ComponentClass>> {
        self.base.as_ref()
    }

    /// A derived class sharing this class's definition and registry.
    pub fn fork(self: &Rc<Self>) -> Rc<ComponentClass> {
        Rc::new(ComponentClass {
            name: self.name.clone(),
            definition: Rc::clone(&self.definition),
            base: Some(Rc::clone(self)),
            registry: RefCell::new(self.registry.borrow().clone()),
            store_id: Cell::new(self.store_id.get()),
        })
    }

    /// Whether `other` appears in this class's base chain.
    pub fn is_fork_of(&self, other: &ComponentClass) -> bool {
        let mut current = self.base.as_ref();
        while let Some(base) = current {
            if std::ptr::eq(base.as_ref(), other) {
                return true;
            }
            current = base.base.as_ref();
        }
        false
    }

    pub fn is_same_or_fork_of(&self, other: &ComponentClass) -> bool {
        std::ptr::eq(self, other) || self.is_fork_of(other)
    }

    /// Resolve a component by name, relative to this class.
    ///
    /// The class's own name resolves to itself; anything else goes through the
    /// registry the class belongs to.
    pub fn get_component(self: &Rc<Self>, name: &str) -> Result<Rc<ComponentClass>> {
        if name == self.name {
            return Ok(Rc::clone(self));
        }
        self.registry()
            .and_then(|registry| registry.get(name))
            .ok_or_else(|| ComponentryError::UnknownComponent {
                name: name.to_string(),
                from: self.name.clone(),
            })
    }

    pub fn registry(&self) -> Option<ComponentRegistry> {
        self.registry
            .borrow()
            .upgrade()
            .map(ComponentRegistry::from_inner)
    }

    /// Attach to a registry unless already attached to a live one.
    pub(crate) fn attach_registry(&self, registry: Weak<RegistryInner>) {
        let mut current = self.registry.borrow_mut();
        if current.upgrade().is_none() {
            *current = registry;
        }
    }

    pub(crate) fn store_id(&self) -> Option<u64> {
        self.store_id.get()
    }

    pub(crate) fn set_store_id(&self, store_id: u64) {
        self.store_id.set(Some(store_id));
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("is_fork", &self.base.is_some())
            .finish()
    }
}

/// Classes compare by identity.
impl PartialEq for ComponentClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

pub struct ComponentClassBuilder {
    name: String,
    attributes: Vec<AttributeDeclaration>,
    indexes: Vec<IndexDeclaration>,
    is_embedded: bool,
    is_storable: bool,
}

impl ComponentClassBuilder {
    pub fn attribute(mut self, declaration: AttributeDeclaration) -> Self {
        self.attributes.push(declaration);
        self
    }

    /// A class-level (possibly compound) index.
    pub fn index(mut self, index: IndexDeclaration) -> Self {
        self.indexes.push(index);
        self
    }

    /// Instances are stored inside their owner's document.
    pub fn embedded(mut self) -> Self {
        self.is_embedded = true;
        self
    }

    /// Instances can be persisted in a store.
    pub fn storable(mut self) -> Self {
        self.is_storable = true;
        self
    }

    pub fn build(self) -> Result<Rc<ComponentClass>> {
        let invalid = |message: String| ComponentryError::InvalidComponent(message);

        if !is_component_name(&self.name) {
            return Err(invalid(format!(
                "'{}' is not a valid component name",
                self.name
            )));
        }
        if self.is_embedded && self.is_storable {
            return Err(invalid(format!(
                "the component '{}' cannot be both embedded and storable",
                self.name
            )));
        }

        let mut attributes = IndexMap::new();
        let mut attribute_indexes = Vec::new();
        let mut has_primary_identifier = false;

        for declaration in self.attributes {
            if attributes.contains_key(&declaration.name) {
                return Err(invalid(format!(
                    "the attribute '{}' is declared twice in '{}'",
                    declaration.name, self.name
                )));
            }

            let context = AttributeContext::new(&self.name, &declaration.name);
            let value_type = create_value_type(
                declaration.specifier.as_deref(),
                &context,
                declaration.options,
            )?;

            let mut default = declaration.default;
            if declaration.kind.is_identifier() {
                let is_string = match value_type.kind() {
                    ValueTypeKind::String => true,
                    ValueTypeKind::Number => false,
                    _ => {
                        return Err(invalid(format!(
                            "the identifier '{}' must be of type 'string' or 'number' (type: '{}')",
                            context.describe(),
                            value_type
                        )))
                    }
                };
                if declaration.kind == AttributeKind::PrimaryIdentifier {
                    if has_primary_identifier {
                        return Err(invalid(format!(
                            "the component '{}' cannot have more than one primary identifier",
                            self.name
                        )));
                    }
                    has_primary_identifier = true;
                    if is_string && default.is_none() {
                        default = Some(DefaultValue::Generator(Rc::new(|| {
                            Value::String(Uuid::new_v4().to_string())
                        })));
                    }
                }
            }

            if let Some(is_unique) = declaration.index {
                let mut index =
                    IndexDeclaration::new([(declaration.name.clone(), SortDirection::Asc)]);
                index.is_unique = is_unique;
                attribute_indexes.push(index);
            }

            attributes.insert(
                declaration.name.clone(),
                Attribute {
                    name: declaration.name,
                    kind: declaration.kind,
                    value_type,
                    default,
                },
            );
        }

        if self.is_storable && !has_primary_identifier {
            return Err(invalid(format!(
                "the storable component '{}' must have a primary identifier",
                self.name
            )));
        }

        let mut indexes = attribute_indexes;
        indexes.extend(self.indexes);
        for index in &indexes {
            if index.attributes.is_empty() {
                return Err(invalid(format!(
                    "an index of '{}' has no attributes",
                    self.name
                )));
            }
            for path in index.attributes.keys() {
                let head = path.split('.').next().unwrap_or_default();
                if !attributes.contains_key(head) {
                    return Err(ComponentryError::UnknownAttribute {
                        component: self.name.clone(),
                        attribute: head.to_string(),
                    });
                }
            }
        }

        Ok(Rc::new(ComponentClass {
            name: self.name,
            definition: Rc::new(ClassDefinition {
                attributes,
                indexes,
                is_embedded: self.is_embedded,
                is_storable: self.is_storable,
            }),
            base: None,
            registry: RefCell::new(Weak::new()),
            store_id: Cell::new(None),
        }))
    }
}

fn is_component_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
