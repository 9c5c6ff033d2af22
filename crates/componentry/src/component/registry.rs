use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ComponentryError, Result};

use super::class::ComponentClass;

#[derive(Default)]
pub(crate) struct RegistryInner {
    components: RefCell<IndexMap<String, Rc<ComponentClass>>>,
}

/// Name to class lookup, used to resolve component references and to
/// deserialize tagged documents.
///
/// Cloning yields another handle to the same registry. Registered classes hold a
/// weak link back, so `ComponentClass::get_component` can resolve names.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    inner: Rc<RegistryInner>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding all the given classes.
    pub fn with_components<'a>(
        classes: impl IntoIterator<Item = &'a Rc<ComponentClass>>,
    ) -> Result<Self> {
        let registry = Self::new();
        for class in classes {
            registry.register(class)?;
        }
        Ok(registry)
    }

    pub(crate) fn from_inner(inner: Rc<RegistryInner>) -> Self {
        Self { inner }
    }

    /// Register a class under its name.
    ///
    /// Registering the same class twice is a no-op; registering a different class
    /// under a taken name is an error.
    pub fn register(&self, class: &Rc<ComponentClass>) -> Result<()> {
        let mut components = self.inner.components.borrow_mut();
        if let Some(existing) = components.get(class.name()) {
            if Rc::ptr_eq(existing, class) {
                return Ok(());
            }
            return Err(ComponentryError::Registration(format!(
                "a component named '{}' is already registered",
                class.name()
            )));
        }
        debug!(component = class.name(), "registering component");
        components.insert(class.name().to_string(), Rc::clone(class));
        class.attach_registry(Rc::downgrade(&self.inner));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Rc<ComponentClass>> {
        self.inner.components.borrow().get(name).cloned()
    }

    pub fn get_component(&self, name: &str) -> Result<Rc<ComponentClass>> {
        self.get(name).ok_or_else(|| ComponentryError::UnknownComponent {
            name: name.to_string(),
            from: "registry".to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.components.borrow().contains_key(name)
    }

    /// Registered classes in registration order.
    pub fn components(&self) -> Vec<Rc<ComponentClass>> {
        self.inner.components.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.components.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn ptr_eq(&self, other: &ComponentRegistry) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.components.borrow().keys())
            .finish()
    }
}
