//! Collection schema derivation.
//!
//! The indexes of a storable's collection, in order:
//!
//! 1. the primary identifier (unique, primary)
//! 2. each secondary identifier (unique)
//! 3. for each attribute referencing another storable, a non-unique index on
//!    `<attribute>.<referenced primary identifier>`
//! 4. declared indexes: attribute-level ones, then class-level (compound) ones.
//!    Paths naming a reference attribute are rewritten the same way as in (3).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::ComponentClass;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    pub attributes: IndexMap<String, SortDirection>,
    pub is_primary: bool,
    pub is_unique: bool,
}

impl IndexSchema {
    fn single(path: impl Into<String>, is_primary: bool, is_unique: bool) -> Self {
        let mut attributes = IndexMap::new();
        attributes.insert(path.into(), SortDirection::Asc);
        Self {
            attributes,
            is_primary,
            is_unique,
        }
    }

    /// `year:desc+title:asc`
    pub fn name(&self) -> String {
        self.attributes
            .iter()
            .map(|(path, direction)| format!("{}:{}", path, direction))
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionSchema {
    pub indexes: Vec<IndexSchema>,
}

impl CollectionSchema {
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().map(IndexSchema::name).collect()
    }
}

pub fn get_collection_schema(class: &Rc<ComponentClass>) -> Result<CollectionSchema> {
    let mut indexes = Vec::new();

    for attribute in class.identifier_attributes() {
        let is_primary = class
            .primary_identifier()
            .map(|primary| primary.name() == attribute.name())
            .unwrap_or(false);
        indexes.push(IndexSchema::single(attribute.name(), is_primary, true));
    }

    for attribute in class.attributes() {
        if let Some(path) = reference_path(class, attribute.name())? {
            indexes.push(IndexSchema::single(path, false, false));
        }
    }

    for declaration in class.indexes() {
        let mut attributes = IndexMap::new();
        for (path, direction) in &declaration.attributes {
            let path = reference_path(class, path)?.unwrap_or_else(|| path.clone());
            attributes.insert(path, *direction);
        }
        indexes.push(IndexSchema {
            attributes,
            is_primary: false,
            is_unique: declaration.is_unique,
        });
    }

    Ok(CollectionSchema { indexes })
}

/// `director` becomes `director.id` when it references a component stored on
/// its own.
fn reference_path(class: &Rc<ComponentClass>, name: &str) -> Result<Option<String>> {
    let Ok(attribute) = class.get_attribute(name) else {
        return Ok(None);
    };
    let Some((component_name, false)) = attribute.value_type().component_reference() else {
        return Ok(None);
    };
    let referenced = class.get_component(component_name)?;
    if !referenced.is_referenceable() {
        return Ok(None);
    }
    Ok(referenced
        .primary_identifier()
        .map(|primary| format!("{}.{}", name, primary.name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{AttributeDeclaration, ComponentRegistry, IndexDeclaration};

    #[test]
    fn indexes_follow_declaration_order() {
        let person = ComponentClass::builder("Person")
            .attribute(AttributeDeclaration::primary_identifier("id", "string"))
            .storable()
            .build()
            .unwrap();
        let address = ComponentClass::builder("Address")
            .attribute(AttributeDeclaration::new("city", "string"))
            .embedded()
            .build()
            .unwrap();
        let movie = ComponentClass::builder("Movie")
            .attribute(AttributeDeclaration::primary_identifier("id", "string"))
            .attribute(AttributeDeclaration::secondary_identifier("slug", "string"))
            .attribute(AttributeDeclaration::new("title", "string").index())
            .attribute(AttributeDeclaration::new("year", "number"))
            .attribute(AttributeDeclaration::new("director", "Person?"))
            .attribute(AttributeDeclaration::new("actors", "Person[]"))
            .attribute(AttributeDeclaration::new("location", "Address?"))
            .index(IndexDeclaration::new([
                ("year", SortDirection::Desc),
                ("title", SortDirection::Asc),
            ]))
            .index(IndexDeclaration::new([("director", SortDirection::Asc)]).unique())
            .storable()
            .build()
            .unwrap();
        let _registry = ComponentRegistry::with_components([&movie, &person, &address]).unwrap();

        let schema = get_collection_schema(&movie).unwrap();
        assert_eq!(
            schema.index_names(),
            vec![
                "id:asc",
                "slug:asc",
                "director.id:asc",
                "actors.id:asc",
                "title:asc",
                "year:desc+title:asc",
                "director.id:asc",
            ]
        );

        assert!(schema.indexes[0].is_primary && schema.indexes[0].is_unique);
        assert!(!schema.indexes[1].is_primary && schema.indexes[1].is_unique);
        assert!(!schema.indexes[2].is_unique);
        assert!(!schema.indexes[4].is_unique);
        assert!(schema.indexes[6].is_unique);
    }

    #[test]
    fn unresolvable_references_are_errors() {
        let movie = ComponentClass::builder("Movie")
            .attribute(AttributeDeclaration::primary_identifier("id", "string"))
            .attribute(AttributeDeclaration::new("director", "Person?"))
            .storable()
            .build()
            .unwrap();
        assert!(get_collection_schema(&movie).is_err());
    }

    #[test]
    fn sort_direction_names() {
        assert_eq!(SortDirection::Asc.to_string(), "asc");
        assert_eq!(SortDirection::Desc.as_str(), "desc");
    }
}
