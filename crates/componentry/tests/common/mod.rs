#![allow(dead_code)]

use std::rc::Rc;

use componentry::prelude::*;

/// `Book` references `Author`; both are storable.
pub struct Library {
    pub registry: ComponentRegistry,
    pub book: Rc<ComponentClass>,
    pub author: Rc<ComponentClass>,
}

pub fn library() -> Library {
    let author = ComponentClass::builder("Author")
        .attribute(AttributeDeclaration::primary_identifier("id", "string"))
        .attribute(AttributeDeclaration::new("name", "string").validator(not_empty()))
        .attribute(AttributeDeclaration::new("born", "number?"))
        .storable()
        .build()
        .unwrap();

    let book = ComponentClass::builder("Book")
        .attribute(AttributeDeclaration::primary_identifier("id", "string"))
        .attribute(AttributeDeclaration::secondary_identifier("isbn", "string?"))
        .attribute(
            AttributeDeclaration::new("title", "string")
                .validator(not_empty())
                .sanitizer(trim()),
        )
        .attribute(AttributeDeclaration::new("year", "number?").validator(integer()))
        .attribute(AttributeDeclaration::new("genres", "string[]").default_value(Vec::<Value>::new()))
        .attribute(AttributeDeclaration::new("author", "Author?"))
        .index(IndexDeclaration::new([
            ("year", SortDirection::Desc),
            ("title", SortDirection::Asc),
        ]))
        .storable()
        .build()
        .unwrap();

    let registry = ComponentRegistry::with_components([&book, &author]).unwrap();
    Library {
        registry,
        book,
        author,
    }
}

pub fn store(library: &Library) -> Store<MemoryBackend> {
    let store = Store::new(MemoryBackend::new());
    store.register_root_component(&library.registry).unwrap();
    store
}

pub fn book(library: &Library, id: &str, title: &str, year: i32) -> Component {
    Component::create(
        &library.book,
        [
            ("id", Value::from(id)),
            ("title", Value::from(title)),
            ("year", Value::from(year)),
        ],
    )
    .unwrap()
}

pub fn by_id(class: &Rc<ComponentClass>, id: &str) -> Component {
    let mut identifiers = Object::new();
    identifiers.insert("id".to_string(), Value::from(id));
    Component::with_identifiers(class, &identifiers).unwrap()
}
