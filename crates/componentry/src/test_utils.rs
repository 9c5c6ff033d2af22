use std::rc::Rc;

use crate::attributes::sanitizer::trim;
use crate::attributes::validation::{min_value, not_empty};
use crate::component::{
    AttributeDeclaration, Component, ComponentClass, ComponentRegistry, IndexDeclaration,
};
use crate::store::mem_backend::MemoryBackend;
use crate::store::schema::SortDirection;
use crate::store::{SaveOptions, Store};
use crate::value::Value;

/// A small movie catalog: storable `Movie` and `Person`, embedded `Address`.
///
/// The registry is kept here so the classes stay resolvable for the
/// lifetime of the fixture.
pub struct Catalog {
    pub registry: ComponentRegistry,
    pub movie: Rc<ComponentClass>,
    pub person: Rc<ComponentClass>,
    pub address: Rc<ComponentClass>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let address = ComponentClass::builder("Address")
            .attribute(AttributeDeclaration::new("city", "string").validator(not_empty()))
            .attribute(AttributeDeclaration::new("country", "string?"))
            .embedded()
            .build()
            .expect("Address is valid");

        let person = ComponentClass::builder("Person")
            .attribute(AttributeDeclaration::primary_identifier("id", "string"))
            .attribute(AttributeDeclaration::secondary_identifier("email", "string?"))
            .attribute(
                AttributeDeclaration::new("name", "string")
                    .validator(not_empty())
                    .sanitizer(trim()),
            )
            .attribute(AttributeDeclaration::new("address", "Address?"))
            .storable()
            .build()
            .expect("Person is valid");

        let movie = ComponentClass::builder("Movie")
            .attribute(AttributeDeclaration::primary_identifier("id", "string"))
            .attribute(AttributeDeclaration::secondary_identifier("slug", "string?"))
            .attribute(
                AttributeDeclaration::new("title", "string")
                    .validator(not_empty())
                    .sanitizer(trim())
                    .unique_index(),
            )
            .attribute(
                AttributeDeclaration::new("year", "number?")
                    .validator(min_value(1888.0))
                    .index(),
            )
            .attribute(
                AttributeDeclaration::new("tags", "string[]").default_value(Vec::<Value>::new()),
            )
            .attribute(AttributeDeclaration::new("director", "Person?"))
            .attribute(
                AttributeDeclaration::new("actors", "Person[]").default_value(Vec::<Value>::new()),
            )
            .index(IndexDeclaration::new([
                ("year", SortDirection::Desc),
                ("title", SortDirection::Asc),
            ]))
            .storable()
            .build()
            .expect("Movie is valid");

        let registry = ComponentRegistry::with_components([&movie, &person, &address])
            .expect("catalog registers");

        Self {
            registry,
            movie,
            person,
            address,
        }
    }

    pub fn new_person(&self, id: &str, name: &str) -> Component {
        Component::create(
            &self.person,
            [("id", Value::from(id)), ("name", Value::from(name))],
        )
        .expect("person is valid")
    }

    pub fn new_movie(&self, id: &str, title: &str, year: i32) -> Component {
        Component::create(
            &self.movie,
            [
                ("id", Value::from(id)),
                ("title", Value::from(title)),
                ("year", Value::from(year)),
            ],
        )
        .expect("movie is valid")
    }
}

/// A catalog registered in a fresh store over a `MemoryBackend`.
pub struct TestStore {
    pub catalog: Catalog,
    pub store: Store<MemoryBackend>,
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStore {
    pub fn new() -> Self {
        let catalog = Catalog::new();
        let store = Store::new(MemoryBackend::new());
        store
            .register_root_component(&catalog.registry)
            .expect("catalog registers in store");
        Self { catalog, store }
    }

    /// Three movies by two directors, saved.
    pub fn seeded() -> Self {
        let env = Self::new();
        let nolan = env.catalog.new_person("p1", "Christopher Nolan");
        let jeunet = env.catalog.new_person("p2", "Jean-Pierre Jeunet");
        for person in [&nolan, &jeunet] {
            env.store
                .save(person, SaveOptions::default())
                .expect("person saves");
        }

        for (id, title, year, director, tags) in [
            ("m1", "Inception", 2010, &nolan, vec!["sci-fi", "heist"]),
            ("m2", "Interstellar", 2014, &nolan, vec!["sci-fi"]),
            ("m3", "Amélie", 2001, &jeunet, vec!["romance", "comedy"]),
        ] {
            let movie = env.catalog.new_movie(id, title, year);
            movie
                .set("director", director.clone())
                .expect("director is a Person");
            movie.set("tags", tags).expect("tags are strings");
            env.store
                .save(&movie, SaveOptions::default())
                .expect("movie saves");
        }
        env
    }
}
