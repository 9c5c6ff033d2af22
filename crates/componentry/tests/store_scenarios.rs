mod common;

use componentry::prelude::*;
use componentry::store::trace::TraceOutcome;
use indexmap::IndexMap;

use common::{book, by_id, library, store};

fn selector(names: &[&str]) -> AttributeSelector {
    AttributeSelector::from_names(names.iter().copied())
}

#[test]
fn test_save_then_update_then_load() {
    let library = library();
    let store = store(&library);

    let inception =
        Component::create(&library.book, [("title", Value::from("Inception"))]).unwrap();
    assert!(inception.is_new());
    let id = inception.get("id").unwrap();

    store.save(&inception, SaveOptions::default()).unwrap();
    assert!(!inception.is_new());

    inception.set("title", "Inception (Director's Cut)").unwrap();
    let saved = store.save(&inception, SaveOptions::default()).unwrap();
    assert!(saved.is_some());
    assert_eq!(store.backend().documents("Book").len(), 1);

    let fresh = by_id(&library.book, id.as_str().unwrap());
    store
        .load(&fresh, LoadOptions::selecting(selector(&["title"])))
        .unwrap();
    assert_eq!(
        fresh.get("title").unwrap(),
        Value::from("Inception (Director's Cut)")
    );
    assert_eq!(fresh.get("id").unwrap(), id);
    assert!(!fresh.is_set("year"));
    assert_eq!(fresh.value_source("title"), Some(ValueSource::Store));
}

#[test]
fn test_save_flags_cannot_both_be_true() {
    let library = library();
    let store = store(&library);
    let dune = book(&library, "b1", "Dune", 1965);

    let result = store.save(
        &dune,
        SaveOptions {
            throw_if_missing: Some(true),
            throw_if_exists: Some(true),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ComponentryError::InvalidOptions(_))));
    assert!(store.backend().documents("Book").is_empty());
}

#[test]
fn test_save_new_component_that_already_exists() {
    let library = library();
    let store = store(&library);
    store
        .save(&book(&library, "b1", "Dune", 1965), SaveOptions::default())
        .unwrap();

    let duplicate = book(&library, "b1", "Dune Messiah", 1969);
    let err = store.save(&duplicate, SaveOptions::default()).unwrap_err();
    assert_eq!(err.code(), Some(StoreErrorCode::ComponentAlreadyExistsInStore));

    let result = store
        .save(
            &duplicate,
            SaveOptions {
                throw_if_exists: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(result.is_none());
    assert!(duplicate.is_new());
}

#[test]
fn test_save_existing_component_that_is_missing() {
    let library = library();
    let store = store(&library);
    let ghost = by_id(&library.book, "zz");
    ghost.set("title", "Ghost").unwrap();

    let err = store.save(&ghost, SaveOptions::default()).unwrap_err();
    assert_eq!(err.code(), Some(StoreErrorCode::ComponentIsMissingFromStore));

    let result = store
        .save(
            &ghost,
            SaveOptions {
                throw_if_missing: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_load_missing_component() {
    let library = library();
    let store = store(&library);
    let missing = by_id(&library.book, "nope");

    let err = store.load(&missing, LoadOptions::default()).unwrap_err();
    assert_eq!(err.code(), Some(StoreErrorCode::ComponentIsMissingFromStore));

    let result = store
        .load(
            &missing,
            LoadOptions {
                throw_if_missing: false,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_delete_then_delete_again() {
    let library = library();
    let store = store(&library);
    let dune = book(&library, "b1", "Dune", 1965);
    store.save(&dune, SaveOptions::default()).unwrap();

    store.delete(&dune, DeleteOptions::default()).unwrap();
    assert!(dune.is_new());
    assert!(store.backend().documents("Book").is_empty());

    let err = store.delete(&dune, DeleteOptions::default()).unwrap_err();
    assert_eq!(err.code(), Some(StoreErrorCode::ComponentIsMissingFromStore));
    let result = store
        .delete(
            &dune,
            DeleteOptions {
                throw_if_missing: false,
            },
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_validation_runs_before_storage() {
    let library = library();
    let store = store(&library);
    let blank = book(&library, "b1", "   ", 1965);
    assert_eq!(blank.get("title").unwrap(), Value::from(""));

    let err = store.save(&blank, SaveOptions::default()).unwrap_err();
    match err {
        ComponentryError::Validation { component, failures } => {
            assert_eq!(component, "Book");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].path, "title");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(store.backend().documents("Book").is_empty());
}

#[test]
fn test_partial_save_only_writes_selected_attributes() {
    let library = library();
    let store = store(&library);
    let dune = book(&library, "b1", "Dune", 1965);
    store.save(&dune, SaveOptions::default()).unwrap();

    dune.set("title", "Dune (Deluxe)").unwrap();
    dune.set("year", 2019).unwrap();
    store
        .save(
            &dune,
            SaveOptions {
                attribute_selector: selector(&["title"]),
                ..Default::default()
            },
        )
        .unwrap();

    let stored = &store.backend().documents("Book")[0];
    assert_eq!(stored["title"], Value::from("Dune (Deluxe)"));
    assert_eq!(stored["year"], Value::from(1965));
    assert_eq!(dune.value_source("year"), Some(ValueSource::Local));
}

#[test]
fn test_partial_create_still_writes_identifiers() {
    let library = library();
    let store = store(&library);
    let dune = book(&library, "b1", "Dune", 1965);
    store
        .save(
            &dune,
            SaveOptions {
                attribute_selector: selector(&["title"]),
                ..Default::default()
            },
        )
        .unwrap();

    let stored = &store.backend().documents("Book")[0];
    assert_eq!(stored["id"], Value::from("b1"));
    assert!(!stored.contains_key("year"));

    let fresh = by_id(&library.book, "b1");
    store.load(&fresh, LoadOptions::default()).unwrap();
    assert_eq!(fresh.get("title").unwrap(), Value::from("Dune"));

    dune.set("year", 1965).unwrap();
    store.save(&dune, SaveOptions::default()).unwrap();
    assert_eq!(store.backend().documents("Book")[0]["year"], Value::from(1965));
}

#[test]
fn test_unique_index_violation_names_the_index() {
    let library = library();
    let store = store(&library);
    store.migrate_storables().unwrap();

    let first = book(&library, "b1", "Dune", 1965);
    first.set("isbn", "978-0441013593").unwrap();
    store.save(&first, SaveOptions::default()).unwrap();

    let second = book(&library, "b2", "Dune (Reprint)", 1990);
    second.set("isbn", "978-0441013593").unwrap();
    let err = store.save(&second, SaveOptions::default()).unwrap_err();
    assert_eq!(
        err.code(),
        Some(StoreErrorCode::UniqueAttributeAlreadyExistsInStore)
    );
    match err {
        ComponentryError::Store { index_name, .. } => {
            assert_eq!(index_name.as_deref(), Some("isbn:asc"))
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(second.is_new());
}

#[test]
fn test_migrate_storables_creates_then_keeps_indexes() {
    let library = library();
    let store = store(&library);

    let results = store.migrate_storables().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Book");
    assert_eq!(
        results[0].created_indexes,
        vec!["id:asc", "isbn:asc", "author.id:asc", "year:desc+title:asc"]
    );
    assert_eq!(results[1].name, "Author");
    assert_eq!(results[1].created_indexes, vec!["id:asc"]);

    let results = store.migrate_storables().unwrap();
    assert!(results
        .iter()
        .all(|result| result.created_indexes.is_empty() && result.dropped_indexes.is_empty()));
}

fn seed(store: &Store<MemoryBackend>, library: &common::Library) {
    let herbert = Component::create(
        &library.author,
        [("id", Value::from("a1")), ("name", Value::from("Frank Herbert"))],
    )
    .unwrap();
    store.save(&herbert, SaveOptions::default()).unwrap();

    for (id, title, year, genres) in [
        ("b1", "Dune", 1965, vec!["sci-fi"]),
        ("b2", "Dune Messiah", 1969, vec!["sci-fi"]),
        ("b3", "The Hobbit", 1937, vec!["fantasy", "adventure"]),
        ("b4", "Neuromancer", 1984, vec!["sci-fi", "cyberpunk"]),
    ] {
        let entry = book(library, id, title, year);
        entry.set("genres", genres).unwrap();
        if title.starts_with("Dune") {
            entry.set("author", herbert.clone()).unwrap();
        }
        store.save(&entry, SaveOptions::default()).unwrap();
    }
}

fn ids(found: &[Component]) -> Vec<String> {
    found
        .iter()
        .map(|component| component.get("id").unwrap().as_str().unwrap().to_string())
        .collect()
}

fn query(json: serde_json::Value) -> Value {
    Value::from_json(json)
}

#[test]
fn test_find_and_count_with_operators() {
    let library = library();
    let store = store(&library);
    seed(&store, &library);

    let find = |q: serde_json::Value| {
        ids(&store
            .find(&library.book, &query(q), FindOptions::default())
            .unwrap())
    };

    assert_eq!(find(serde_json::json!({})), vec!["b1", "b2", "b3", "b4"]);
    assert_eq!(find(serde_json::json!({"genres": {"$some": "fantasy"}})), vec!["b3"]);
    assert_eq!(
        find(serde_json::json!({"$or": [{"year": {"$lessThan": 1950}}, {"title": "Neuromancer"}]})),
        vec!["b3", "b4"]
    );
    assert_eq!(
        find(serde_json::json!({"title": {"$startsWith": "Dune"}, "year": {"$greaterThan": 1966}})),
        vec!["b2"]
    );
    assert_eq!(find(serde_json::json!({"author": {"id": "a1"}})), vec!["b1", "b2"]);

    let regexp = Value::object([(
        "title",
        Value::object([("$matches", Value::RegExp(RegExp::new("^the ", "i")))]),
    )]);
    let found = store
        .find(&library.book, &regexp, FindOptions::default())
        .unwrap();
    assert_eq!(ids(&found), vec!["b3"]);

    let sci_fi = query(serde_json::json!({"genres": {"$includes": "sci-fi"}}));
    assert_eq!(store.count(&library.book, &sci_fi).unwrap(), 3);
    assert_eq!(
        store
            .count(&library.book, &query(serde_json::json!({})))
            .unwrap(),
        4
    );
}

#[test]
fn test_find_sorts_skips_and_limits() {
    let library = library();
    let store = store(&library);
    seed(&store, &library);

    let mut sort = IndexMap::new();
    sort.insert("year".to_string(), SortDirection::Desc);
    let found = store
        .find(
            &library.book,
            &query(serde_json::json!({})),
            FindOptions {
                sort,
                skip: Some(1),
                limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(ids(&found), vec!["b2", "b1"]);
}

#[test]
fn test_find_can_load_referenced_components() {
    let library = library();
    let store = store(&library);
    seed(&store, &library);

    let attribute_selector = AttributeSelector::from_value(&query(serde_json::json!({
        "title": true,
        "author": {"name": true}
    })))
    .unwrap();
    let found = store
        .find(
            &library.book,
            &query(serde_json::json!({"title": "Dune"})),
            FindOptions {
                attribute_selector,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(found.len(), 1);
    let author = found[0].get("author").unwrap();
    let author = author.as_component().unwrap();
    assert_eq!(author.get("name").unwrap(), Value::from("Frank Herbert"));
    assert!(!author.is_set("born"));
}

#[test]
fn test_invalid_queries_are_rejected() {
    let library = library();
    let store = store(&library);

    let result = store.count(&library.book, &query(serde_json::json!({"$unknownRoot": true})));
    assert!(matches!(
        result,
        Err(ComponentryError::QueryOperatorAtRoot { .. })
    ));
    let result = store.count(
        &library.book,
        &query(serde_json::json!({"year": {"a": 1, "$equal": 2}})),
    );
    assert!(matches!(result, Err(ComponentryError::QueryMixedKeys(_))));
}

#[test]
fn test_trace_records_results_and_errors() {
    let library = library();
    let store = store(&library);
    assert!(!store.is_tracing());

    store.start_trace();
    let dune = book(&library, "b1", "Dune", 1965);
    store.save(&dune, SaveOptions::default()).unwrap();
    let _ = store.load(&by_id(&library.book, "nope"), LoadOptions::default());
    store.count(&library.book, &query(serde_json::json!({}))).unwrap();

    let trace = store.stop_trace();
    let operations: Vec<&str> = trace.iter().map(|entry| entry.operation).collect();
    assert_eq!(operations, vec!["save", "load", "count"]);
    assert_eq!(trace[0].outcome, TraceOutcome::Result(Value::Component(dune)));
    match &trace[1].outcome {
        TraceOutcome::Error { code, .. } => {
            assert_eq!(*code, Some(StoreErrorCode::ComponentIsMissingFromStore))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(trace[2].outcome, TraceOutcome::Result(Value::from(1)));

    store.count(&library.book, &query(serde_json::json!({}))).unwrap();
    assert!(store.get_trace().is_empty());
}

#[test]
fn test_collection_prefix_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("componentry.toml");
    std::fs::write(&path, "collection_prefix = \"lib_\"\ntrace = true\n").unwrap();
    let config = StoreConfig::load(Some(&path)).unwrap();

    let library = library();
    let store = Store::with_config(MemoryBackend::new(), config);
    store.register_root_component(&library.registry).unwrap();
    assert!(store.is_tracing());

    store
        .save(&book(&library, "b1", "Dune", 1965), SaveOptions::default())
        .unwrap();
    assert_eq!(store.backend().documents("lib_Book").len(), 1);
    assert!(store.backend().documents("Book").is_empty());
}

#[test]
fn test_remote_round_trip_of_a_loaded_component() {
    let library = library();
    let store = store(&library);
    seed(&store, &library);

    let dune = by_id(&library.book, "b1");
    store.load(&dune, LoadOptions::default()).unwrap();

    let json = serialize_to_wire(&dune);
    assert_eq!(json["__component"], "Book");
    assert!(json.get("_new").is_none());
    assert_eq!(json["author"]["name"], "Frank Herbert");

    let options = DeserializeOptions::new(&library.registry);
    let copy = componentry::serialization::deserialize_from_json(json, &options).unwrap();
    let copy = copy.as_component().unwrap();
    assert_eq!(copy.get("title").unwrap(), Value::from("Dune"));
    assert!(!copy.is_new());
}

fn serialize_to_wire(component: &Component) -> serde_json::Value {
    componentry::serialization::serialize_to_json(
        &Value::Component(component.clone()),
        &SerializeOptions::default(),
    )
    .unwrap()
}
