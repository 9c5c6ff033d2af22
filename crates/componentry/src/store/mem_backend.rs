use std::cell::RefCell;
use std::cmp::Ordering;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::backend::{
    CountDocumentsParams, CreateDocumentParams, DeleteDocumentParams, FindDocumentsParams,
    MigrateCollectionParams, MigrateCollectionResult, ReadDocumentParams, StoreBackend,
    UpdateDocumentParams,
};
use super::document::{apply_patch, apply_projection, get_path, Document};
use super::query::{Expression, Operand, Operator};
use super::schema::{IndexSchema, SortDirection};
use crate::error::{ComponentryError, Result};
use crate::value::{Object, Value};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSchema>,
}

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since the store is single-threaded,
/// so every `StoreBackend` method can take `&self`.
///
/// Unique indexes are enforced once a collection has been migrated. Dotted
/// index paths are read through nested objects only.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RefCell<IndexMap<String, Collection>>,
    simulate_failure: RefCell<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, for testing error handling.
    pub fn set_simulate_failure(&self, simulate: bool) {
        *self.simulate_failure.borrow_mut() = simulate;
    }

    /// Snapshot of a collection's documents, in insertion order.
    pub fn documents(&self, collection_name: &str) -> Vec<Document> {
        self.collections
            .borrow()
            .get(collection_name)
            .map(|collection| collection.documents.clone())
            .unwrap_or_default()
    }

    /// Names of a collection's indexes, as set by the last migration.
    pub fn index_names(&self, collection_name: &str) -> Vec<String> {
        self.collections
            .borrow()
            .get(collection_name)
            .map(|collection| collection.indexes.iter().map(IndexSchema::name).collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if *self.simulate_failure.borrow() {
            return Err(ComponentryError::Backend("Simulated failure".to_string()));
        }
        Ok(())
    }
}

impl StoreBackend for MemoryBackend {
    fn create_document(&self, params: CreateDocumentParams) -> Result<bool> {
        self.check_available()?;
        let mut collections = self.collections.borrow_mut();
        let collection = collections.entry(params.collection_name.clone()).or_default();
        if position_of(&collection.documents, &params.identifier_descriptor).is_some() {
            return Ok(false);
        }
        check_unique_indexes(&params.collection_name, collection, &params.document, None)?;
        collection.documents.push(params.document);
        Ok(true)
    }

    fn read_document(&self, params: ReadDocumentParams) -> Result<Option<Document>> {
        self.check_available()?;
        let collections = self.collections.borrow();
        let Some(collection) = collections.get(&params.collection_name) else {
            return Ok(None);
        };
        Ok(position_of(&collection.documents, &params.identifier_descriptor).map(|position| {
            apply_projection(&collection.documents[position], params.projection.as_ref())
        }))
    }

    fn update_document(&self, params: UpdateDocumentParams) -> Result<bool> {
        self.check_available()?;
        let mut collections = self.collections.borrow_mut();
        let Some(collection) = collections.get_mut(&params.collection_name) else {
            return Ok(false);
        };
        let Some(position) = position_of(&collection.documents, &params.identifier_descriptor)
        else {
            return Ok(false);
        };
        let mut updated = collection.documents[position].clone();
        apply_patch(&mut updated, &params.document_patch);
        check_unique_indexes(&params.collection_name, collection, &updated, Some(position))?;
        collection.documents[position] = updated;
        Ok(true)
    }

    fn delete_document(&self, params: DeleteDocumentParams) -> Result<bool> {
        self.check_available()?;
        let mut collections = self.collections.borrow_mut();
        let Some(collection) = collections.get_mut(&params.collection_name) else {
            return Ok(false);
        };
        match position_of(&collection.documents, &params.identifier_descriptor) {
            Some(position) => {
                collection.documents.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_documents(&self, params: FindDocumentsParams) -> Result<Vec<Document>> {
        self.check_available()?;
        let collections = self.collections.borrow();
        let Some(collection) = collections.get(&params.collection_name) else {
            return Ok(Vec::new());
        };

        let mut matching = Vec::new();
        for document in &collection.documents {
            if matches_all(&Value::Object(document.clone()), &params.expressions)? {
                matching.push(document);
            }
        }

        if !params.sort.is_empty() {
            matching.sort_by(|a, b| compare_for_sort(a, b, &params.sort));
        }

        let skip = params.skip.unwrap_or(0);
        let limit = params.limit.unwrap_or(usize::MAX);
        let documents: Vec<Document> = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| apply_projection(document, params.projection.as_ref()))
            .collect();
        debug!(
            collection = %params.collection_name,
            found = documents.len(),
            "find_documents"
        );
        Ok(documents)
    }

    fn count_documents(&self, params: CountDocumentsParams) -> Result<usize> {
        self.check_available()?;
        let collections = self.collections.borrow();
        let Some(collection) = collections.get(&params.collection_name) else {
            return Ok(0);
        };
        let mut count = 0;
        for document in &collection.documents {
            if matches_all(&Value::Object(document.clone()), &params.expressions)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn migrate_collection(
        &self,
        params: MigrateCollectionParams,
    ) -> Result<MigrateCollectionResult> {
        self.check_available()?;
        let mut collections = self.collections.borrow_mut();
        let collection = collections.entry(params.collection_name.clone()).or_default();

        let existing: Vec<String> = collection.indexes.iter().map(IndexSchema::name).collect();
        let wanted = params.collection_schema.index_names();
        let created_indexes: Vec<String> = wanted
            .iter()
            .filter(|name| !existing.contains(name))
            .cloned()
            .collect();
        let dropped_indexes: Vec<String> = existing
            .iter()
            .filter(|name| !wanted.contains(name))
            .cloned()
            .collect();

        let previous = std::mem::replace(
            &mut collection.indexes,
            params.collection_schema.indexes.clone(),
        );
        for position in 0..collection.documents.len() {
            let document = collection.documents[position].clone();
            if let Err(err) =
                check_unique_indexes(&params.collection_name, collection, &document, Some(position))
            {
                collection.indexes = previous;
                return Err(err);
            }
        }

        if !params.silent {
            for name in &created_indexes {
                info!(collection = %params.collection_name, index = %name, "Created index");
            }
            for name in &dropped_indexes {
                info!(collection = %params.collection_name, index = %name, "Dropped index");
            }
        }

        Ok(MigrateCollectionResult {
            name: params.collection_name,
            created_indexes,
            dropped_indexes,
        })
    }
}

fn position_of(documents: &[Document], descriptor: &Object) -> Option<usize> {
    if descriptor.is_empty() {
        return None;
    }
    documents.iter().position(|document| {
        descriptor
            .iter()
            .all(|(name, value)| document.get(name) == Some(value))
    })
}

fn check_unique_indexes(
    collection_name: &str,
    collection: &Collection,
    document: &Document,
    exclude: Option<usize>,
) -> Result<()> {
    let document = Value::Object(document.clone());
    for index in collection.indexes.iter().filter(|index| index.is_unique) {
        let key = index_key(&document, index);
        if key.iter().all(Value::is_undefined) {
            continue;
        }
        let taken = collection
            .documents
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != exclude)
            .any(|(_, other)| index_key(&Value::Object(other.clone()), index) == key);
        if taken {
            return Err(ComponentryError::DuplicateKey {
                collection: collection_name.to_string(),
                index_name: index.name(),
            });
        }
    }
    Ok(())
}

fn index_key(document: &Value, index: &IndexSchema) -> Vec<Value> {
    index
        .attributes
        .keys()
        .map(|path| get_path(document, path).cloned().unwrap_or_default())
        .collect()
}

fn compare_for_sort(a: &Document, b: &Document, sort: &IndexMap<String, SortDirection>) -> Ordering {
    let a = Value::Object(a.clone());
    let b = Value::Object(b.clone());
    for (path, direction) in sort {
        let left = get_path(&a, path).unwrap_or(&Value::Undefined);
        let right = get_path(&b, path).unwrap_or(&Value::Undefined);
        let ordering = sort_order(left, right);
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Undefined | Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Date(_) => 4,
        _ => 5,
    }
}

/// Total order used for sorting: missing values first, then by type, then by value.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

/// Ordering between two values of the same scalar type.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches_all(context: &Value, expressions: &[Expression]) -> Result<bool> {
    for expression in expressions {
        if !evaluate(context, expression)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate(context: &Value, expression: &Expression) -> Result<bool> {
    let value = get_path(context, &expression.path).unwrap_or(&Value::Undefined);

    match (&expression.operator, &expression.operand) {
        (Operator::Not, Operand::Expressions(expressions)) => {
            Ok(!matches_all(context, expressions)?)
        }
        (Operator::Some, Operand::Expressions(expressions)) => {
            let Some(items) = value.as_array() else {
                return Ok(false);
            };
            for item in items {
                if matches_all(item, expressions)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Operator::Every, Operand::Expressions(expressions)) => {
            let Some(items) = value.as_array() else {
                return Ok(false);
            };
            for item in items {
                if !matches_all(item, expressions)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Operator::And, Operand::ExpressionLists(lists)) => {
            for list in lists {
                if !matches_all(context, list)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Operator::Or, Operand::ExpressionLists(lists)) => {
            for list in lists {
                if matches_all(context, list)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Operator::Nor, Operand::ExpressionLists(lists)) => {
            for list in lists {
                if matches_all(context, list)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (operator, Operand::Value(operand)) => evaluate_scalar(*operator, value, operand),
        (operator, _) => Err(ComponentryError::Backend(format!(
            "Malformed expression for operator '{}'",
            operator
        ))),
    }
}

fn evaluate_scalar(operator: Operator, value: &Value, operand: &Value) -> Result<bool> {
    Ok(match operator {
        Operator::Equal => value == operand,
        Operator::NotEqual => value != operand,
        Operator::GreaterThan => compare_values(value, operand) == Some(Ordering::Greater),
        Operator::GreaterThanOrEqual => matches!(
            compare_values(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::LessThan => compare_values(value, operand) == Some(Ordering::Less),
        Operator::LessThanOrEqual => matches!(
            compare_values(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => operand
            .as_array()
            .map(|candidates| candidates.contains(value))
            .unwrap_or(false),
        Operator::Includes => match (value, operand) {
            (Value::String(text), Value::String(part)) => text.contains(part.as_str()),
            (Value::Array(items), operand) => items.contains(operand),
            _ => false,
        },
        Operator::StartsWith => match (value.as_str(), operand.as_str()) {
            (Some(text), Some(prefix)) => text.starts_with(prefix),
            _ => false,
        },
        Operator::EndsWith => match (value.as_str(), operand.as_str()) {
            (Some(text), Some(suffix)) => text.ends_with(suffix),
            _ => false,
        },
        Operator::Matches => match (value.as_str(), operand) {
            (Some(text), Value::RegExp(regexp)) => regexp.to_regex()?.is_match(text),
            _ => false,
        },
        Operator::Length => {
            let length = match value {
                Value::String(text) => Some(text.chars().count()),
                Value::Array(items) => Some(items.len()),
                _ => None,
            };
            match (length, operand.as_f64()) {
                (Some(length), Some(expected)) => length as f64 == expected,
                _ => false,
            }
        }
        compound => {
            return Err(ComponentryError::Backend(format!(
                "Malformed expression for operator '{}'",
                compound
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::DocumentPatch;
    use crate::store::query::to_document_expressions;
    use crate::store::schema::CollectionSchema;
    use indexmap::IndexSet;
    use serde_json::json;

    fn document(json: serde_json::Value) -> Document {
        match Value::from_json(json) {
            Value::Object(object) => object,
            other => panic!("not an object: {}", other),
        }
    }

    fn descriptor(id: &str) -> Object {
        document(json!({ "id": id }))
    }

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for movie in [
            json!({"__component": "Movie", "id": "1", "title": "Inception", "year": 2010,
                   "tags": ["sci-fi", "heist"], "director": {"__component": "Person", "id": "p1"}}),
            json!({"__component": "Movie", "id": "2", "title": "Interstellar", "year": 2014,
                   "tags": ["sci-fi"], "director": {"__component": "Person", "id": "p1"}}),
            json!({"__component": "Movie", "id": "3", "title": "Amélie", "year": 2001,
                   "tags": ["romance", "comedy"]}),
        ] {
            let movie = document(movie);
            let id = movie["id"].as_str().unwrap().to_string();
            assert!(backend
                .create_document(CreateDocumentParams {
                    collection_name: "Movie".into(),
                    identifier_descriptor: descriptor(&id),
                    document: movie,
                })
                .unwrap());
        }
        backend
    }

    fn find_ids(backend: &MemoryBackend, query: serde_json::Value) -> Vec<String> {
        find_ids_with(backend, query, FindDocumentsParams::default())
    }

    fn find_ids_with(
        backend: &MemoryBackend,
        query: serde_json::Value,
        params: FindDocumentsParams,
    ) -> Vec<String> {
        let expressions = to_document_expressions(&Value::from_json(query)).unwrap();
        backend
            .find_documents(FindDocumentsParams {
                collection_name: "Movie".into(),
                expressions,
                ..params
            })
            .unwrap()
            .iter()
            .map(|document| document["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn create_refuses_existing_identifiers() {
        let backend = seeded();
        let created = backend
            .create_document(CreateDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("1"),
                document: document(json!({"id": "1"})),
            })
            .unwrap();
        assert!(!created);
        assert_eq!(backend.documents("Movie").len(), 3);
    }

    #[test]
    fn read_projects_and_misses() {
        let backend = seeded();
        let mut projection = IndexMap::new();
        projection.insert("title".to_string(), 1);
        let read = backend
            .read_document(ReadDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("1"),
                projection: Some(projection),
            })
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(read).to_json().unwrap(), json!({"title": "Inception"}));

        let missing = backend
            .read_document(ReadDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("9"),
                projection: None,
            })
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn update_and_delete_report_misses() {
        let backend = seeded();
        let patch = DocumentPatch {
            set: IndexMap::from_iter([("title".to_string(), Value::from("Inception (2010)"))]),
            unset: IndexSet::from_iter(["tags".to_string()]),
        };
        assert!(backend
            .update_document(UpdateDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("1"),
                document_patch: patch.clone(),
            })
            .unwrap());
        let updated = &backend.documents("Movie")[0];
        assert_eq!(updated["title"], Value::from("Inception (2010)"));
        assert!(!updated.contains_key("tags"));

        assert!(!backend
            .update_document(UpdateDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("9"),
                document_patch: patch,
            })
            .unwrap());

        let delete = |id: &str| {
            backend
                .delete_document(DeleteDocumentParams {
                    collection_name: "Movie".into(),
                    identifier_descriptor: descriptor(id),
                })
                .unwrap()
        };
        assert!(delete("2"));
        assert!(!delete("2"));
        assert_eq!(backend.documents("Movie").len(), 2);
    }

    #[test]
    fn comparison_operators() {
        let backend = seeded();
        assert_eq!(find_ids(&backend, json!({})), vec!["1", "2", "3"]);
        assert_eq!(find_ids(&backend, json!({"title": "Inception"})), vec!["1"]);
        assert_eq!(find_ids(&backend, json!({"year": {"$greaterThan": 2005}})), vec!["1", "2"]);
        assert_eq!(
            find_ids(&backend, json!({"year": {"$greaterThanOrEqual": 2010, "$lessThan": 2014}})),
            vec!["1"]
        );
        assert_eq!(find_ids(&backend, json!({"year": {"$lessThanOrEqual": 2001}})), vec!["3"]);
        assert_eq!(find_ids(&backend, json!({"year": {"$notEqual": 2010}})), vec!["2", "3"]);
        assert_eq!(find_ids(&backend, json!({"year": {"$in": [2001, 2014]}})), vec!["2", "3"]);
    }

    #[test]
    fn string_operators() {
        let backend = seeded();
        assert_eq!(find_ids(&backend, json!({"title": {"$startsWith": "In"}})), vec!["1", "2"]);
        assert_eq!(find_ids(&backend, json!({"title": {"$endsWith": "lie"}})), vec!["3"]);
        assert_eq!(find_ids(&backend, json!({"title": {"$includes": "ter"}})), vec!["2"]);
        assert_eq!(find_ids(&backend, json!({"title": {"$length": 9}})), vec!["1"]);

        let query = Value::object([(
            "title",
            Value::object([("$matches", Value::RegExp(crate::value::RegExp::new("^inc", "i")))]),
        )]);
        let found = backend
            .find_documents(FindDocumentsParams {
                collection_name: "Movie".into(),
                expressions: to_document_expressions(&query).unwrap(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn array_operators() {
        let backend = seeded();
        assert_eq!(find_ids(&backend, json!({"tags": {"$includes": "heist"}})), vec!["1"]);
        assert_eq!(find_ids(&backend, json!({"tags": {"$some": "comedy"}})), vec!["3"]);
        assert_eq!(find_ids(&backend, json!({"tags": {"$every": "sci-fi"}})), vec!["2"]);
        assert_eq!(
            find_ids(&backend, json!({"tags": {"$some": {"$startsWith": "rom"}}})),
            vec!["3"]
        );
        assert_eq!(find_ids(&backend, json!({"tags": {"$length": 2}})), vec!["1", "3"]);
    }

    #[test]
    fn nested_and_logical_operators() {
        let backend = seeded();
        assert_eq!(find_ids(&backend, json!({"director": {"id": "p1"}})), vec!["1", "2"]);
        assert_eq!(
            find_ids(&backend, json!({"$or": [{"year": 2001}, {"title": "Interstellar"}]})),
            vec!["2", "3"]
        );
        assert_eq!(
            find_ids(&backend, json!({"$and": [{"year": {"$greaterThan": 2000}}, {"tags": {"$includes": "sci-fi"}}]})),
            vec!["1", "2"]
        );
        assert_eq!(
            find_ids(&backend, json!({"$nor": [{"year": 2001}, {"year": 2014}]})),
            vec!["1"]
        );
        assert_eq!(
            find_ids(&backend, json!({"year": {"$not": {"$lessThan": 2010}}})),
            vec!["1", "2"]
        );
    }

    #[test]
    fn sort_skip_and_limit() {
        let backend = seeded();
        let mut sort = IndexMap::new();
        sort.insert("year".to_string(), SortDirection::Desc);
        let params = FindDocumentsParams {
            sort: sort.clone(),
            ..Default::default()
        };
        assert_eq!(find_ids_with(&backend, json!({}), params), vec!["2", "1", "3"]);

        let params = FindDocumentsParams {
            sort,
            skip: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(find_ids_with(&backend, json!({}), params), vec!["1"]);
    }

    #[test]
    fn count_uses_expressions() {
        let backend = seeded();
        let count = backend
            .count_documents(CountDocumentsParams {
                collection_name: "Movie".into(),
                expressions: to_document_expressions(&Value::from_json(
                    json!({"tags": {"$includes": "sci-fi"}}),
                ))
                .unwrap(),
            })
            .unwrap();
        assert_eq!(count, 2);
        let empty = backend
            .count_documents(CountDocumentsParams {
                collection_name: "Unknown".into(),
                expressions: Vec::new(),
            })
            .unwrap();
        assert_eq!(empty, 0);
    }

    fn unique_title_schema() -> CollectionSchema {
        let mut id = IndexMap::new();
        id.insert("id".to_string(), SortDirection::Asc);
        let mut title = IndexMap::new();
        title.insert("title".to_string(), SortDirection::Asc);
        CollectionSchema {
            indexes: vec![
                IndexSchema {
                    attributes: id,
                    is_primary: true,
                    is_unique: true,
                },
                IndexSchema {
                    attributes: title,
                    is_primary: false,
                    is_unique: true,
                },
            ],
        }
    }

    #[test]
    fn migration_diffs_index_names() {
        let backend = seeded();
        let result = backend
            .migrate_collection(MigrateCollectionParams {
                collection_name: "Movie".into(),
                collection_schema: unique_title_schema(),
                silent: true,
            })
            .unwrap();
        assert_eq!(result.created_indexes, vec!["id:asc", "title:asc"]);
        assert!(result.dropped_indexes.is_empty());

        let mut schema = unique_title_schema();
        schema.indexes.pop();
        let result = backend
            .migrate_collection(MigrateCollectionParams {
                collection_name: "Movie".into(),
                collection_schema: schema,
                silent: true,
            })
            .unwrap();
        assert!(result.created_indexes.is_empty());
        assert_eq!(result.dropped_indexes, vec!["title:asc"]);
        assert_eq!(backend.index_names("Movie"), vec!["id:asc"]);
    }

    #[test]
    fn unique_indexes_reject_duplicates() {
        let backend = seeded();
        backend
            .migrate_collection(MigrateCollectionParams {
                collection_name: "Movie".into(),
                collection_schema: unique_title_schema(),
                silent: true,
            })
            .unwrap();

        let err = backend
            .create_document(CreateDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("4"),
                document: document(json!({"id": "4", "title": "Inception"})),
            })
            .unwrap_err();
        match err {
            ComponentryError::DuplicateKey { index_name, .. } => {
                assert_eq!(index_name, "title:asc")
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = backend
            .update_document(UpdateDocumentParams {
                collection_name: "Movie".into(),
                identifier_descriptor: descriptor("2"),
                document_patch: DocumentPatch {
                    set: IndexMap::from_iter([("title".to_string(), Value::from("Inception"))]),
                    unset: IndexSet::new(),
                },
            })
            .unwrap_err();
        assert!(matches!(err, ComponentryError::DuplicateKey { .. }));
        assert_eq!(backend.documents("Movie")[1]["title"], Value::from("Interstellar"));
    }

    #[test]
    fn simulated_failures() {
        let backend = seeded();
        backend.set_simulate_failure(true);
        let result = backend.count_documents(CountDocumentsParams {
            collection_name: "Movie".into(),
            expressions: Vec::new(),
        });
        assert!(matches!(result, Err(ComponentryError::Backend(_))));
        backend.set_simulate_failure(false);
        assert!(backend
            .count_documents(CountDocumentsParams {
                collection_name: "Movie".into(),
                expressions: Vec::new(),
            })
            .is_ok());
    }
}
