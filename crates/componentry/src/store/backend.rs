use indexmap::IndexMap;

use crate::error::Result;
use crate::value::{Object, Value};

use super::document::{Document, DocumentPatch, Projection};
use super::query::{expressions_to_value, Expression};
use super::schema::{CollectionSchema, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDocumentParams {
    pub collection_name: String,
    pub identifier_descriptor: Object,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadDocumentParams {
    pub collection_name: String,
    pub identifier_descriptor: Object,
    pub projection: Option<Projection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDocumentParams {
    pub collection_name: String,
    pub identifier_descriptor: Object,
    pub document_patch: DocumentPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDocumentParams {
    pub collection_name: String,
    pub identifier_descriptor: Object,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindDocumentsParams {
    pub collection_name: String,
    pub expressions: Vec<Expression>,
    pub projection: Option<Projection>,
    pub sort: IndexMap<String, SortDirection>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountDocumentsParams {
    pub collection_name: String,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrateCollectionParams {
    pub collection_name: String,
    pub collection_schema: CollectionSchema,
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MigrateCollectionResult {
    pub name: String,
    pub created_indexes: Vec<String>,
    pub dropped_indexes: Vec<String>,
}

impl From<&MigrateCollectionResult> for Value {
    fn from(result: &MigrateCollectionResult) -> Self {
        Value::object([
            ("name", Value::from(result.name.as_str())),
            ("createdIndexes", Value::from(result.created_indexes.clone())),
            ("droppedIndexes", Value::from(result.dropped_indexes.clone())),
        ])
    }
}

/// Abstract interface for document persistence.
/// The backend handles the "how" (a database, an in-memory map),
/// while `Store` handles the "what" (components, selectors, validation).
///
/// Documents arrive already serialized for the store: references to other
/// storables are reduced to their identifiers and `undefined` values are
/// either stripped (create) or turned into `$unset` entries (update).
pub trait StoreBackend {
    // --- Single Documents ---

    /// Insert a document.
    /// Returns Ok(false) if a document with the same identifiers already exists.
    /// Returns Err(DuplicateKey) if a unique index would be violated.
    fn create_document(&self, params: CreateDocumentParams) -> Result<bool>;

    /// Read one document by identifier, keeping only the projected paths.
    /// Returns Ok(None) if no document matches.
    fn read_document(&self, params: ReadDocumentParams) -> Result<Option<Document>>;

    /// Apply a patch to one document.
    /// Returns Ok(false) if no document matches.
    /// Returns Err(DuplicateKey) if a unique index would be violated.
    fn update_document(&self, params: UpdateDocumentParams) -> Result<bool>;

    /// Returns Ok(false) if no document matches.
    fn delete_document(&self, params: DeleteDocumentParams) -> Result<bool>;

    // --- Queries ---

    /// Documents matching every expression, sorted then skipped then limited.
    fn find_documents(&self, params: FindDocumentsParams) -> Result<Vec<Document>>;

    fn count_documents(&self, params: CountDocumentsParams) -> Result<usize>;

    // --- Schema ---

    /// Bring the collection's indexes in line with the schema.
    fn migrate_collection(&self, params: MigrateCollectionParams)
        -> Result<MigrateCollectionResult>;
}

// Trace renderings of the parameters, in the wire's camelCase.

impl CreateDocumentParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("identifierDescriptor", Value::Object(self.identifier_descriptor.clone())),
            ("document", Value::Object(self.document.clone())),
        ])
    }
}

impl ReadDocumentParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("identifierDescriptor", Value::Object(self.identifier_descriptor.clone())),
            ("projection", projection_to_value(self.projection.as_ref())),
        ])
    }
}

impl UpdateDocumentParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("identifierDescriptor", Value::Object(self.identifier_descriptor.clone())),
            ("documentPatch", self.document_patch.to_value()),
        ])
    }
}

impl DeleteDocumentParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("identifierDescriptor", Value::Object(self.identifier_descriptor.clone())),
        ])
    }
}

impl FindDocumentsParams {
    pub fn to_value(&self) -> Value {
        let sort: Object = self
            .sort
            .iter()
            .map(|(path, direction)| (path.clone(), Value::from(direction.as_str())))
            .collect();
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("expressions", expressions_to_value(&self.expressions)),
            ("projection", projection_to_value(self.projection.as_ref())),
            ("sort", Value::Object(sort)),
            ("skip", Value::from(self.skip)),
            ("limit", Value::from(self.limit)),
        ])
    }
}

impl CountDocumentsParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("expressions", expressions_to_value(&self.expressions)),
        ])
    }
}

impl MigrateCollectionParams {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("collectionName", Value::from(self.collection_name.as_str())),
            ("indexes", Value::from(self.collection_schema.index_names())),
            ("silent", Value::from(self.silent)),
        ])
    }
}

fn projection_to_value(projection: Option<&Projection>) -> Value {
    match projection {
        None => Value::Undefined,
        Some(projection) => Value::Object(
            projection
                .iter()
                .map(|(path, flag)| (path.clone(), Value::from(*flag as i32)))
                .collect(),
        ),
    }
}
