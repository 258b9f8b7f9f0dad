use bson::oid::ObjectId;
use bson::{Bson, Document};
use docshape_query::{AggregateOptions, FilterGroup, Pipeline, Query, Update};

use crate::error::StoreError;

pub type DocumentIter<'a> = Box<dyn Iterator<Item = Result<Document, StoreError>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    Asc(String),
    Text(String),
}

impl IndexKey {
    pub fn field(&self) -> &str {
        match self {
            IndexKey::Asc(field) | IndexKey::Text(field) => field,
        }
    }
}

/// Secondary index definition. Only `unique` indexes change write behaviour;
/// the rest are access-path hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey::Asc(field.into())],
            unique: false,
        }
    }

    pub fn compound(fields: &[&str]) -> Self {
        Self {
            keys: fields
                .iter()
                .map(|f| IndexKey::Asc(f.to_string()))
                .collect(),
            unique: false,
        }
    }

    pub fn text(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey::Text(field.into())],
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Server-style index name, e.g. `first_name_1_last_name_1` or `name_text`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| match key {
                IndexKey::Asc(field) => format!("{field}_1"),
                IndexKey::Text(field) => format!("{field}_text"),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Top-level fields every inserted document must carry.
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteFailureKind {
    DuplicateKey,
    Validation,
}

/// A single rejected document within a bulk insert.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    /// Position of the document in the submitted batch.
    pub index: usize,
    pub kind: WriteFailureKind,
    pub message: String,
}

/// Outcome of an unordered bulk insert. Every submitted position appears in
/// exactly one of the two lists, both in ascending position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<(usize, Bson)>,
    pub failures: Vec<WriteFailure>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }
}

/// Ensures `_id` is present and first, generating an ObjectId when absent.
pub(crate) fn ensure_id(doc: Document) -> (Bson, Document) {
    if let Some(id) = doc.get("_id") {
        return (id.clone(), doc);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (key, value) in doc {
        out.insert(key, value);
    }
    (id, out)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// A document store. Collections are created implicitly by the first write;
/// reads against a missing collection see an empty one.
pub trait Store: Send + Sync {
    /// Creates a collection with document validation. Succeeds if it already exists.
    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Result<(), StoreError>;

    fn drop_collection(&self, name: &str) -> Result<(), StoreError>;

    fn drop_database(&self) -> Result<(), StoreError>;

    fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError>;

    /// Unordered insert: a rejected document does not stop the rest of the
    /// batch. Per-document duplicate-key and validation rejections are
    /// reported in the result; any other failure is an `Err`.
    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError>;

    fn count(&self, collection: &str, filter: &FilterGroup) -> Result<u64, StoreError>;

    fn find(&self, collection: &str, query: &Query) -> Result<DocumentIter<'_>, StoreError>;

    fn update_many(
        &self,
        collection: &str,
        filter: &FilterGroup,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<DocumentIter<'_>, StoreError>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Result<(), StoreError> {
        (**self).create_collection(name, options)
    }

    fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        (**self).drop_collection(name)
    }

    fn drop_database(&self) -> Result<(), StoreError> {
        (**self).drop_database()
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        (**self).create_index(collection, index)
    }

    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        (**self).insert_many(collection, docs)
    }

    fn count(&self, collection: &str, filter: &FilterGroup) -> Result<u64, StoreError> {
        (**self).count(collection, filter)
    }

    fn find(&self, collection: &str, query: &Query) -> Result<DocumentIter<'_>, StoreError> {
        (**self).find(collection, query)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &FilterGroup,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        (**self).update_many(collection, filter, update)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<DocumentIter<'_>, StoreError> {
        (**self).aggregate(collection, pipeline, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_follow_server_convention() {
        assert_eq!(IndexSpec::asc("company_id").name(), "company_id_1");
        assert_eq!(
            IndexSpec::compound(&["first_name", "last_name"]).name(),
            "first_name_1_last_name_1"
        );
        assert_eq!(IndexSpec::text("name").name(), "name_text");
    }
}
