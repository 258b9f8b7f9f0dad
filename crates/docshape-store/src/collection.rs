use std::marker::PhantomData;

use bson::Document;
use docshape_query::{AggregateOptions, FilterGroup, Pipeline, Query};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::store::{
    DocumentIter, IndexSpec, InsertManyResult, Store, WriteFailure, WriteFailureKind,
};

/// Binds a collection name to the record shapes written to and read from it.
pub trait Schema {
    const NAME: &'static str;
    type Insert: Serialize;
    type Stored: DeserializeOwned;
}

/// Typed handle over one collection of a [`Store`].
pub struct Collection<'s, S: ?Sized, M> {
    store: &'s S,
    _schema: PhantomData<fn() -> M>,
}

impl<S: ?Sized, M> Clone for Collection<'_, S, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized, M> Copy for Collection<'_, S, M> {}

impl<'s, S: Store + ?Sized, M: Schema> Collection<'s, S, M> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            _schema: PhantomData,
        }
    }

    pub fn create_indexes(&self, indexes: &[IndexSpec]) -> Result<(), StoreError> {
        for index in indexes {
            self.store.create_index(M::NAME, index)?;
        }
        Ok(())
    }

    /// Serializes and inserts `records` unordered. A record that fails to
    /// serialize is reported as a validation failure at its position and is
    /// never sent to the store.
    pub fn insert_many(&self, records: &[M::Insert]) -> Result<InsertManyResult, StoreError> {
        let mut docs = Vec::with_capacity(records.len());
        let mut positions = Vec::with_capacity(records.len());
        let mut failures = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match bson::to_document(record) {
                Ok(doc) => {
                    positions.push(index);
                    docs.push(doc);
                }
                Err(e) => failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::Validation,
                    message: e.to_string(),
                }),
            }
        }

        if docs.is_empty() {
            return Ok(InsertManyResult {
                inserted_ids: Vec::new(),
                failures,
            });
        }

        let result = self.store.insert_many(M::NAME, docs)?;

        // Map batch positions back to positions in `records`.
        let inserted_ids = result
            .inserted_ids
            .into_iter()
            .map(|(i, id)| (positions[i], id))
            .collect();
        failures.extend(result.failures.into_iter().map(|mut f| {
            f.index = positions[f.index];
            f
        }));
        failures.sort_by_key(|f| f.index);

        Ok(InsertManyResult {
            inserted_ids,
            failures,
        })
    }

    pub fn count(&self, filter: &FilterGroup) -> Result<u64, StoreError> {
        self.store.count(M::NAME, filter)
    }

    pub fn find(&self, query: &Query) -> Result<TypedIter<'s, M::Stored>, StoreError> {
        Ok(TypedIter::new(self.store.find(M::NAME, query)?))
    }

    /// Runs a pipeline over this collection; output rows have their own shape.
    pub fn aggregate<R: DeserializeOwned>(
        &self,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<TypedIter<'s, R>, StoreError> {
        Ok(TypedIter::new(self.store.aggregate(
            M::NAME,
            pipeline,
            options,
        )?))
    }
}

/// Cursor that decodes each document into `T` as it is pulled.
pub struct TypedIter<'a, T> {
    inner: DocumentIter<'a>,
    _shape: PhantomData<fn() -> T>,
}

impl<'a, T> TypedIter<'a, T> {
    pub fn new(inner: DocumentIter<'a>) -> Self {
        Self {
            inner,
            _shape: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for TypedIter<'_, T> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let doc: Document = match self.inner.next()? {
            Ok(doc) => doc,
            Err(e) => return Some(Err(e)),
        };
        Some(bson::from_document(doc).map_err(StoreError::from))
    }
}
