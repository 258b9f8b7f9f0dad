use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use arc_swap::ArcSwap;
use bson::{Bson, Document};
use docshape_query::{AggregateOptions, FilterGroup, Pipeline, Query, Update};
use imbl::Vector;
use tracing::trace;

use super::eval::{self, HashKey};
use super::{pipeline, update};
use crate::error::StoreError;
use crate::store::{
    CollectionOptions, DocumentIter, IndexSpec, InsertManyResult, Store, UpdateResult,
    WriteFailure, WriteFailureKind, ensure_id,
};

pub(crate) type Documents = Vector<Document>;

struct UniqueIndex {
    spec: IndexSpec,
    keys: HashSet<Vec<HashKey>>,
}

impl UniqueIndex {
    fn key_of(&self, doc: &Document) -> Vec<HashKey> {
        self.spec
            .keys
            .iter()
            .map(|key| HashKey::of(eval::get_path(doc, key.field())))
            .collect()
    }
}

#[derive(Default)]
struct CollectionState {
    options: CollectionOptions,
    ids: HashSet<HashKey>,
    indexes: Vec<IndexSpec>,
    unique: Vec<UniqueIndex>,
}

impl CollectionState {
    fn missing_required(&self, doc: &Document) -> Option<&str> {
        self.options
            .required_fields
            .iter()
            .find(|field| std::matches!(doc.get(field.as_str()), None | Some(Bson::Null)))
            .map(String::as_str)
    }
}

/// A collection is a structurally shared snapshot plus the write-side state.
/// Readers load the snapshot without locking; writers serialize on `state`
/// and publish a new snapshot when done.
struct MemoryCollection {
    docs: ArcSwap<Documents>,
    state: Mutex<CollectionState>,
}

impl MemoryCollection {
    fn new(options: CollectionOptions) -> Self {
        Self {
            docs: ArcSwap::from_pointee(Vector::new()),
            state: Mutex::new(CollectionState {
                options,
                ..CollectionState::default()
            }),
        }
    }
}

/// In-process document store on `imbl` snapshots.
///
/// Unique indexes are enforced on insert only; updates never violate them in
/// this workload and are not checked.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {e}"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn collection(&self, name: &str) -> Result<Option<Arc<MemoryCollection>>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(name).cloned())
    }

    fn collection_or_create(&self, name: &str) -> Result<Arc<MemoryCollection>, StoreError> {
        if let Some(existing) = self.collection(name)? {
            return Ok(existing);
        }
        let mut collections = self.collections.write().map_err(poisoned)?;
        Ok(collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(CollectionOptions::default())))
            .clone())
    }

    /// Snapshot of a collection. Cheap due to imbl structural sharing.
    fn snapshot(&self, name: &str) -> Result<Documents, StoreError> {
        Ok(match self.collection(name)? {
            Some(collection) => (**collection.docs.load()).clone(),
            None => Vector::new(),
        })
    }

    pub fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Names of the secondary indexes on a collection, in creation order.
    pub fn index_names(&self, name: &str) -> Result<Vec<String>, StoreError> {
        let Some(collection) = self.collection(name)? else {
            return Ok(Vec::new());
        };
        let state = collection.state.lock().map_err(poisoned)?;
        Ok(state.indexes.iter().map(IndexSpec::name).collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(options.clone())));
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.remove(name);
        Ok(())
    }

    fn drop_database(&self) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.clear();
        Ok(())
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        let target = self.collection_or_create(collection)?;
        let mut state = target.state.lock().map_err(poisoned)?;
        let name = index.name();
        if state.indexes.iter().any(|existing| existing.name() == name) {
            return Ok(());
        }

        if index.unique {
            let mut unique = UniqueIndex {
                spec: index.clone(),
                keys: HashSet::new(),
            };
            for doc in target.docs.load().iter() {
                let key = unique.key_of(doc);
                if !unique.keys.insert(key) {
                    return Err(StoreError::Backend(format!(
                        "E11000 duplicate key error collection: {collection} index: {name}; cannot build unique index"
                    )));
                }
            }
            state.unique.push(unique);
        }
        state.indexes.push(index.clone());
        trace!(collection, index = %name, "index created");
        Ok(())
    }

    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        let target = self.collection_or_create(collection)?;
        let mut state = target.state.lock().map_err(poisoned)?;
        let mut current = (**target.docs.load()).clone();
        let mut result = InsertManyResult::default();

        for (index, doc) in docs.into_iter().enumerate() {
            let (id, doc) = ensure_id(doc);

            if let Some(field) = state.missing_required(&doc) {
                result.failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::Validation,
                    message: format!(
                        "Document failed validation: missing required field '{field}'"
                    ),
                });
                continue;
            }

            let id_key = HashKey::of(Some(&id));
            if state.ids.contains(&id_key) {
                result.failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::DuplicateKey,
                    message: format!(
                        "E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {id} }}"
                    ),
                });
                continue;
            }

            let unique_keys: Vec<Vec<HashKey>> =
                state.unique.iter().map(|u| u.key_of(&doc)).collect();
            if let Some(clash) = state
                .unique
                .iter()
                .zip(&unique_keys)
                .find(|(u, key)| u.keys.contains(*key))
                .map(|(u, _)| u.spec.name())
            {
                result.failures.push(WriteFailure {
                    index,
                    kind: WriteFailureKind::DuplicateKey,
                    message: format!(
                        "E11000 duplicate key error collection: {collection} index: {clash}"
                    ),
                });
                continue;
            }

            state.ids.insert(id_key);
            for (unique, key) in state.unique.iter_mut().zip(unique_keys) {
                unique.keys.insert(key);
            }
            current.push_back(doc);
            result.inserted_ids.push((index, id));
        }

        target.docs.store(Arc::new(current));
        Ok(result)
    }

    fn count(&self, collection: &str, filter: &FilterGroup) -> Result<u64, StoreError> {
        let snapshot = self.snapshot(collection)?;
        Ok(snapshot
            .iter()
            .filter(|doc| eval::matches(doc, filter))
            .count() as u64)
    }

    fn find(&self, collection: &str, query: &Query) -> Result<DocumentIter<'_>, StoreError> {
        let snapshot = self.snapshot(collection)?;
        let filter = query.filter.clone();
        let mut rows: Box<dyn Iterator<Item = Document>> = Box::new(
            snapshot
                .into_iter()
                .filter(move |doc| eval::matches(doc, &filter)),
        );

        if !query.sort.is_empty() {
            let mut sorted: Vec<Document> = rows.collect();
            pipeline::sort_documents(&mut sorted, &query.sort);
            rows = Box::new(sorted.into_iter());
        }
        if let Some(take) = query.take {
            rows = Box::new(rows.take(take));
        }
        Ok(Box::new(rows.map(Ok)))
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &FilterGroup,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let Some(target) = self.collection(collection)? else {
            return Ok(UpdateResult::default());
        };
        let _state = target.state.lock().map_err(poisoned)?;
        let mut current = (**target.docs.load()).clone();
        let mut result = UpdateResult::default();

        for position in 0..current.len() {
            let Some(existing) = current.get(position) else {
                break;
            };
            if !eval::matches(existing, filter) {
                continue;
            }
            result.matched += 1;
            let mut doc = existing.clone();
            if update::apply(&mut doc, update)? {
                current.set(position, doc);
                result.modified += 1;
            }
        }

        target.docs.store(Arc::new(current));
        Ok(result)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<DocumentIter<'_>, StoreError> {
        trace!(
            collection,
            allow_disk_use = options.allow_disk_use,
            "aggregate runs fully in memory"
        );
        let input: Vec<Document> = self.snapshot(collection)?.into_iter().collect();
        let resolve = |name: &str| -> Result<Vec<Document>, StoreError> {
            Ok(self.snapshot(name)?.into_iter().collect())
        };
        let output = pipeline::run(input, pipeline, &resolve)?;
        Ok(Box::new(output.into_iter().map(Ok)))
    }
}
