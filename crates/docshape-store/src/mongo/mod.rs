mod translate;

use std::collections::HashSet;
use std::time::Duration;

use bson::{Document, doc};
use docshape_query::{AggregateOptions, FilterGroup, Pipeline, Query, Update};
use mongodb::IndexModel;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::sync::{Client, Collection, Database};
use tracing::{debug, info};

use self::translate::Modifications;
use crate::error::StoreError;
use crate::store::{
    CollectionOptions, DocumentIter, IndexSpec, InsertManyResult, Store, UpdateResult,
    WriteFailure, WriteFailureKind, ensure_id,
};

const DUPLICATE_KEY_CODES: [i32; 3] = [11000, 11001, 12582];
const DOCUMENT_VALIDATION_FAILURE: i32 = 121;
const NAMESPACE_EXISTS: i32 = 48;

/// Connection settings for [`MongoStore`].
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub retry_writes: bool,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".into(),
            database: "docshape".into(),
            max_pool_size: 50,
            retry_writes: true,
            connect_timeout: Duration::from_secs(10),
            server_selection_timeout: Duration::from_secs(10),
        }
    }
}

/// [`Store`] backed by a MongoDB database through the blocking driver API.
pub struct MongoStore {
    database: Database,
}

fn backend_error(e: MongoError) -> StoreError {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => StoreError::Connection(e.to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}

impl MongoStore {
    /// Connects and pings the server so an unreachable store fails here
    /// rather than on the first write.
    pub fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri)
            .run()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.max_pool_size = Some(config.max_pool_size);
        options.retry_writes = Some(config.retry_writes);
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.server_selection_timeout);
        options
            .app_name
            .get_or_insert_with(|| "docshape".to_string());

        let client = Client::with_options(options).map_err(backend_error)?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .run()
            .map_err(backend_error)?;

        info!(
            database = %config.database,
            max_pool_size = config.max_pool_size,
            retry_writes = config.retry_writes,
            "connected to mongodb"
        );
        Ok(Self { database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

/// Splits a bulk insert failure into per-document rejections. Anything other
/// than duplicate-key or validation write errors is fatal.
fn rejected_writes(collection: &str, e: MongoError) -> Result<Vec<WriteFailure>, StoreError> {
    match e.kind.as_ref() {
        ErrorKind::InsertMany(failure) => {
            if let Some(concern) = &failure.write_concern_error {
                return Err(StoreError::Backend(format!(
                    "write concern error on {collection}: {}",
                    concern.message
                )));
            }
            let mut rejected = Vec::new();
            for write in failure.write_errors.iter().flatten() {
                let kind = match write.code {
                    code if DUPLICATE_KEY_CODES.contains(&code) => WriteFailureKind::DuplicateKey,
                    DOCUMENT_VALIDATION_FAILURE => WriteFailureKind::Validation,
                    code => {
                        return Err(StoreError::Backend(format!(
                            "write error {code} on {collection}: {}",
                            write.message
                        )));
                    }
                };
                rejected.push(WriteFailure {
                    index: write.index,
                    kind,
                    message: write.message.clone(),
                });
            }
            rejected.sort_by_key(|f| f.index);
            Ok(rejected)
        }
        _ => Err(backend_error(e)),
    }
}

impl Store for MongoStore {
    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Result<(), StoreError> {
        let mut action = self.database.create_collection(name);
        if !options.required_fields.is_empty() {
            action = action.validator(translate::validator(&options.required_fields));
        }
        match action.run() {
            Ok(()) => Ok(()),
            Err(e) if std::matches!(e.kind.as_ref(), ErrorKind::Command(c) if c.code == NAMESPACE_EXISTS) => {
                Ok(())
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        self.collection(name).drop().run().map_err(backend_error)
    }

    fn drop_database(&self) -> Result<(), StoreError> {
        self.database.drop().run().map_err(backend_error)
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        let mut model = IndexModel::builder()
            .keys(translate::index_keys(index))
            .build();
        if index.unique {
            model.options = Some(IndexOptions::builder().unique(true).build());
        }
        self.collection(collection)
            .create_index(model)
            .run()
            .map_err(backend_error)?;
        debug!(collection, index = %index.name(), "index created");
        Ok(())
    }

    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        if docs.is_empty() {
            return Ok(InsertManyResult::default());
        }

        // Ids are assigned client-side so accepted positions are known
        // without relying on the server's partial result.
        let mut ids = Vec::with_capacity(docs.len());
        let docs: Vec<Document> = docs
            .into_iter()
            .map(|doc| {
                let (id, doc) = ensure_id(doc);
                ids.push(id);
                doc
            })
            .collect();

        let failures = match self
            .collection(collection)
            .insert_many(&docs)
            .ordered(false)
            .run()
        {
            Ok(_) => Vec::new(),
            Err(e) => rejected_writes(collection, e)?,
        };

        let rejected: HashSet<usize> = failures.iter().map(|f| f.index).collect();
        let inserted_ids = ids
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !rejected.contains(index))
            .collect();
        Ok(InsertManyResult {
            inserted_ids,
            failures,
        })
    }

    fn count(&self, collection: &str, filter: &FilterGroup) -> Result<u64, StoreError> {
        self.collection(collection)
            .count_documents(translate::filter(filter)?)
            .run()
            .map_err(backend_error)
    }

    fn find(&self, collection: &str, query: &Query) -> Result<DocumentIter<'_>, StoreError> {
        let target = self.collection(collection);
        let mut action = target.find(translate::filter(&query.filter)?);
        if let Some(batch_size) = query.batch_size {
            action = action.batch_size(batch_size);
        }
        if let Some(sort) = translate::find_sort(query) {
            action = action.sort(sort);
        }
        if let Some(take) = query.take {
            action = action.limit(i64::try_from(take).unwrap_or(i64::MAX));
        }
        let cursor = action.run().map_err(backend_error)?;
        Ok(Box::new(cursor.map(|row| row.map_err(backend_error))))
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &FilterGroup,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let (modifications, array_filters) = translate::update(update)?;
        let filter = translate::filter(filter)?;
        let target = self.collection(collection);
        let mut action = match modifications {
            Modifications::Operators(set) => target.update_many(filter, set),
            Modifications::Pipeline(stages) => target.update_many(filter, stages),
        };
        if !array_filters.is_empty() {
            action = action.array_filters(array_filters);
        }
        let result = action.run().map_err(backend_error)?;
        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<DocumentIter<'_>, StoreError> {
        let target = self.collection(collection);
        let mut action = target
            .aggregate(translate::pipeline(pipeline)?)
            .allow_disk_use(options.allow_disk_use);
        if let Some(batch_size) = options.batch_size {
            action = action.batch_size(batch_size);
        }
        let cursor = action.run().map_err(backend_error)?;
        Ok(Box::new(cursor.map(|row| row.map_err(backend_error))))
    }
}
