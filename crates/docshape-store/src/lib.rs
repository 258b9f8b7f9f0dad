mod collection;
mod error;
mod store;

pub use collection::{Collection, Schema, TypedIter};
pub use error::StoreError;
pub use store::{
    CollectionOptions, DocumentIter, IndexKey, IndexSpec, InsertManyResult, Store, UpdateResult,
    WriteFailure, WriteFailureKind,
};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "mongodb")]
pub use mongo::{MongoConfig, MongoStore};
