use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// A document or record could not be converted to or from BSON.
    Serialization(String),
    /// The backend cannot express or evaluate the requested filter, update or pipeline.
    InvalidQuery(String),
    Backend(String),
    /// The store could not be reached (server selection, socket, pool).
    Connection(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StoreError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            StoreError::Backend(msg) => write!(f, "backend error: {msg}"),
            StoreError::Connection(msg) => write!(f, "connection error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(e: bson::de::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
