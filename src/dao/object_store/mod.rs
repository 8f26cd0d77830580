#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dao::{
    models::{ObjectEntity, StateEntity},
    storage::StorageResult,
};

pub use self::memory::MemoryObjectStore;

/// Abstraction over the external key-value store that persists state objects.
///
/// Every call may fail independently; callers treat failures as non-fatal.
pub trait ObjectStore: Send + Sync {
    /// Create the object at `path` unless it already exists. Resolves to `true` on creation.
    fn create_if_missing(
        &self,
        path: String,
        object: ObjectEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Write the value of an existing object.
    fn write_value(
        &self,
        path: String,
        value: Value,
        ack: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Read every persisted state whose path starts with `prefix`.
    fn read_all(&self, prefix: String)
    -> BoxFuture<'static, StorageResult<HashMap<String, StateEntity>>>;
    /// Delete the object (and its value) at `path`.
    fn delete(&self, path: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
