/// Persisted state records exchanged with object store backends.
pub mod models;
/// Object store abstraction and its backends.
pub mod object_store;
/// Storage error types shared by every backend.
pub mod storage;
