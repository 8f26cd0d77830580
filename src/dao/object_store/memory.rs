use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::{
    clock::now_ms,
    dao::{
        models::{ObjectEntity, StateEntity},
        object_store::ObjectStore,
        storage::{StorageError, StorageResult},
    },
};

/// Process-local object store, used when no external backend is configured and by tests.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: DashMap<String, StateEntity>,
    creates: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects created so far.
    pub fn creates(&self) -> usize {
        self.inner.creates.load(Ordering::Relaxed)
    }

    /// Number of value writes so far.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Number of deletions so far.
    pub fn deletes(&self) -> usize {
        self.inner.deletes.load(Ordering::Relaxed)
    }

    /// Every persistence call issued so far.
    pub fn calls(&self) -> usize {
        self.creates() + self.writes() + self.deletes()
    }

    /// Persisted state at `path`, if any.
    pub fn get(&self, path: &str) -> Option<StateEntity> {
        self.inner.objects.get(path).map(|entry| entry.clone())
    }

    /// Number of persisted objects.
    pub fn len(&self) -> usize {
        self.inner.objects.len()
    }

    /// Whether nothing is persisted.
    pub fn is_empty(&self) -> bool {
        self.inner.objects.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn create_if_missing(
        &self,
        path: String,
        object: ObjectEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.objects.contains_key(&path) {
                return Ok(false);
            }
            inner.creates.fetch_add(1, Ordering::Relaxed);
            inner.objects.insert(
                path,
                StateEntity {
                    value: None,
                    ack: true,
                    ts: now_ms(),
                    common: object,
                },
            );
            Ok(true)
        })
    }

    fn write_value(
        &self,
        path: String,
        value: Value,
        ack: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(mut entry) = inner.objects.get_mut(&path) else {
                return Err(StorageError::MissingObject { path });
            };
            inner.writes.fetch_add(1, Ordering::Relaxed);
            entry.value = Some(value);
            entry.ack = ack;
            entry.ts = now_ms();
            Ok(())
        })
    }

    fn read_all(
        &self,
        prefix: String,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, StateEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .objects
                .iter()
                .filter(|entry| entry.key().starts_with(&prefix))
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect())
        })
    }

    fn delete(&self, path: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.deletes.fetch_add(1, Ordering::Relaxed);
            inner.objects.remove(&path);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
