//! In-memory mirror of every persisted state with write de-duplication.

pub mod gc;

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    clock::now_ms,
    dao::{
        models::ObjectEntity,
        object_store::ObjectStore,
        storage::{StorageError, StorageResult},
    },
    registry::{NodeDescriptor, ValueType},
};

pub use self::gc::{GarbageCollector, Sweep, SweepMode, SweepReport};

/// Cached value of one state path.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    /// Last written value, already coerced to `value_type`.
    pub value: Value,
    /// Last time the path was set, in epoch milliseconds.
    pub timestamp: i64,
    /// Declared type of the path.
    pub value_type: ValueType,
}

/// Options accepted by [`StateStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Write even when the cached value is identical.
    pub force: bool,
    /// Whether the value is acknowledged device state rather than a pending command.
    pub ack: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            force: false,
            ack: true,
        }
    }
}

impl SetOptions {
    /// Options forcing the write regardless of the cached value.
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// Result of a [`StateStore::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value was persisted.
    Written,
    /// Value matched the cache; only the timestamp was refreshed.
    Unchanged,
    /// Grouping node; the object exists but carries no value.
    Structural,
    /// Empty value for a node that was never created.
    Skipped,
    /// Persistence failed; the cache was left untouched.
    Failed,
}

/// Arbitrates create-vs-update for state paths and suppresses redundant writes.
pub struct StateStore {
    backend: RwLock<Arc<dyn ObjectStore>>,
    objects: DashMap<String, ObjectEntity>,
    states: DashMap<String, StateEntry>,
}

impl StateStore {
    /// Wrap an object store backend with an empty cache.
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend: RwLock::new(backend),
            objects: DashMap::new(),
            states: DashMap::new(),
        }
    }

    /// Backend the store currently persists into.
    pub fn backend(&self) -> Arc<dyn ObjectStore> {
        let guard = self
            .backend
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Switch to `backend` and copy every cached object and state into it.
    ///
    /// Returns the number of objects that failed to replay.
    pub async fn install_backend(&self, backend: Arc<dyn ObjectStore>) -> usize {
        {
            let mut guard = self
                .backend
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::clone(&backend);
        }

        let objects = self
            .objects
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect::<Vec<_>>();
        let mut failed = 0;
        for (path, object) in objects {
            if let Err(err) = backend.create_if_missing(path.clone(), object).await {
                warn!(path = %path, error = %err, "failed to replay state object");
                failed += 1;
                continue;
            }
            let Some(value) = self.value(&path) else {
                continue;
            };
            if let Err(err) = backend.write_value(path.clone(), value, true).await {
                warn!(path = %path, error = %err, "failed to replay state value");
                failed += 1;
            }
        }
        failed
    }

    /// Set `path` to `value` using the metadata declared by `node`.
    ///
    /// The cache is updated before the backend write completes; callers must not assume
    /// durability when this returns. Persistence failures are logged and reported as
    /// [`SetOutcome::Failed`].
    pub async fn set(
        &self,
        path: &str,
        node: &NodeDescriptor,
        value: &Value,
        options: SetOptions,
    ) -> SetOutcome {
        if !self.objects.contains_key(path) {
            if !node.role.is_grouping() && value.as_str() == Some("") {
                return SetOutcome::Skipped;
            }
            let object = ObjectEntity::from(node);
            if let Err(err) = self
                .backend()
                .create_if_missing(path.to_owned(), object.clone())
                .await
            {
                warn!(path, error = %err, "failed to create state object");
                return SetOutcome::Failed;
            }
            self.objects.insert(path.to_owned(), object);
        }

        if node.role.is_grouping() {
            return SetOutcome::Structural;
        }

        self.write(path, node.value_type, node.value_type.coerce(value), options)
            .await
    }

    /// Reset `path` to the zero value of its type.
    pub async fn empty(&self, path: &str) -> SetOutcome {
        let Some(value_type) = self.states.get(path).map(|entry| entry.value_type) else {
            return SetOutcome::Skipped;
        };
        self.write(path, value_type, value_type.zero(), SetOptions::default())
            .await
    }

    async fn write(
        &self,
        path: &str,
        value_type: ValueType,
        value: Value,
        options: SetOptions,
    ) -> SetOutcome {
        let now = now_ms();
        let previous = self.states.get(path).map(|entry| entry.clone());

        if !options.force && previous.as_ref().is_some_and(|entry| entry.value == value) {
            if let Some(mut entry) = self.states.get_mut(path) {
                entry.timestamp = now;
            }
            return SetOutcome::Unchanged;
        }

        self.states.insert(
            path.to_owned(),
            StateEntry {
                value: value.clone(),
                timestamp: now,
                value_type,
            },
        );

        match self
            .backend()
            .write_value(path.to_owned(), value, options.ack)
            .await
        {
            Ok(()) => SetOutcome::Written,
            Err(err) => {
                warn!(path, error = %err, "failed to persist state value");
                match previous {
                    Some(entry) => {
                        self.states.insert(path.to_owned(), entry);
                    }
                    None => {
                        self.states.remove(path);
                    }
                }
                SetOutcome::Failed
            }
        }
    }

    /// Delete the object at `path` from the backend and the cache.
    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        self.backend().delete(path.to_owned()).await?;
        self.states.remove(path);
        self.objects.remove(path);
        Ok(())
    }

    /// Cached entry for `path`.
    pub fn get(&self, path: &str) -> Option<StateEntry> {
        self.states.get(path).map(|entry| entry.clone())
    }

    /// Cached value for `path`.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.states.get(path).map(|entry| entry.value.clone())
    }

    /// Whether an object (state or structural node) exists at `path`.
    pub fn has_object(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// Cached states at or below `prefix`, sorted by path.
    pub fn entries_under(&self, prefix: &str) -> Vec<(String, StateEntry)> {
        let mut entries = self
            .states
            .iter()
            .filter(|entry| is_under(entry.key(), prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Known object paths at or below `prefix` that carry no value.
    pub fn structural_under(&self, prefix: &str) -> Vec<String> {
        let mut paths = self
            .objects
            .iter()
            .filter(|entry| entry.value().role.is_grouping() && is_under(entry.key(), prefix))
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        paths.sort();
        paths
    }

    /// Whether any cached state lives strictly below `prefix`.
    pub fn has_states_below(&self, prefix: &str) -> bool {
        let scope = format!("{prefix}.");
        self.states.iter().any(|entry| entry.key().starts_with(&scope))
    }

    /// Number of cached states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the cache holds no state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Load every persisted object under `prefix` into the cache. Paths already cached keep
    /// their cached state.
    pub async fn hydrate(&self, prefix: &str) -> Result<usize, StorageError> {
        let persisted = self.backend().read_all(prefix.to_owned()).await?;
        let count = persisted.len();
        for (path, state) in persisted {
            if let Some(value) = state.value {
                if !state.common.role.is_grouping() {
                    self.states.entry(path.clone()).or_insert(StateEntry {
                        value,
                        timestamp: state.ts,
                        value_type: state.common.value_type,
                    });
                }
            }
            self.objects.entry(path).or_insert(state.common);
        }
        debug!(prefix, count, "hydrated state cache");
        Ok(count)
    }
}

/// `path` equals `prefix` or lives below it. An empty prefix matches everything.
pub fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::collections::HashMap;

    use super::*;
    use crate::{
        dao::{models::StateEntity, object_store::MemoryObjectStore},
        registry::Role,
    };

    fn store() -> (MemoryObjectStore, StateStore) {
        let backend = MemoryObjectStore::new();
        let store = StateStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    fn text() -> NodeDescriptor {
        NodeDescriptor::new("Title", Role::Text, ValueType::String)
    }

    #[tokio::test]
    async fn creates_then_writes_missing_entries() {
        let (backend, store) = store();
        let outcome = store
            .set("a.title", &text(), &json!("Heat"), SetOptions::default())
            .await;
        assert_eq!(outcome, SetOutcome::Written);
        assert_eq!(backend.creates(), 1);
        assert_eq!(backend.writes(), 1);
        assert_eq!(store.value("a.title"), Some(json!("Heat")));
    }

    #[tokio::test]
    async fn identical_values_are_not_rewritten() {
        let (backend, store) = store();
        store
            .set("a.title", &text(), &json!("Heat"), SetOptions::default())
            .await;
        let before = store.get("a.title").unwrap().timestamp;
        let calls = backend.calls();

        let outcome = store
            .set("a.title", &text(), &json!("Heat"), SetOptions::default())
            .await;
        assert_eq!(outcome, SetOutcome::Unchanged);
        assert_eq!(backend.calls(), calls);
        assert!(store.get("a.title").unwrap().timestamp >= before);
    }

    #[tokio::test]
    async fn forced_writes_bypass_suppression() {
        let (backend, store) = store();
        store
            .set("a.title", &text(), &json!("Heat"), SetOptions::default())
            .await;
        let outcome = store
            .set("a.title", &text(), &json!("Heat"), SetOptions::forced())
            .await;
        assert_eq!(outcome, SetOutcome::Written);
        assert_eq!(backend.writes(), 2);
    }

    #[tokio::test]
    async fn empty_strings_do_not_create_objects() {
        let (backend, store) = store();
        let outcome = store
            .set("a.title", &text(), &json!(""), SetOptions::default())
            .await;
        assert_eq!(outcome, SetOutcome::Skipped);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn grouping_nodes_only_create_objects() {
        let (backend, store) = store();
        let outcome = store
            .set(
                "a",
                &NodeDescriptor::channel("Group"),
                &json!({"x": 1}),
                SetOptions::default(),
            )
            .await;
        assert_eq!(outcome, SetOutcome::Structural);
        assert_eq!(backend.creates(), 1);
        assert_eq!(backend.writes(), 0);
        assert!(store.has_object("a"));
        assert!(store.get("a").is_none());
    }

    #[tokio::test]
    async fn persisted_values_match_declared_type() {
        let (backend, store) = store();
        let number = NodeDescriptor::new("Volume", Role::Level, ValueType::Number);
        store
            .set("a.volume", &number, &json!("42"), SetOptions::default())
            .await;
        let persisted = backend.get("a.volume").unwrap();
        assert_eq!(persisted.value, Some(json!(42)));
        assert!(ValueType::Number.accepts(persisted.value.as_ref().unwrap()));
    }

    #[derive(Clone)]
    struct RejectingStore;

    impl ObjectStore for RejectingStore {
        fn create_if_missing(
            &self,
            _path: String,
            _object: ObjectEntity,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            Box::pin(async { Ok(true) })
        }

        fn write_value(
            &self,
            path: String,
            _value: Value,
            _ack: bool,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async move { Err(StorageError::MissingObject { path }) })
        }

        fn read_all(
            &self,
            _prefix: String,
        ) -> BoxFuture<'static, StorageResult<HashMap<String, StateEntity>>> {
            Box::pin(async { Ok(HashMap::new()) })
        }

        fn delete(&self, _path: String) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn failed_writes_leave_cache_untouched() {
        let store = StateStore::new(Arc::new(RejectingStore));
        let first = store
            .set("a.title", &text(), &json!("Heat"), SetOptions::default())
            .await;
        assert_eq!(first, SetOutcome::Failed);
        assert!(store.get("a.title").is_none());

        let second = store
            .set("a.other", &text(), &json!("Ronin"), SetOptions::default())
            .await;
        assert_eq!(second, SetOutcome::Failed);
    }

    #[tokio::test]
    async fn hydrate_restores_cache_from_backend() {
        let backend = MemoryObjectStore::new();
        {
            let seed = StateStore::new(Arc::new(backend.clone()));
            seed.set("p.a", &text(), &json!("x"), SetOptions::default())
                .await;
            seed.set("q.a", &text(), &json!("y"), SetOptions::default())
                .await;
        }

        let store = StateStore::new(Arc::new(backend));
        assert_eq!(store.hydrate("p").await.unwrap(), 1);
        assert_eq!(store.value("p.a"), Some(json!("x")));
        assert!(store.get("q.a").is_none());
    }

    #[tokio::test]
    async fn installed_backend_receives_cached_states() {
        let (_, store) = store();
        store
            .set("p.a", &text(), &json!("x"), SetOptions::default())
            .await;

        let replacement = MemoryObjectStore::new();
        assert_eq!(store.install_backend(Arc::new(replacement.clone())).await, 0);
        assert_eq!(replacement.get("p.a").unwrap().value, Some(json!("x")));

        store
            .set("p.a", &text(), &json!("z"), SetOptions::default())
            .await;
        assert_eq!(replacement.get("p.a").unwrap().value, Some(json!("z")));
    }

    #[test]
    fn prefix_matching_respects_segments() {
        assert!(is_under("players.a.title", "players.a"));
        assert!(is_under("players.a", "players.a"));
        assert!(!is_under("players.ab.title", "players.a"));
        assert!(is_under("anything", ""));
    }
}
