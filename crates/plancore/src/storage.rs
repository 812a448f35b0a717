use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed value store shared by all nodes of one execution.
///
/// Created fresh per top-level run and dropped with it. Cloning hands out a
/// shared view; composite nodes pass the same instance to their children.
/// No two nodes may declare the same output key (validated when the graph is
/// built), so concurrent children never race on a key. Only the engine
/// writes, and only after the owning node succeeds.
#[derive(Clone, Default)]
pub struct DataStorage {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl DataStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) {
        self.inner.write().await.insert(key.into(), value);
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Copy of the full contents, for diagnostics and tests.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().await.clone()
    }
}

impl From<HashMap<String, Value>> for DataStorage {
    fn from(map: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}
