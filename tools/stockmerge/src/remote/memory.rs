//! In-memory [`RemoteStore`]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use errors::{StockError, StockResult};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::store::{path_segments, RemoteStore};

/// In-process store for jobs under test
#[derive(Default)]
pub struct MemoryStore {
    root: Mutex<Value>,
    /// Paths that answer every request with HTTP 500
    failing: HashSet<String>,
    pub requests: AtomicUsize,
}

impl MemoryStore {
    pub fn new(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            ..Default::default()
        }
    }

    pub fn failing_on<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = paths.into_iter().map(Into::into).collect();
        self
    }

    pub async fn snapshot(&self) -> Value {
        self.root.lock().await.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn begin(&self, method: &str, path: &str) -> StockResult<()> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(path.trim_matches('/')) {
            return Err(StockError::Remote {
                method: method.to_string(),
                path: path.to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

fn node_mut<'a>(root: &'a mut Value, segments: &[&str]) -> &'a mut Value {
    let mut node = root;
    for segment in segments {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => other,
        };
    }
    node
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &str) -> StockResult<Value> {
        self.begin("GET", path)?;
        let root = self.root.lock().await;
        let mut node = &*root;
        for segment in path_segments(path) {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Ok(Value::Null),
            }
        }
        Ok(node.clone())
    }

    async fn patch(&self, path: &str, body: &Value) -> StockResult<()> {
        self.begin("PATCH", path)?;
        let Value::Object(fields) = body else {
            return Err(StockError::InvalidParameter {
                param: "body".to_string(),
                reason: "PATCH needs a JSON object".to_string(),
            });
        };
        let mut root = self.root.lock().await;
        let node = node_mut(&mut root, &path_segments(path));
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            for (field, value) in fields {
                map.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn put(&self, path: &str, body: &Value) -> StockResult<()> {
        self.begin("PUT", path)?;
        let mut root = self.root.lock().await;
        *node_mut(&mut root, &path_segments(path)) = body.clone();
        Ok(())
    }

    async fn delete(&self, path: &str) -> StockResult<()> {
        self.begin("DELETE", path)?;
        let segments = path_segments(path);
        let mut root = self.root.lock().await;
        let Some((last, parents)) = segments.split_last() else {
            *root = Value::Null;
            return Ok(());
        };
        let mut node = &mut *root;
        for segment in parents {
            match node.get_mut(*segment) {
                Some(child) => node = child,
                None => return Ok(()),
            }
        }
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // json! macro and test unwraps
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_paths() {
        let store = MemoryStore::new(json!({"products": {"p1": {"sku": "A", "stock": 0}}}));
        store
            .patch("products/p1", &json!({"stock": 4}))
            .await
            .unwrap();
        store.put("spareparts/X-1", &json!({"sku": "X-1"})).await.unwrap();
        store.delete("products/missing").await.unwrap();

        assert_eq!(store.get("products/p1/stock").await.unwrap(), 4);
        assert_eq!(store.get("products/p1/sku").await.unwrap(), "A");
        assert_eq!(store.get("/spareparts/X-1/sku").await.unwrap(), "X-1");
        assert_eq!(store.get("nothing/here").await.unwrap(), Value::Null);

        store.delete("products/p1").await.unwrap();
        assert_eq!(store.get("products").await.unwrap(), json!({}));
        assert_eq!(store.request_count(), 8);
    }
}
