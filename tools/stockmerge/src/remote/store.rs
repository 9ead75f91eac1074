//! Remote database seam and the throttled batch runner

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use errors::{StockError, StockResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::ThrottleConfig;
use crate::core::file_utils::{timestamped_path, write_failure_log};

/// JSON tree addressed by `/`-separated paths
///
/// A missing path reads as `null`, like the hosted database does.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, path: &str) -> StockResult<Value>;

    /// Merge the fields of `body` into the object at `path`
    async fn patch(&self, path: &str, body: &Value) -> StockResult<()>;

    /// Replace the value at `path`
    async fn put(&self, path: &str, body: &Value) -> StockResult<()>;

    async fn delete(&self, path: &str) -> StockResult<()>;
}

pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Patch { path: String, body: Value },
    Put { path: String, body: Value },
    Delete { path: String },
}

/// Requests for one record, sent in order; the first error stops the rest
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub key: String,
    pub operations: Vec<Operation>,
}

impl BatchItem {
    pub fn new(key: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            key: key.into(),
            operations,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    /// `(key, error)` per failed item
    pub failures: Vec<(String, String)>,
    /// Failures a later rerun may clear (throttling, 5xx, timeouts)
    pub retryable: usize,
    pub requests: usize,
    pub pauses: usize,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BatchUploader<'a> {
    store: &'a dyn RemoteStore,
    throttle: ThrottleConfig,
}

impl<'a> BatchUploader<'a> {
    pub fn new(store: &'a dyn RemoteStore, throttle: ThrottleConfig) -> Self {
        Self { store, throttle }
    }

    async fn send(&self, operation: &Operation) -> StockResult<()> {
        match operation {
            Operation::Patch { path, body } => self.store.patch(path, body).await,
            Operation::Put { path, body } => self.store.put(path, body).await,
            Operation::Delete { path } => self.store.delete(path).await,
        }
    }

    /// Run every item, pausing after each `throttle.every` requests
    pub async fn run(&self, items: &[BatchItem]) -> BatchOutcome {
        let every = self.throttle.every.max(1);
        let pause = Duration::from_millis(self.throttle.pause_ms);
        let mut outcome = BatchOutcome {
            total: items.len(),
            ..Default::default()
        };

        for (n, item) in items.iter().enumerate() {
            let mut failed = None;
            for operation in &item.operations {
                if outcome.requests > 0 && outcome.requests % every == 0 {
                    debug!("Throttle pause after {} requests", outcome.requests);
                    tokio::time::sleep(pause).await;
                    outcome.pauses += 1;
                }
                outcome.requests += 1;
                if let Err(e) = self.send(operation).await {
                    if e.is_retryable() {
                        outcome.retryable += 1;
                    }
                    failed = Some(format!("[{}] {}", e.error_code(), e));
                    break;
                }
            }
            match failed {
                None => outcome.succeeded += 1,
                Some(error) => {
                    warn!("{} failed: {}", item.key, error);
                    outcome.failures.push((item.key.clone(), error));
                },
            }
            if (n + 1) % 50 == 0 {
                info!("Progress: {}/{}", n + 1, items.len());
            }
        }

        info!(
            "Batch done: {} ok, {} failed, {} requests",
            outcome.succeeded,
            outcome.failures.len(),
            outcome.requests
        );
        outcome
    }
}

/// Write `<output_dir>/<job>-failures-<ts>.log` when anything failed
pub fn finish_batch(job: &str, outcome: &BatchOutcome, output_dir: &Path) -> Result<()> {
    if outcome.is_complete() {
        return Ok(());
    }
    let path = timestamped_path(output_dir, &format!("{}-failures", job), "log", Local::now());
    write_failure_log(&path, &outcome.failures)?;
    Err(StockError::PartialFailure {
        failed: outcome.failures.len(),
        total: outcome.total,
        log: path.display().to_string(),
    }
    .into())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // json! macro and test unwraps
mod tests {
    use super::*;
    use crate::core::file_utils::read_failure_log;
    use crate::remote::memory::MemoryStore;
    use serde_json::json;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn patch(key: &str) -> BatchItem {
        BatchItem::new(
            key,
            vec![Operation::Patch {
                path: format!("products/{}", key),
                body: json!({"stock": 1}),
            }],
        )
    }

    fn throttle(every: usize) -> ThrottleConfig {
        ThrottleConfig { every, pause_ms: 1 }
    }

    #[tokio::test]
    async fn test_throttle_cadence() {
        let store = MemoryStore::new(json!({}));
        let items: Vec<_> = (0..25).map(|n| patch(&format!("p{}", n))).collect();
        let outcome = BatchUploader::new(&store, throttle(10)).run(&items).await;

        assert_eq!(outcome.requests, 25);
        assert_eq!(outcome.pauses, 2);
        assert_eq!(outcome.succeeded, 25);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_put_skips_delete() {
        let store = MemoryStore::new(json!({"products": {"A*": {"sku": "A*"}}}))
            .failing_on(["products/A"]);
        let items = vec![BatchItem::new(
            "A*",
            vec![
                Operation::Put {
                    path: "products/A".into(),
                    body: json!({"sku": "A"}),
                },
                Operation::Delete {
                    path: "products/A*".into(),
                },
            ],
        )];
        let outcome = BatchUploader::new(&store, throttle(10)).run(&items).await;

        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].1.starts_with("[REMOTE_ERROR]"));
        assert!(outcome.failures[0].1.contains("HTTP 500"));
        assert_eq!(outcome.retryable, 1);
        assert_eq!(store.request_count(), 1);
        assert_eq!(store.get("products/A*/sku").await.unwrap(), "A*");
        assert!(logs_contain("A* failed"));
    }

    #[tokio::test]
    async fn test_failures_are_logged_for_rerun() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(json!({})).failing_on(["products/p2", "products/p4"]);
        let items: Vec<_> = (1..=5).map(|n| patch(&format!("p{}", n))).collect();
        let outcome = BatchUploader::new(&store, throttle(2)).run(&items).await;

        let err = finish_batch("push-stock", &outcome, dir.path()).unwrap_err();
        let stock_err = err.downcast_ref::<StockError>().unwrap();
        assert_eq!(stock_err.exit_code(), 3);
        let StockError::PartialFailure { failed, total, log } = stock_err else {
            panic!("unexpected error {:?}", stock_err);
        };
        assert_eq!((*failed, *total), (2, 5));
        assert_eq!(read_failure_log(Path::new(log)).unwrap(), vec!["p2", "p4"]);

        let clean = BatchUploader::new(&store, throttle(2)).run(&items[..1]).await;
        finish_batch("push-stock", &clean, dir.path()).unwrap();
    }
}
