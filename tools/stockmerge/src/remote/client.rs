//! REST client for the hosted database

use std::time::Duration;

use async_trait::async_trait;
use errors::{StockError, StockResult};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::debug;

use super::store::{path_segments, RemoteStore};
use crate::context::RemoteConfig;

/// `{base}/{path}.json?auth=<token>` over HTTPS
pub struct RestStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RestStore {
    pub fn new(config: &RemoteConfig) -> StockResult<Self> {
        let base = config
            .database_url
            .as_deref()
            .ok_or_else(|| StockError::MissingConfig("remote.database_url".to_string()))?;
        let base_url = Url::parse(base).map_err(|e| StockError::InvalidConfig {
            field: "remote.database_url".to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn url(&self, path: &str) -> StockResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| StockError::InvalidConfig {
                field: "remote.database_url".to_string(),
                reason: "cannot be a base URL".to_string(),
            })?;
            segments.pop_if_empty();
            let parts = path_segments(path);
            match parts.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{}.json", last));
                },
                None => {
                    segments.push(".json");
                },
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> StockResult<Value> {
        let url = self.url(path)?;
        debug!("{} {}", method, path);
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StockError::Timeout(format!("{} {}", method, path))
            } else {
                StockError::HttpClient(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StockError::Remote {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn get(&self, path: &str) -> StockResult<Value> {
        self.send(Method::GET, path, None).await
    }

    async fn patch(&self, path: &str, body: &Value) -> StockResult<()> {
        self.send(Method::PATCH, path, Some(body)).await.map(|_| ())
    }

    async fn put(&self, path: &str, body: &Value) -> StockResult<()> {
        self.send(Method::PUT, path, Some(body)).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> StockResult<()> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}
