//! Remote document store over HTTP
//!
//! Documents live under `{base}/state/{key}` with body
//! `{"_id": key, "value": ..., "updated_at": ...}`; `GET {base}/state` lists them all.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::application::errors::{StorageError, StorageResult};
use crate::domain::entities::StateRecord;
use crate::domain::traits::StateBackend;

/// Remote state backend
pub struct HttpDocumentBackend {
    base: Url,
    token: Option<String>,
    client: Client,
}

/// Wire form of one document
#[derive(Serialize, Deserialize, Debug)]
struct Document {
    #[serde(rename = "_id")]
    id: String,
    value: Value,
    #[serde(default)]
    updated_at: i64,
}

impl From<Document> for StateRecord {
    fn from(doc: Document) -> Self {
        StateRecord::new(doc.id, doc.value, doc.updated_at)
    }
}

impl HttpDocumentBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> StorageResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| StorageError::Remote(format!("invalid remote url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::Remote(format!("remote url cannot be a base: {}", base_url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(Self { base, token, client })
    }

    fn url(&self, key: Option<&str>) -> StorageResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Remote("remote url cannot be a base".to_string()))?;
            segments.pop_if_empty().push("state");
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> StorageResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Remote(format!("status: {}, body: {}", status, body)))
    }
}

fn network(e: reqwest::Error) -> StorageError {
    StorageError::Remote(e.to_string())
}

#[async_trait]
impl StateBackend for HttpDocumentBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StateRecord>> {
        let response = self
            .request(reqwest::Method::GET, self.url(Some(key))?)
            .send()
            .await
            .map_err(network)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: Document = Self::check(response).await?.json().await.map_err(network)?;
        Ok(Some(doc.into()))
    }

    async fn put(&self, record: &StateRecord) -> StorageResult<()> {
        let doc = Document {
            id: record.key.clone(),
            value: record.value.clone(),
            updated_at: record.updated_at,
        };
        let response = self
            .request(reqwest::Method::PUT, self.url(Some(&record.key))?)
            .json(&doc)
            .send()
            .await
            .map_err(network)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let response = self
            .request(reqwest::Method::DELETE, self.url(Some(key))?)
            .send()
            .await
            .map_err(network)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn records(&self) -> StorageResult<Vec<StateRecord>> {
        let response = self
            .request(reqwest::Method::GET, self.url(None)?)
            .send()
            .await
            .map_err(network)?;

        let docs: Vec<Document> = Self::check(response).await?.json().await.map_err(network)?;
        Ok(docs.into_iter().map(StateRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_document_urls() {
        let backend = HttpDocumentBackend::new("http://localhost:8080/api/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url(None).unwrap().as_str(), "http://localhost:8080/api/state");
        assert_eq!(
            backend.url(Some("group configs")).unwrap().as_str(),
            "http://localhost:8080/api/state/group%20configs"
        );
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(HttpDocumentBackend::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn document_defaults_missing_timestamp() {
        let doc: Document = serde_json::from_str(r#"{"_id": "prefix", "value": "!"}"#).unwrap();
        let record = StateRecord::from(doc);
        assert_eq!(record.key, "prefix");
        assert_eq!(record.updated_at, 0);
    }
}
