//! Meilisearch client implementation.
//!
//! This module provides the concrete implementation of `SearchEngineClient`
//! over the Meilisearch REST API.

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::settings::SettingKind;
use meili_sync_shared::{Document, Identifier, SearchQuery, SearchResponse, Task, TaskInfo};

/// Error body returned by Meilisearch on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    number_of_documents: u64,
}

#[derive(Debug, Deserialize)]
struct Health {
    status: String,
}

/// Meilisearch client implementation.
///
/// # Example
///
/// ```ignore
/// use meili_sync_repository::{ClientConfig, MeilisearchClient};
/// let config = ClientConfig::new("http://localhost:7700").with_api_key("masterKey");
/// let client = MeilisearchClient::new(config)?;
///
/// let task = client.add_documents("posts", &documents, Some("objectID")).await?;
/// client.wait_for_task(task.task_uid, timeout, interval).await?;
/// ```
pub struct MeilisearchClient {
    http: Client,
    base_url: Url,
    config: ClientConfig,
}

impl MeilisearchClient {
    /// Create a new client for the configured URL.
    ///
    /// # Returns
    ///
    /// * `Ok(MeilisearchClient)` - A new client instance
    /// * `Err(SearchError)` - If the URL or API key is invalid
    pub fn new(config: ClientConfig) -> Result<Self, SearchError> {
        let mut base_url =
            Url::parse(&config.url).map_err(|e| SearchError::connection(e.to_string()))?;

        // Url::join replaces the last segment unless the base ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| SearchError::connection(format!("Invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        info!(
            url = %base_url,
            authenticated = config.api_key.is_some(),
            "Created Meilisearch client"
        );

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SearchError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| SearchError::connection(e.to_string()))?;
        Ok(self.http.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SearchError> {
        let response = request
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Meilisearch request failed");
            return Err(Self::error_from_body(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))
    }

    fn error_from_body(status: StatusCode, body: &str) -> SearchError {
        match serde_json::from_str::<ApiError>(body) {
            Ok(api) if api.code == "index_not_found" => SearchError::IndexNotFound(api.message),
            Ok(api) => SearchError::request(status.as_u16(), Some(api.code), api.message),
            Err(_) => SearchError::request(status.as_u16(), None, body),
        }
    }
}

#[async_trait]
impl SearchEngineClient for MeilisearchClient {
    #[instrument(skip(self))]
    async fn create_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, SearchError> {
        let body = json!({ "uid": uid, "primaryKey": primary_key });
        let task: TaskInfo = self
            .send(self.request(Method::POST, "indexes")?.json(&body))
            .await?;

        debug!(task_uid = task.task_uid, "Index creation enqueued");
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, uid: &str) -> Result<TaskInfo, SearchError> {
        self.send(self.request(Method::DELETE, &format!("indexes/{}", uid))?)
            .await
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn add_documents(
        &self,
        uid: &str,
        documents: &[Document],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, SearchError> {
        let mut request = self
            .request(Method::POST, &format!("indexes/{}/documents", uid))?
            .json(documents);
        if let Some(primary_key) = primary_key {
            request = request.query(&[("primaryKey", primary_key)]);
        }

        let task: TaskInfo = self.send(request).await?;
        debug!(task_uid = task.task_uid, "Document addition enqueued");
        Ok(task)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_documents(
        &self,
        uid: &str,
        ids: &[Identifier],
    ) -> Result<TaskInfo, SearchError> {
        let request = self
            .request(Method::POST, &format!("indexes/{}/documents/delete-batch", uid))?
            .json(ids);

        let task: TaskInfo = self.send(request).await?;
        debug!(task_uid = task.task_uid, "Document deletion enqueued");
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn delete_all_documents(&self, uid: &str) -> Result<TaskInfo, SearchError> {
        self.send(self.request(Method::DELETE, &format!("indexes/{}/documents", uid))?)
            .await
    }

    #[instrument(skip(self, query), fields(q = %query.q))]
    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let request = self
            .request(Method::POST, &format!("indexes/{}/search", uid))?
            .json(query);

        let response: SearchResponse = self.send(request).await?;
        debug!(hits = response.hits.len(), "Search completed");
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn swap_indexes(&self, pairs: &[(String, String)]) -> Result<TaskInfo, SearchError> {
        let body: Vec<Value> = pairs
            .iter()
            .map(|(a, b)| json!({ "indexes": [a, b] }))
            .collect();

        self.send(self.request(Method::POST, "swap-indexes")?.json(&body))
            .await
    }

    #[instrument(skip(self, value), fields(setting = %setting))]
    async fn update_setting(
        &self,
        uid: &str,
        setting: SettingKind,
        value: &Value,
    ) -> Result<TaskInfo, SearchError> {
        let method = if setting.is_partial_update() {
            Method::PATCH
        } else {
            Method::PUT
        };
        let path = format!("indexes/{}/settings/{}", uid, setting.route());

        self.send(self.request(method, &path)?.json(value)).await
    }

    async fn get_task(&self, task_uid: u64) -> Result<Task, SearchError> {
        self.send(self.request(Method::GET, &format!("tasks/{}", task_uid))?)
            .await
    }

    async fn count_documents(&self, uid: &str) -> Result<u64, SearchError> {
        let stats: IndexStats = self
            .send(self.request(Method::GET, &format!("indexes/{}/stats", uid))?)
            .await?;
        Ok(stats.number_of_documents)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let health: Health = self.send(self.request(Method::GET, "health")?).await?;
        Ok(health.status == "available")
    }
}
