//! Search engine client trait definition.
//!
//! This module defines the abstract interface for search engine operations,
//! allowing for different backend implementations (Meilisearch, mocks, etc.).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::errors::SearchError;
use crate::settings::SettingKind;
use meili_sync_shared::{Document, Identifier, SearchQuery, SearchResponse, Task, TaskInfo};

/// Abstract interface for search engine operations.
///
/// Write operations are asynchronous on the engine side: they return a
/// [`TaskInfo`] as soon as the engine accepted the request. Callers that need
/// the outcome poll with [`SearchEngineClient::wait_for_task`].
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, SearchError>` for consistent error handling.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Create an index, optionally declaring its primary key.
    async fn create_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, SearchError>;

    /// Delete an index and every document in it.
    async fn delete_index(&self, uid: &str) -> Result<TaskInfo, SearchError>;

    /// Add or replace documents.
    ///
    /// # Arguments
    ///
    /// * `uid` - Target index
    /// * `documents` - Documents to add; existing documents with the same key are replaced
    /// * `primary_key` - Primary key field, used when the engine infers the index schema
    async fn add_documents(
        &self,
        uid: &str,
        documents: &[Document],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, SearchError>;

    /// Delete documents by primary key. Unknown keys are ignored by the engine.
    async fn delete_documents(
        &self,
        uid: &str,
        ids: &[Identifier],
    ) -> Result<TaskInfo, SearchError>;

    /// Remove every document from an index, keeping the index and its settings.
    async fn delete_all_documents(&self, uid: &str) -> Result<TaskInfo, SearchError>;

    /// Execute a search query against an index.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let query = SearchQuery::new("rust").with_limit(10);
    /// let response = client.search("posts", &query).await?;
    /// println!("Found {} results", response.total_hits());
    /// ```
    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Atomically swap each pair of indexes.
    async fn swap_indexes(&self, pairs: &[(String, String)]) -> Result<TaskInfo, SearchError>;

    /// Update a single index setting.
    async fn update_setting(
        &self,
        uid: &str,
        setting: SettingKind,
        value: &Value,
    ) -> Result<TaskInfo, SearchError>;

    /// Fetch the current state of a task.
    async fn get_task(&self, task_uid: u64) -> Result<Task, SearchError>;

    /// Number of documents stored in an index.
    async fn count_documents(&self, uid: &str) -> Result<u64, SearchError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine answered but is unavailable
    /// * `Err(SearchError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchError>;

    /// Poll a task until it reaches a terminal status.
    ///
    /// Returns the terminal task whatever its outcome; a failed task is not an
    /// error at this level. Returns [`SearchError::TaskTimeout`] when `timeout`
    /// elapses first. The remote task keeps running in that case.
    async fn wait_for_task(
        &self,
        task_uid: u64,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Task, SearchError> {
        let started = tokio::time::Instant::now();

        loop {
            let task = self.get_task(task_uid).await?;
            if task.status.is_terminal() {
                debug!(task_uid, status = ?task.status, "Task finished");
                return Ok(task);
            }

            if started.elapsed() >= timeout {
                return Err(SearchError::task_timeout(task_uid, timeout));
            }

            tokio::time::sleep(interval).await;
        }
    }
}
