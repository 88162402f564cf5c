//! Recording search engine client used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::entity::{DynamicEntity, Entity};
use meili_sync_repository::{SearchEngineClient, SearchError, SettingKind};
use meili_sync_shared::{
    Document, Identifier, SearchQuery, SearchResponse, Task, TaskError, TaskInfo, TaskStatus,
    TaskType,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateIndex { uid: String, primary_key: Option<String> },
    DeleteIndex(String),
    AddDocuments { uid: String, documents: Vec<Document>, primary_key: Option<String> },
    DeleteDocuments { uid: String, ids: Vec<Identifier> },
    DeleteAllDocuments(String),
    Search { uid: String, query: SearchQuery },
    SwapIndexes(Vec<(String, String)>),
    UpdateSetting { uid: String, setting: SettingKind, value: Value },
}

pub struct MockClient {
    calls: Mutex<Vec<Call>>,
    next_uid: AtomicU64,
    task_types: Mutex<HashMap<u64, TaskType>>,
    outcome: Mutex<(TaskStatus, Option<String>)>,
    failing_types: Mutex<HashMap<TaskType, String>>,
    search_response: Mutex<SearchResponse>,
    missing_indexes: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_uid: AtomicU64::new(1),
            task_types: Mutex::new(HashMap::new()),
            outcome: Mutex::new((TaskStatus::Succeeded, None)),
            failing_types: Mutex::new(HashMap::new()),
            search_response: Mutex::new(SearchResponse::empty()),
            missing_indexes: Mutex::new(Vec::new()),
        })
    }

    /// Make every polled task fail with `message`.
    pub async fn fail_tasks(&self, message: &str) {
        *self.outcome.lock().await = (TaskStatus::Failed, Some(message.to_string()));
    }

    /// Make tasks of one type fail with `message`.
    pub async fn fail_tasks_of(&self, task_type: TaskType, message: &str) {
        self.failing_types
            .lock()
            .await
            .insert(task_type, message.to_string());
    }

    pub async fn respond_with_hits(&self, hits: Vec<Value>) {
        let hits: Vec<Document> = hits
            .into_iter()
            .filter_map(|hit| match hit {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        let mut response = SearchResponse::empty();
        response.estimated_total_hits = Some(hits.len() as u64);
        response.hits = hits;
        *self.search_response.lock().await = response;
    }

    /// Make the next `delete_index` of this uid answer `index_not_found`.
    pub async fn missing_index(&self, uid: &str) {
        self.missing_indexes.lock().await.push(uid.to_string());
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Documents sent to `uid`, one entry per call.
    pub async fn added(&self, uid: &str) -> Vec<Vec<Document>> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                Call::AddDocuments { uid: u, documents, .. } if u == uid => Some(documents.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: Call, uid: Option<&str>, task_type: TaskType) -> TaskInfo {
        self.calls.lock().await.push(call);
        let task_uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        self.task_types.lock().await.insert(task_uid, task_type);

        TaskInfo {
            task_uid,
            index_uid: uid.map(str::to_string),
            status: TaskStatus::Enqueued,
            task_type,
            enqueued_at: None,
        }
    }
}

#[async_trait]
impl SearchEngineClient for MockClient {
    async fn create_index(&self, uid: &str, primary_key: Option<&str>) -> Result<TaskInfo, SearchError> {
        let call = Call::CreateIndex {
            uid: uid.to_string(),
            primary_key: primary_key.map(str::to_string),
        };
        Ok(self.record(call, Some(uid), TaskType::IndexCreation).await)
    }

    async fn delete_index(&self, uid: &str) -> Result<TaskInfo, SearchError> {
        let mut missing = self.missing_indexes.lock().await;
        if let Some(pos) = missing.iter().position(|m| m == uid) {
            missing.remove(pos);
            return Err(SearchError::IndexNotFound(uid.to_string()));
        }
        drop(missing);

        Ok(self
            .record(Call::DeleteIndex(uid.to_string()), Some(uid), TaskType::IndexDeletion)
            .await)
    }

    async fn add_documents(
        &self,
        uid: &str,
        documents: &[Document],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, SearchError> {
        let call = Call::AddDocuments {
            uid: uid.to_string(),
            documents: documents.to_vec(),
            primary_key: primary_key.map(str::to_string),
        };
        Ok(self.record(call, Some(uid), TaskType::DocumentAdditionOrUpdate).await)
    }

    async fn delete_documents(&self, uid: &str, ids: &[Identifier]) -> Result<TaskInfo, SearchError> {
        let call = Call::DeleteDocuments {
            uid: uid.to_string(),
            ids: ids.to_vec(),
        };
        Ok(self.record(call, Some(uid), TaskType::DocumentDeletion).await)
    }

    async fn delete_all_documents(&self, uid: &str) -> Result<TaskInfo, SearchError> {
        Ok(self
            .record(Call::DeleteAllDocuments(uid.to_string()), Some(uid), TaskType::DocumentDeletion)
            .await)
    }

    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        self.calls.lock().await.push(Call::Search {
            uid: uid.to_string(),
            query: query.clone(),
        });
        Ok(self.search_response.lock().await.clone())
    }

    async fn swap_indexes(&self, pairs: &[(String, String)]) -> Result<TaskInfo, SearchError> {
        Ok(self
            .record(Call::SwapIndexes(pairs.to_vec()), None, TaskType::IndexSwap)
            .await)
    }

    async fn update_setting(
        &self,
        uid: &str,
        setting: SettingKind,
        value: &Value,
    ) -> Result<TaskInfo, SearchError> {
        let call = Call::UpdateSetting {
            uid: uid.to_string(),
            setting,
            value: value.clone(),
        };
        Ok(self.record(call, Some(uid), TaskType::SettingsUpdate).await)
    }

    async fn get_task(&self, task_uid: u64) -> Result<Task, SearchError> {
        let task_type = self
            .task_types
            .lock()
            .await
            .get(&task_uid)
            .copied()
            .unwrap_or(TaskType::Unknown);
        let (status, message) = match self.failing_types.lock().await.get(&task_type) {
            Some(message) => (TaskStatus::Failed, Some(message.clone())),
            None => self.outcome.lock().await.clone(),
        };

        Ok(Task {
            uid: task_uid,
            index_uid: None,
            status,
            task_type,
            details: None,
            error: message.map(|message| TaskError {
                message,
                code: "internal".to_string(),
                error_type: "internal".to_string(),
                link: None,
            }),
            duration: None,
            enqueued_at: None,
            started_at: None,
            finished_at: None,
        })
    }

    async fn count_documents(&self, _uid: &str) -> Result<u64, SearchError> {
        Ok(0)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(true)
    }
}

pub fn entity(class: &str, attributes: Value) -> Arc<dyn Entity> {
    Arc::new(DynamicEntity::from_value(class, attributes).unwrap())
}

pub fn post(id: i64) -> Arc<dyn Entity> {
    entity("Post", json!({"id": id, "title": format!("Post {}", id), "published": true}))
}

pub fn tag(id: i64) -> Arc<dyn Entity> {
    entity("Tag", json!({"id": id, "name": format!("tag-{}", id)}))
}
