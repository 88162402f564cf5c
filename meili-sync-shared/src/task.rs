//! Engine task acknowledgements.
//!
//! Every write submitted to Meilisearch is processed asynchronously on the
//! engine side. Submissions return a [`TaskInfo`] immediately; polling the
//! task returns the full [`Task`] until it reaches a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an engine task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// Whether the task has left the pending states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Kind of operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    IndexCreation,
    IndexUpdate,
    IndexDeletion,
    IndexSwap,
    DocumentAdditionOrUpdate,
    DocumentDeletion,
    SettingsUpdate,
    DumpCreation,
    TaskCancelation,
    TaskDeletion,
    SnapshotCreation,
    #[serde(other)]
    Unknown,
}

/// Error payload attached to a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    pub code: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Summary returned when an operation is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

/// Full task state as returned by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Per-type details, e.g. `receivedDocuments` / `indexedDocuments`.
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub error: Option<TaskError>,
    /// ISO 8601 duration, present once the task finished.
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    /// The engine's error message, if the task failed with one.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_task_info() {
        let raw = r#"{
            "taskUid": 12,
            "indexUid": "posts",
            "status": "enqueued",
            "type": "documentAdditionOrUpdate",
            "enqueuedAt": "2024-03-01T10:00:00.000000Z"
        }"#;

        let info: TaskInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.task_uid, 12);
        assert_eq!(info.index_uid.as_deref(), Some("posts"));
        assert_eq!(info.status, TaskStatus::Enqueued);
        assert_eq!(info.task_type, TaskType::DocumentAdditionOrUpdate);
        assert!(info.enqueued_at.is_some());
    }

    #[test]
    fn test_deserialize_failed_task() {
        let raw = r#"{
            "uid": 3,
            "indexUid": "posts",
            "status": "failed",
            "type": "settingsUpdate",
            "details": {"stopWords": ["a"]},
            "error": {
                "message": "boom",
                "code": "invalid_settings_stop_words",
                "type": "invalid_request",
                "link": "https://docs.meilisearch.com/errors"
            },
            "duration": "PT0.01S"
        }"#;

        let task: Task = serde_json::from_str(raw).unwrap();
        assert!(task.is_failure());
        assert!(task.status.is_terminal());
        assert_eq!(task.error_message(), Some("boom"));
    }

    #[test]
    fn test_unknown_task_type() {
        let raw = r#"{"taskUid": 1, "status": "processing", "type": "upgradeDatabase"}"#;
        let info: TaskInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.task_type, TaskType::Unknown);
        assert!(!info.status.is_terminal());
    }
}
