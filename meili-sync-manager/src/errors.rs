//! Error types for the index manager.

use meili_sync_repository::SearchError;
use thiserror::Error;

/// Errors that can occur while synchronizing entities with the search engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The class has no index configuration.
    #[error("Class {0} is not searchable")]
    NotSearchable(String),

    /// No index is configured under this name.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// A configured setting has no matching engine operation.
    #[error("Invalid setting name \"{setting}\" for index {index}")]
    InvalidSettingName { index: String, setting: String },

    /// No data provider is registered for the index and class.
    #[error("No data provider found for index {index} and class {class}")]
    DataProviderNotFound { index: String, class: String },

    /// An argument had an unusable value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The aggregator does not declare the entity's class.
    #[error("Class {class} is not aggregated by {aggregator}")]
    InvalidEntityForAggregator { aggregator: String, class: String },

    /// A composite object id doesn't start with a declared entity class.
    #[error("Entity class not found in object id {0}")]
    EntityNotFoundInObjectId(String),

    /// A property path could not be read from an entity.
    #[error("Cannot read property path \"{path}\" on {class}")]
    PropertyPath { class: String, path: String },

    /// An entity could not be turned into a document.
    #[error("Normalization error: {0}")]
    NormalizationError(String),

    /// The engine reported a failed task.
    #[error("Task {task_uid} failed: {message}")]
    TaskFailed { task_uid: u64, message: String },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the search engine client.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl SyncError {
    /// Create a not searchable error.
    pub fn not_searchable(class: impl Into<String>) -> Self {
        Self::NotSearchable(class.into())
    }

    /// Create an unknown index error.
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::UnknownIndex(name.into())
    }

    /// Create an invalid setting name error.
    pub fn invalid_setting_name(index: impl Into<String>, setting: impl Into<String>) -> Self {
        Self::InvalidSettingName {
            index: index.into(),
            setting: setting.into(),
        }
    }

    /// Create a data provider not found error.
    pub fn provider_not_found(index: impl Into<String>, class: impl Into<String>) -> Self {
        Self::DataProviderNotFound {
            index: index.into(),
            class: class.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a property path error.
    pub fn property_path(class: impl Into<String>, path: impl Into<String>) -> Self {
        Self::PropertyPath {
            class: class.into(),
            path: path.into(),
        }
    }

    /// Create a normalization error.
    pub fn normalization(msg: impl Into<String>) -> Self {
        Self::NormalizationError(msg.into())
    }

    /// Create a task failed error.
    pub fn task_failed(task_uid: u64, msg: impl Into<String>) -> Self {
        Self::TaskFailed {
            task_uid,
            message: msg.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::NormalizationError(err.to_string())
    }
}
