//! Search error types.
//!
//! This module defines the error types that can occur while talking to the
//! search engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during search engine operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The engine rejected the request.
    #[error("Request failed with status {status}{}: {message}", code_suffix(.code))]
    RequestError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The requested index doesn't exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Failed to parse response from search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A task did not reach a terminal status in time.
    #[error("Task {task_uid} did not complete within {timeout_ms}ms")]
    TaskTimeout { task_uid: u64, timeout_ms: u64 },

    /// The setting name has no matching engine operation.
    #[error("Invalid setting name: {0}")]
    InvalidSetting(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request error.
    pub fn request(status: u16, code: Option<String>, msg: impl Into<String>) -> Self {
        Self::RequestError {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a task timeout error.
    pub fn task_timeout(task_uid: u64, timeout: Duration) -> Self {
        Self::TaskTimeout {
            task_uid,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create an invalid setting error.
    pub fn invalid_setting(name: impl Into<String>) -> Self {
        Self::InvalidSetting(name.into())
    }
}
