//! # Meili Sync Shared
//!
//! Types shared by the search engine client, the index manager and the
//! command-line binary: document identifiers, engine task acknowledgements
//! and search request/response shapes.

mod identifier;
mod search;
mod task;

pub use identifier::{Identifier, IdentifierFields};
pub use search::{SearchQuery, SearchResponse};
pub use task::{Task, TaskError, TaskInfo, TaskStatus, TaskType};

/// A document as sent to the search engine: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;
