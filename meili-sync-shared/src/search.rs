//! Search request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Document;

/// A search request against a single index.
///
/// `params` carries any additional engine parameters (`filter`, `sort`,
/// `attributesToRetrieve`, ...) and is flattened into the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text. Empty matches every document.
    pub q: String,
    /// Maximum number of hits to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Number of hits to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SearchQuery {
    /// Create a query for the given text.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    /// Set the hit limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the hit offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Add an engine parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Raw search response from the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<Document>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl SearchResponse {
    /// A response with no hits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of matching documents, falling back to the hit count when
    /// the engine didn't report an estimate.
    pub fn total_hits(&self) -> u64 {
        self.estimated_total_hits.unwrap_or(self.hits.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_serializes_flat_params() {
        let query = SearchQuery::new("rust")
            .with_limit(5)
            .with_param("filter", "published = true");

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({"q": "rust", "limit": 5, "filter": "published = true"})
        );
    }

    #[test]
    fn test_total_hits_fallback() {
        let response: SearchResponse = serde_json::from_value(json!({
            "hits": [{"objectID": 1}, {"objectID": 2}],
            "query": "x",
            "processingTimeMs": 1
        }))
        .unwrap();

        assert_eq!(response.total_hits(), 2);
    }
}
