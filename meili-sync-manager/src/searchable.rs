//! Searchable objects and entity normalization.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::Value;

use crate::entity::Entity;
use crate::errors::SyncError;
use meili_sync_shared::{Document, Identifier};

/// Options passed to the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationContext {
    /// Only attributes in one of these serializer groups are kept.
    pub groups: Option<Vec<String>>,
    /// Convert RFC 3339 timestamps to integer epoch seconds.
    pub coerce_dates: bool,
}

impl NormalizationContext {
    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: Some(groups.into_iter().map(Into::into).collect()),
            coerce_dates: false,
        }
    }
}

/// Turns an entity into a field map.
pub trait Normalizer: Send + Sync {
    fn normalize(
        &self,
        entity: &dyn Entity,
        context: &NormalizationContext,
    ) -> Result<Document, SyncError>;
}

/// Attribute-based normalizer.
///
/// Keeps the entity's attributes, filtered by serializer groups when the
/// context asks for them, and converts timestamps to epoch seconds so dates
/// compare the same way in every index.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl Normalizer for DefaultNormalizer {
    fn normalize(
        &self,
        entity: &dyn Entity,
        context: &NormalizationContext,
    ) -> Result<Document, SyncError> {
        let mut document = Document::new();

        for (name, value) in entity.attributes()? {
            if let Some(ref groups) = context.groups {
                let in_group = entity
                    .attribute_groups(&name)
                    .iter()
                    .any(|group| groups.contains(group));
                if !in_group {
                    continue;
                }
            }

            let value = if context.coerce_dates {
                coerce_dates(value)
            } else {
                value
            };
            document.insert(name, value);
        }

        Ok(document)
    }
}

fn coerce_dates(value: Value) -> Value {
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(date) => Value::from(date.timestamp()),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_dates).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, coerce_dates(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Normalize an entity, preferring its own searchable shape when it has one.
pub fn normalize_entity(
    entity: &dyn Entity,
    normalizer: &dyn Normalizer,
    context: &NormalizationContext,
) -> Result<Document, SyncError> {
    match entity.as_self_normalizing() {
        Some(self_normalizing) => self_normalizing.normalize_searchable(normalizer, context),
        None => normalizer.normalize(entity, context),
    }
}

/// An entity bound to the index it is being written to.
#[derive(Clone)]
pub struct SearchableObject {
    index_uid: String,
    primary_key: String,
    entity: Arc<dyn Entity>,
    identifier: Identifier,
    normalizer: Arc<dyn Normalizer>,
    context: NormalizationContext,
}

impl SearchableObject {
    /// Create a searchable object. Date coercion is always enabled so every
    /// index stores dates the same way.
    pub fn new(
        index_uid: impl Into<String>,
        primary_key: impl Into<String>,
        entity: Arc<dyn Entity>,
        identifier: Identifier,
        normalizer: Arc<dyn Normalizer>,
        context: NormalizationContext,
    ) -> Self {
        Self {
            index_uid: index_uid.into(),
            primary_key: primary_key.into(),
            entity,
            identifier,
            normalizer,
            context: NormalizationContext {
                coerce_dates: true,
                ..context
            },
        }
    }

    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn entity(&self) -> &Arc<dyn Entity> {
        &self.entity
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn context(&self) -> &NormalizationContext {
        &self.context
    }

    /// The fields to index for this entity.
    pub fn searchable_array(&self) -> Result<Document, SyncError> {
        normalize_entity(self.entity.as_ref(), self.normalizer.as_ref(), &self.context)
    }

    /// The document sent to the engine: the searchable array with the primary
    /// key added unless the entity already set it. `None` when there is
    /// nothing to index.
    pub fn to_document(&self) -> Result<Option<Document>, SyncError> {
        let mut document = self.searchable_array()?;
        if document.is_empty() {
            return Ok(None);
        }

        document
            .entry(self.primary_key.clone())
            .or_insert_with(|| self.identifier.to_value());
        Ok(Some(document))
    }
}

impl std::fmt::Debug for SearchableObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchableObject")
            .field("index_uid", &self.index_uid)
            .field("primary_key", &self.primary_key)
            .field("class", &self.entity.class_name())
            .field("identifier", &self.identifier)
            .finish()
    }
}
