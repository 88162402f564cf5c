use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::DataProvider;
use crate::entity::Entity;
use crate::errors::SyncError;
use meili_sync_shared::{Identifier, IdentifierFields};

/// Data provider holding entities in memory, keyed by their identifier.
pub struct InMemoryDataProvider {
    class: String,
    identifier_fields: Vec<String>,
    entities: RwLock<BTreeMap<Identifier, Arc<dyn Entity>>>,
}

impl InMemoryDataProvider {
    /// Create an empty provider whose entities are identified by the given
    /// attribute names.
    pub fn new<I, S>(class: impl Into<String>, identifier_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            identifier_fields: identifier_fields.into_iter().map(Into::into).collect(),
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Add or replace an entity.
    pub async fn insert(&self, entity: Arc<dyn Entity>) -> Result<Identifier, SyncError> {
        let identifier = self.identifier(entity.as_ref())?;
        self.entities.write().await.insert(identifier.clone(), entity);
        Ok(identifier)
    }

    pub async fn extend<I>(&self, entities: I) -> Result<usize, SyncError>
    where
        I: IntoIterator<Item = Arc<dyn Entity>>,
    {
        let mut count = 0;
        for entity in entities {
            self.insert(entity).await?;
            count += 1;
        }
        debug!(class = %self.class, count = count, "Loaded entities");
        Ok(count)
    }

    pub async fn remove(&self, identifier: &Identifier) -> Option<Arc<dyn Entity>> {
        self.entities.write().await.remove(identifier)
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}

#[async_trait]
impl DataProvider for InMemoryDataProvider {
    async fn provide(&self, limit: usize, offset: usize) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
        let entities = self.entities.read().await;
        Ok(entities.values().skip(offset).take(limit).cloned().collect())
    }

    async fn load_by_identifiers(
        &self,
        identifiers: &[Identifier],
    ) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
        let entities = self.entities.read().await;

        // Hits may carry `"7"` for an entity keyed by `7`.
        Ok(identifiers
            .iter()
            .filter_map(|identifier| {
                entities.get(identifier).cloned().or_else(|| {
                    let wanted = identifier.to_string();
                    entities
                        .iter()
                        .find(|(key, _)| key.to_string() == wanted)
                        .map(|(_, entity)| entity.clone())
                })
            })
            .collect())
    }

    fn identifier_values(&self, entity: &dyn Entity) -> Result<IdentifierFields, SyncError> {
        self.identifier_fields
            .iter()
            .map(|field| Ok((field.clone(), entity.property(field)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;
    use serde_json::json;

    fn tag(id: i64, name: &str) -> Arc<dyn Entity> {
        Arc::new(DynamicEntity::from_value("Tag", json!({"id": id, "name": name})).unwrap())
    }

    #[tokio::test]
    async fn test_pages_are_ordered_by_identifier() {
        let provider = InMemoryDataProvider::new("Tag", ["id"]);
        provider
            .extend(vec![tag(3, "c"), tag(1, "a"), tag(2, "b")])
            .await
            .unwrap();

        let first = provider.provide(2, 0).await.unwrap();
        let second = provider.provide(2, 2).await.unwrap();
        let names: Vec<_> = first
            .iter()
            .chain(second.iter())
            .map(|e| e.property("name").unwrap())
            .collect();

        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
        assert!(provider.provide(2, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_by_identifiers_omits_missing() {
        let provider = InMemoryDataProvider::new("Tag", ["id"]);
        provider.extend(vec![tag(1, "a"), tag(2, "b")]).await.unwrap();

        let loaded = provider
            .load_by_identifiers(&[Identifier::Int(2), Identifier::Int(9), Identifier::from("1")])
            .await
            .unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].property("name").unwrap(), json!("b"));
        assert_eq!(loaded[1].property("name").unwrap(), json!("a"));
    }

    #[tokio::test]
    async fn test_composite_identifiers() {
        let provider = InMemoryDataProvider::new("Translation", ["key", "lang"]);
        let entity: Arc<dyn Entity> = Arc::new(
            DynamicEntity::from_value(
                "Translation",
                json!({"key": "hello", "lang": "fr", "text": "bonjour"}),
            )
            .unwrap(),
        );

        let identifier = provider.insert(entity.clone()).await.unwrap();
        let Identifier::Str(ref encoded) = identifier else {
            panic!("composite identifier must be a string");
        };

        let fields = provider.denormalize_identifier(encoded).unwrap();
        assert_eq!(fields["lang"], json!("fr"));
        assert_eq!(provider.load_by_identifiers(&[identifier]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_field() {
        let provider = InMemoryDataProvider::new("Tag", ["uuid"]);
        let err = provider.insert(tag(1, "a")).await.unwrap_err();
        assert!(matches!(err, SyncError::PropertyPath { .. }));
        assert!(provider.is_empty().await);
    }
}
