//! Aggregators: several entity classes sharing one index.
//!
//! Documents from different classes can collide on their primary key, so an
//! aggregated document is keyed by `<EntityClass>::<entityId>` instead.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::entity::{Entity, SelfNormalizing};
use crate::errors::SyncError;
use crate::identifier::normalize_identifiers;
use crate::searchable::{normalize_entity, NormalizationContext, Normalizer};
use meili_sync_shared::{Document, IdentifierFields};

const OBJECT_ID_SEPARATOR: &str = "::";

/// An aggregator class and the closed set of entity classes it merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorDefinition {
    class: String,
    entities: Vec<String>,
}

impl AggregatorDefinition {
    pub fn new<I, S>(class: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            entities: entities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn aggregates(&self, class: &str) -> bool {
        self.entities.iter().any(|e| e == class)
    }

    /// Compose the object id of an aggregated entity.
    pub fn object_id(entity_class: &str, entity_id: &str) -> String {
        format!("{}{}{}", entity_class, OBJECT_ID_SEPARATOR, entity_id)
    }

    /// Entity class encoded in an object id.
    pub fn entity_class_from_object_id(&self, object_id: &str) -> Result<&str, SyncError> {
        // Longest match wins when one class name prefixes another.
        self.entities
            .iter()
            .filter(|class| {
                object_id
                    .strip_prefix(class.as_str())
                    .is_some_and(|rest| rest.starts_with(OBJECT_ID_SEPARATOR))
            })
            .max_by_key(|class| class.len())
            .map(String::as_str)
            .ok_or_else(|| SyncError::EntityNotFoundInObjectId(object_id.to_string()))
    }

    /// Entity id encoded in an object id.
    pub fn entity_id_from_object_id<'a>(&self, object_id: &'a str) -> Result<&'a str, SyncError> {
        let class = self.entity_class_from_object_id(object_id)?;
        Ok(&object_id[class.len() + OBJECT_ID_SEPARATOR.len()..])
    }
}

/// An aggregated entity: one real entity under an aggregator class.
#[derive(Debug, Clone)]
pub struct Aggregator {
    definition: Arc<AggregatorDefinition>,
    entity: Arc<dyn Entity>,
    entity_class: String,
    object_id: String,
    primary_key: String,
}

impl Aggregator {
    /// Wrap `entity` (of class `entity_class`) in the aggregator.
    ///
    /// Fails with [`SyncError::InvalidEntityForAggregator`] when the class is
    /// not declared by the aggregator, and with [`SyncError::InvalidArgument`]
    /// when the entity's primary key has more than one field.
    pub fn new(
        definition: Arc<AggregatorDefinition>,
        entity: Arc<dyn Entity>,
        entity_class: impl Into<String>,
        identifier_fields: &IdentifierFields,
        primary_key: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let entity_class = entity_class.into();
        if !definition.aggregates(&entity_class) {
            return Err(SyncError::InvalidEntityForAggregator {
                aggregator: definition.class().to_string(),
                class: entity_class,
            });
        }

        if identifier_fields.len() != 1 {
            return Err(SyncError::invalid_argument(format!(
                "Aggregator {} requires single-field identifiers, {} has {}",
                definition.class(),
                entity_class,
                identifier_fields.len()
            )));
        }

        let entity_id = normalize_identifiers(identifier_fields)?;
        let object_id = AggregatorDefinition::object_id(&entity_class, &entity_id.to_string());

        Ok(Self {
            definition,
            entity,
            entity_class,
            object_id,
            primary_key: primary_key.into(),
        })
    }

    pub fn definition(&self) -> &AggregatorDefinition {
        &self.definition
    }

    pub fn entity(&self) -> &Arc<dyn Entity> {
        &self.entity
    }

    pub fn entity_class(&self) -> &str {
        &self.entity_class
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// The wrapped entity's document keyed by the composite object id.
    ///
    /// The object id overrides any field of the same name on the entity.
    pub fn normalize(
        &self,
        normalizer: &dyn Normalizer,
        context: &NormalizationContext,
    ) -> Result<Document, SyncError> {
        let mut document = normalize_entity(self.entity.as_ref(), normalizer, context)?;
        document.insert(self.primary_key.clone(), Value::from(self.object_id.as_str()));
        Ok(document)
    }
}

impl Entity for Aggregator {
    fn class_name(&self) -> &str {
        self.definition.class()
    }

    fn attributes(&self) -> Result<Map<String, Value>, SyncError> {
        self.entity.attributes()
    }

    fn attribute_groups(&self, attribute: &str) -> Vec<String> {
        self.entity.attribute_groups(attribute)
    }

    fn property(&self, path: &str) -> Result<Value, SyncError> {
        self.entity.property(path)
    }

    fn as_self_normalizing(&self) -> Option<&dyn SelfNormalizing> {
        Some(self)
    }

    fn as_aggregator(&self) -> Option<&Aggregator> {
        Some(self)
    }
}

impl SelfNormalizing for Aggregator {
    fn normalize_searchable(
        &self,
        normalizer: &dyn Normalizer,
        context: &NormalizationContext,
    ) -> Result<Document, SyncError> {
        self.normalize(normalizer, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;
    use crate::searchable::DefaultNormalizer;
    use serde_json::json;

    fn definition() -> Arc<AggregatorDefinition> {
        Arc::new(AggregatorDefinition::new("ContentAggregator", ["Post", "Tag"]))
    }

    fn fields(pairs: &[(&str, Value)]) -> IdentifierFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn post(id: i64) -> Arc<dyn Entity> {
        Arc::new(
            DynamicEntity::from_value("Post", json!({"id": id, "title": "Hello", "objectID": "x"}))
                .unwrap(),
        )
    }

    #[test]
    fn test_object_id_and_normalize() {
        let aggregator = Aggregator::new(
            definition(),
            post(3),
            "Post",
            &fields(&[("id", json!(3))]),
            "objectID",
        )
        .unwrap();

        assert_eq!(aggregator.object_id(), "Post::3");
        assert_eq!(aggregator.class_name(), "ContentAggregator");

        let document = aggregator
            .normalize(&DefaultNormalizer, &NormalizationContext::default())
            .unwrap();
        assert_eq!(document["objectID"], json!("Post::3"));
        assert_eq!(document["title"], json!("Hello"));
    }

    #[test]
    fn test_rejects_undeclared_class() {
        let comment: Arc<dyn Entity> = Arc::new(DynamicEntity::new("Comment", Map::new()));
        let err = Aggregator::new(
            definition(),
            comment,
            "Comment",
            &fields(&[("id", json!(1))]),
            "objectID",
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SyncError::InvalidEntityForAggregator { ref aggregator, ref class }
                if aggregator == "ContentAggregator" && class == "Comment"
        ));
    }

    #[test]
    fn test_rejects_composite_identifier() {
        let err = Aggregator::new(
            definition(),
            post(1),
            "Post",
            &fields(&[("id", json!(1)), ("lang", json!("en"))]),
            "objectID",
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_decompose_object_id() {
        let definition = AggregatorDefinition::new("Aggregate", ["App::Post", "App::PostDraft"]);

        assert_eq!(
            definition.entity_class_from_object_id("App::PostDraft::42").unwrap(),
            "App::PostDraft"
        );
        assert_eq!(
            definition.entity_id_from_object_id("App::Post::7").unwrap(),
            "7"
        );
        assert!(matches!(
            definition.entity_class_from_object_id("Comment::1"),
            Err(SyncError::EntityNotFoundInObjectId(_))
        ));
    }
}
