//! Domain entities and their classes.
//!
//! The manager never sees concrete entity types. It works with `dyn Entity`:
//! a class name, a map of attributes, and optional capabilities such as
//! normalizing itself.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregator::Aggregator;
use crate::errors::SyncError;
use crate::searchable::{NormalizationContext, Normalizer};
use meili_sync_shared::Document;

/// A persisted domain object that can be indexed.
pub trait Entity: Send + Sync + fmt::Debug {
    /// Name of the entity's class, as used in index configurations.
    fn class_name(&self) -> &str;

    /// The entity's fields.
    fn attributes(&self) -> Result<Map<String, Value>, SyncError>;

    /// Serializer groups an attribute belongs to. Attributes without groups
    /// are excluded whenever groups are requested.
    fn attribute_groups(&self, _attribute: &str) -> Vec<String> {
        Vec::new()
    }

    /// Read a value by dotted property path (`author.name`).
    fn property(&self, path: &str) -> Result<Value, SyncError> {
        let attributes = self.attributes()?;
        lookup_path(&attributes, path)
            .cloned()
            .ok_or_else(|| SyncError::property_path(self.class_name(), path))
    }

    /// Entities that build their own search document return themselves here.
    fn as_self_normalizing(&self) -> Option<&dyn SelfNormalizing> {
        None
    }

    fn as_aggregator(&self) -> Option<&Aggregator> {
        None
    }
}

/// Capability of entities that describe their own searchable shape.
pub trait SelfNormalizing {
    fn normalize_searchable(
        &self,
        normalizer: &dyn Normalizer,
        context: &NormalizationContext,
    ) -> Result<Document, SyncError>;
}

/// Serialize a value into an attribute map, for entities backed by serde.
pub fn serialize_attributes<T: Serialize>(value: &T) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::normalization(format!(
            "Entity must serialize to an object, got {}",
            other
        ))),
    }
}

/// Look up a dotted path in an attribute map.
pub fn lookup_path<'a>(attributes: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = attributes.get(first)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Loose truthiness used for `index_if` predicates.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// An entity made of a class name and a JSON attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicEntity {
    class: String,
    attributes: Map<String, Value>,
    groups: HashMap<String, Vec<String>>,
}

impl DynamicEntity {
    pub fn new(class: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            class: class.into(),
            attributes,
            groups: HashMap::new(),
        }
    }

    /// Build an entity from a JSON object.
    pub fn from_value(class: impl Into<String>, value: Value) -> Result<Self, SyncError> {
        let class = class.into();
        match value {
            Value::Object(attributes) => Ok(Self::new(class, attributes)),
            other => Err(SyncError::invalid_argument(format!(
                "{} entity must be a JSON object, got {}",
                class, other
            ))),
        }
    }

    /// Assign serializer groups to an attribute.
    pub fn with_groups<I, S>(mut self, attribute: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(attribute.into(), groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }
}

impl Entity for DynamicEntity {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn attributes(&self) -> Result<Map<String, Value>, SyncError> {
        Ok(self.attributes.clone())
    }

    fn attribute_groups(&self, attribute: &str) -> Vec<String> {
        self.groups.get(attribute).cloned().unwrap_or_default()
    }

    fn property(&self, path: &str) -> Result<Value, SyncError> {
        lookup_path(&self.attributes, path)
            .cloned()
            .ok_or_else(|| SyncError::property_path(&self.class, path))
    }
}

/// Explicit single-inheritance links between entity classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHierarchy {
    parents: HashMap<String, String>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `parent` as the direct superclass of `child`.
    pub fn with_parent(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents.insert(child.into(), parent.into());
        self
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.parents.get(class).map(String::as_str)
    }

    /// Superclasses of `class`, nearest first.
    pub fn ancestors<'a>(&'a self, class: &str) -> Vec<&'a str> {
        let mut ancestors: Vec<&str> = Vec::new();
        let mut current = self.parent_of(class);

        while let Some(parent) = current {
            // Guard against misconfigured cycles.
            if parent == class || ancestors.contains(&parent) {
                break;
            }
            ancestors.push(parent);
            current = self.parent_of(parent);
        }

        ancestors
    }

    /// Whether `class` is `ancestor` or one of its subclasses.
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor || self.ancestors(class).contains(&ancestor)
    }
}

/// Strategy that decides which configured class an entity belongs to.
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, entity: &dyn Entity) -> String;
}

/// Uses the class name the entity declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredClassResolver;

impl ClassResolver for DeclaredClassResolver {
    fn resolve(&self, entity: &dyn Entity) -> String {
        entity.class_name().to_string()
    }
}

/// Maps lazy-loading proxy classes back to the real class by dropping
/// everything up to and including a marker segment.
#[derive(Debug, Clone)]
pub struct ProxyClassResolver {
    marker: String,
}

impl ProxyClassResolver {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl ClassResolver for ProxyClassResolver {
    fn resolve(&self, entity: &dyn Entity) -> String {
        let class = entity.class_name();
        match class.rfind(&self.marker) {
            Some(pos) => class[pos + self.marker.len()..].to_string(),
            None => class.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post() -> DynamicEntity {
        DynamicEntity::from_value(
            "Post",
            json!({
                "id": 1,
                "title": "Hello",
                "published": true,
                "author": {"name": "Ada", "tags": ["x", "y"]}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_property_paths() {
        let entity = post();
        assert_eq!(entity.property("title").unwrap(), json!("Hello"));
        assert_eq!(entity.property("author.name").unwrap(), json!("Ada"));
        assert_eq!(entity.property("author.tags.1").unwrap(), json!("y"));

        let err = entity.property("author.email").unwrap_err();
        assert!(matches!(err, SyncError::PropertyPath { ref path, .. } if path == "author.email"));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(DynamicEntity::from_value("Post", json!([1, 2])).is_err());
    }

    #[test]
    fn test_serialize_attributes() {
        #[derive(Serialize)]
        struct Tag {
            id: i64,
            name: String,
        }

        let attributes = serialize_attributes(&Tag {
            id: 3,
            name: "rust".to_string(),
        })
        .unwrap();
        assert_eq!(attributes.get("name"), Some(&json!("rust")));
        assert!(serialize_attributes(&42).is_err());
    }

    #[test]
    fn test_class_hierarchy() {
        let hierarchy = ClassHierarchy::new()
            .with_parent("Admin", "User")
            .with_parent("SuperAdmin", "Admin");

        assert!(hierarchy.is_a("SuperAdmin", "User"));
        assert!(hierarchy.is_a("Admin", "Admin"));
        assert!(!hierarchy.is_a("User", "Admin"));
        assert_eq!(hierarchy.ancestors("SuperAdmin"), vec!["Admin", "User"]);
    }

    #[test]
    fn test_class_hierarchy_cycle_terminates() {
        let hierarchy = ClassHierarchy::new()
            .with_parent("A", "B")
            .with_parent("B", "A");

        assert_eq!(hierarchy.ancestors("A"), vec!["B"]);
        assert!(!hierarchy.is_a("A", "C"));
    }

    #[test]
    fn test_proxy_class_resolver() {
        let resolver = ProxyClassResolver::new("__CG__\\");
        let proxy = DynamicEntity::new("Proxies\\__CG__\\App\\Post", Map::new());
        let real = DynamicEntity::new("App\\Post", Map::new());

        assert_eq!(resolver.resolve(&proxy), "App\\Post");
        assert_eq!(resolver.resolve(&real), "App\\Post");
        assert_eq!(DeclaredClassResolver.resolve(&proxy), "Proxies\\__CG__\\App\\Post");
    }
}
