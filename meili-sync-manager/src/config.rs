//! Index configuration.
//!
//! Maps entity classes to indices. Loaded once and shared read-only by the
//! manager, the settings updater and the importer.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::aggregator::AggregatorDefinition;
use crate::entity::ClassHierarchy;
use crate::errors::SyncError;
use crate::searchable::NormalizationContext;

/// Default primary key field of indexed documents.
pub const DEFAULT_PRIMARY_KEY: &str = "objectID";

/// Default serializer group used when groups are enabled.
pub const DEFAULT_SERIALIZER_GROUP: &str = "searchable";

/// Default search result limit.
pub const DEFAULT_NB_RESULTS: usize = 20;

/// Default number of documents per engine call.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Computes a setting value when settings are pushed.
pub trait SettingProvider: Send + Sync {
    fn provide(&self) -> Result<Value, SyncError>;
}

impl<F> SettingProvider for F
where
    F: Fn() -> Result<Value, SyncError> + Send + Sync,
{
    fn provide(&self) -> Result<Value, SyncError> {
        self()
    }
}

/// A setting value, either given in configuration or computed on update.
#[derive(Clone)]
pub enum SettingValue {
    Literal(Value),
    Deferred(Arc<dyn SettingProvider>),
}

impl SettingValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A value computed by `f` each time settings are pushed.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> Result<Value, SyncError> + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(f))
    }

    /// The concrete value to send to the engine.
    pub fn resolve(&self) -> Result<Value, SyncError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Deferred(provider) => provider.provide(),
        }
    }
}

impl fmt::Debug for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Configuration of a single index.
#[derive(Debug, Clone)]
pub struct IndexConfiguration {
    /// Unprefixed index name.
    pub name: String,
    /// Index uid on the engine: prefix followed by the name.
    pub prefixed_name: String,
    /// Entity or aggregator class stored in the index.
    pub class: String,
    /// Primary key field of the documents.
    pub primary_key: String,
    pub enable_serializer_groups: bool,
    pub serializer_groups: Vec<String>,
    /// Property path that must be truthy for an entity to stay indexed.
    pub index_if: Option<String>,
    /// Setting name to value, pushed by the settings updater.
    pub settings: BTreeMap<String, SettingValue>,
}

impl IndexConfiguration {
    /// Create an index configuration with default options and no prefix.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prefixed_name: name.clone(),
            name,
            class: class.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            enable_serializer_groups: false,
            serializer_groups: vec![DEFAULT_SERIALIZER_GROUP.to_string()],
            index_if: None,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Enable serializer groups, restricted to `groups`.
    pub fn with_serializer_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enable_serializer_groups = true;
        self.serializer_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index_if(mut self, path: impl Into<String>) -> Self {
        self.index_if = Some(path.into());
        self
    }

    pub fn with_setting(mut self, name: impl Into<String>, value: SettingValue) -> Self {
        self.settings.insert(name.into(), value);
        self
    }

    pub(crate) fn apply_prefix(&mut self, prefix: &str) {
        self.prefixed_name = format!("{}{}", prefix, self.name);
    }

    /// Context used to normalize entities for this index.
    pub fn normalization_context(&self) -> NormalizationContext {
        NormalizationContext {
            groups: self
                .enable_serializer_groups
                .then(|| self.serializer_groups.clone()),
            coerce_dates: true,
        }
    }
}

/// Synchronization configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub prefix: String,
    pub nb_results: usize,
    pub batch_size: usize,
    pub indices: Vec<IndexConfiguration>,
    pub aggregators: Vec<Arc<AggregatorDefinition>>,
    pub hierarchy: Arc<ClassHierarchy>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            nb_results: DEFAULT_NB_RESULTS,
            batch_size: DEFAULT_BATCH_SIZE,
            indices: Vec::new(),
            aggregators: Vec::new(),
            hierarchy: Arc::new(ClassHierarchy::default()),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the index prefix, re-prefixing every configured index.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        for index in &mut self.indices {
            index.apply_prefix(&self.prefix);
        }
        self
    }

    pub fn with_nb_results(mut self, nb_results: usize) -> Self {
        self.nb_results = nb_results;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_index(mut self, mut index: IndexConfiguration) -> Self {
        index.apply_prefix(&self.prefix);
        self.indices.push(index);
        self
    }

    pub fn with_aggregator(mut self, definition: AggregatorDefinition) -> Self {
        self.aggregators.push(Arc::new(definition));
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: ClassHierarchy) -> Self {
        self.hierarchy = Arc::new(hierarchy);
        self
    }

    /// Definition of an aggregator class, if `class` is one.
    pub fn aggregator(&self, class: &str) -> Option<&Arc<AggregatorDefinition>> {
        self.aggregators.iter().find(|a| a.class() == class)
    }

    pub fn index_by_name(&self, name: &str) -> Option<&IndexConfiguration> {
        self.indices.iter().find(|i| i.name == name)
    }

    pub fn index_by_prefixed_name(&self, prefixed_name: &str) -> Option<&IndexConfiguration> {
        self.indices.iter().find(|i| i.prefixed_name == prefixed_name)
    }

    /// Configurations for the given unprefixed names, or all of them when
    /// `names` is empty.
    pub fn select_indices(&self, names: &[String]) -> Result<Vec<&IndexConfiguration>, SyncError> {
        if names.is_empty() {
            return Ok(self.indices.iter().collect());
        }

        names
            .iter()
            .map(|name| {
                self.index_by_name(name)
                    .ok_or_else(|| SyncError::unknown_index(name.as_str()))
            })
            .collect()
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::config("batch_size must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for index in &self.indices {
            if !seen.insert(index.name.as_str()) {
                return Err(SyncError::config(format!(
                    "Index {} is configured more than once",
                    index.name
                )));
            }
        }

        for definition in &self.aggregators {
            if definition.entities().is_empty() {
                return Err(SyncError::config(format!(
                    "Aggregator {} declares no entity classes",
                    definition.class()
                )));
            }
        }

        // Classes named `*Aggregator` must come with a definition.
        for index in &self.indices {
            if index.class.ends_with("Aggregator") && self.aggregator(&index.class).is_none() {
                return Err(SyncError::config(format!(
                    "Index {} uses aggregator class {} which has no definition",
                    index.name, index.class
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> SyncConfig {
        SyncConfig::new()
            .with_index(IndexConfiguration::new("posts", "Post"))
            .with_index(IndexConfiguration::new("tags", "Tag").with_primary_key("id"))
            .with_prefix("app_")
    }

    #[test]
    fn test_prefix_applies_to_all_indices() {
        let config = config().with_index(IndexConfiguration::new("comments", "Comment"));

        let names: Vec<&str> = config.indices.iter().map(|i| i.prefixed_name.as_str()).collect();
        assert_eq!(names, vec!["app_posts", "app_tags", "app_comments"]);
        assert_eq!(config.index_by_prefixed_name("app_tags").unwrap().primary_key, "id");

        let reprefixed = config.with_prefix("_tmp_app_");
        assert_eq!(reprefixed.indices[0].prefixed_name, "_tmp_app_posts");
    }

    #[test]
    fn test_select_indices() {
        let config = config();
        assert_eq!(config.select_indices(&[]).unwrap().len(), 2);

        let selected = config.select_indices(&["tags".to_string()]).unwrap();
        assert_eq!(selected[0].class, "Tag");

        let err = config.select_indices(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::UnknownIndex(ref name) if name == "nope"));
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let duplicated = config().with_index(IndexConfiguration::new("posts", "Page"));
        assert!(matches!(duplicated.validate(), Err(SyncError::ConfigError(_))));

        let undefined = config().with_index(IndexConfiguration::new("all", "ContentAggregator"));
        assert!(matches!(undefined.validate(), Err(SyncError::ConfigError(_))));

        let defined = config()
            .with_index(IndexConfiguration::new("all", "ContentAggregator"))
            .with_aggregator(AggregatorDefinition::new("ContentAggregator", ["Post", "Tag"]));
        assert!(defined.validate().is_ok());

        assert!(config().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_setting_values_resolve() {
        let literal = SettingValue::literal(json!(["a", "an", "the"]));
        assert_eq!(literal.resolve().unwrap(), json!(["a", "an", "the"]));

        let deferred = SettingValue::deferred(|| Ok(json!(["title"])));
        assert_eq!(deferred.resolve().unwrap(), json!(["title"]));

        let failing = SettingValue::deferred(|| Err(SyncError::config("unavailable")));
        assert!(failing.resolve().is_err());
    }

    #[test]
    fn test_normalization_context() {
        let plain = IndexConfiguration::new("posts", "Post");
        assert_eq!(plain.normalization_context().groups, None);

        let grouped = IndexConfiguration::new("posts", "Post").with_serializer_groups(["public"]);
        assert_eq!(
            grouped.normalization_context().groups,
            Some(vec!["public".to_string()])
        );
    }
}
