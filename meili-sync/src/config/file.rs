//! TOML configuration file.
//!
//! ```toml
//! prefix = "app_"
//! batch_size = 500
//!
//! [meilisearch]
//! url = "http://localhost:7700"
//!
//! [[indices]]
//! name = "posts"
//! class = "Post"
//! index_if = "published"
//! settings = { stopWords = ["a", "the"], synonyms = { _service = "synonyms" } }
//!
//! [services.synonyms]
//! file = "config/synonyms.json"
//!
//! [[sources]]
//! class = "Post"
//! file = "data/posts.json"
//! identifier = ["id"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use meili_sync_manager::config::{DEFAULT_BATCH_SIZE, DEFAULT_NB_RESULTS, DEFAULT_PRIMARY_KEY};
use meili_sync_manager::{
    AggregatorDefinition, ClassHierarchy, IndexConfiguration, SettingProvider, SettingValue,
    SyncConfig, SyncError,
};
use meili_sync_repository::config::DEFAULT_URL;
use meili_sync_repository::ClientConfig;

use crate::CliError;

/// Key marking a setting value computed by a named service.
pub const SERVICE_KEY: &str = "_service";

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "meili-sync.toml";

/// Contents of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_nb_results")]
    pub nb_results: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub meilisearch: MeilisearchSection,

    #[serde(default)]
    pub indices: Vec<IndexSection>,

    #[serde(default)]
    pub aggregators: Vec<AggregatorSection>,

    /// Child class to direct parent class.
    #[serde(default)]
    pub hierarchy: BTreeMap<String, String>,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceSection>,

    #[serde(default)]
    pub sources: Vec<SourceSection>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeilisearchSection {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay between two polls while waiting for an engine task.
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
}

impl Default for MeilisearchSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            task_poll_interval_ms: default_task_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexSection {
    pub name: String,
    pub class: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default)]
    pub enable_serializer_groups: bool,

    #[serde(default)]
    pub serializer_groups: Option<Vec<String>>,

    #[serde(default)]
    pub index_if: Option<String>,

    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorSection {
    pub class: String,
    pub entities: Vec<String>,
}

/// A setting provider declared in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// JSON file read each time settings are pushed.
    pub file: PathBuf,
}

/// A JSON array of entities of one class.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub class: String,
    pub file: PathBuf,

    #[serde(default = "default_identifier")]
    pub identifier: Vec<String>,
}

fn default_nb_results() -> usize {
    DEFAULT_NB_RESULTS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_task_poll_interval_ms() -> u64 {
    50
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_identifier() -> Vec<String> {
    vec!["id".to_string()]
}

/// Setting value that reads a JSON document from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSetting {
    path: PathBuf,
}

impl JsonFileSetting {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingProvider for JsonFileSetting {
    fn provide(&self) -> Result<Value, SyncError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            SyncError::config(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Named setting providers referenced as `{ _service = "<name>" }`.
#[derive(Default, Clone)]
pub struct SettingServices {
    providers: HashMap<String, Arc<dyn SettingProvider>>,
}

impl SettingServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn SettingProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SettingProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl FileConfig {
    /// Read and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("Cannot read configuration {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&contents)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, CliError> {
        toml::from_str(contents)
            .map_err(|e| CliError::config(format!("Invalid configuration: {}", e)))
    }

    /// Apply `MEILISEARCH_URL`, `MEILISEARCH_API_KEY` and `MEILISEARCH_PREFIX`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MEILISEARCH_URL") {
            self.meilisearch.url = url;
        }
        if let Some(api_key) = lookup("MEILISEARCH_API_KEY") {
            self.meilisearch.api_key = Some(api_key).filter(|key| !key.is_empty());
        }
        if let Some(prefix) = lookup("MEILISEARCH_PREFIX") {
            self.prefix = prefix;
        }
        self
    }

    /// Resolve a path from the file against the file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.meilisearch.url)
            .with_request_timeout(Duration::from_millis(self.meilisearch.request_timeout_ms))
            .with_task_poll_interval(Duration::from_millis(self.meilisearch.task_poll_interval_ms));
        match &self.meilisearch.api_key {
            Some(api_key) => config.with_api_key(api_key),
            None => config,
        }
    }

    /// Providers declared under `[services]`.
    pub fn setting_services(&self) -> SettingServices {
        let mut services = SettingServices::new();
        for (name, service) in &self.services {
            let provider = JsonFileSetting::new(self.resolve_path(&service.file));
            services.register(name, Arc::new(provider));
        }
        services
    }

    /// Build the validated index configuration.
    pub fn sync_config(&self, services: &SettingServices) -> Result<SyncConfig, CliError> {
        let hierarchy = self
            .hierarchy
            .iter()
            .fold(ClassHierarchy::new(), |hierarchy, (child, parent)| {
                hierarchy.with_parent(child, parent)
            });

        let mut config = SyncConfig::new()
            .with_prefix(&self.prefix)
            .with_nb_results(self.nb_results)
            .with_batch_size(self.batch_size)
            .with_hierarchy(hierarchy);

        for section in &self.indices {
            config = config.with_index(index_configuration(section, services)?);
        }
        for section in &self.aggregators {
            config = config.with_aggregator(AggregatorDefinition::new(
                &section.class,
                section.entities.iter().cloned(),
            ));
        }

        config.validate()?;
        Ok(config)
    }
}

fn index_configuration(
    section: &IndexSection,
    services: &SettingServices,
) -> Result<IndexConfiguration, CliError> {
    let mut index = IndexConfiguration::new(&section.name, &section.class)
        .with_primary_key(&section.primary_key);

    if section.enable_serializer_groups {
        index = match &section.serializer_groups {
            Some(groups) => index.with_serializer_groups(groups.iter().cloned()),
            None => IndexConfiguration {
                enable_serializer_groups: true,
                ..index
            },
        };
    }
    if let Some(path) = &section.index_if {
        index = index.with_index_if(path);
    }

    for (name, value) in &section.settings {
        index = index.with_setting(name, setting_value(&section.name, value, services)?);
    }

    Ok(index)
}

fn setting_value(
    index: &str,
    value: &Value,
    services: &SettingServices,
) -> Result<SettingValue, CliError> {
    let service = match value {
        Value::Object(map) if map.len() == 1 => map.get(SERVICE_KEY),
        _ => None,
    };

    match service {
        Some(Value::String(name)) => services
            .get(name)
            .map(SettingValue::Deferred)
            .ok_or_else(|| {
                CliError::config(format!("Unknown setting service {} for index {}", name, index))
            }),
        Some(_) => Err(CliError::config(format!(
            "Setting service name must be a string in index {}",
            index
        ))),
        None => Ok(SettingValue::Literal(value.clone())),
    }
}
