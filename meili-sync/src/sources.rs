//! JSON file data sources.
//!
//! Each source is a JSON array of objects of one class, loaded whole into an
//! [`InMemoryDataProvider`].

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use meili_sync_manager::{
    DataProviderRegistry, DynamicEntity, Entity, InMemoryDataProvider, SyncConfig,
};

use crate::config::{FileConfig, SourceSection};
use crate::CliError;

/// Parse a JSON array into entities of `class`.
pub fn parse_entities(class: &str, contents: &str) -> Result<Vec<Arc<dyn Entity>>, CliError> {
    let value: Value = serde_json::from_str(contents)
        .map_err(|e| CliError::config(format!("Invalid JSON source for {}: {}", class, e)))?;

    let Value::Array(items) = value else {
        return Err(CliError::config(format!(
            "Source for {} must be a JSON array",
            class
        )));
    };

    items
        .into_iter()
        .map(|item| -> Result<Arc<dyn Entity>, CliError> {
            let entity = DynamicEntity::from_value(class, item)?;
            Ok(Arc::new(entity))
        })
        .collect()
}

/// Load one source file into a provider.
pub async fn load_source(
    section: &SourceSection,
    path: &Path,
) -> Result<InMemoryDataProvider, CliError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        CliError::config(format!("Cannot read source {}: {}", path.display(), e))
    })?;

    let provider = InMemoryDataProvider::new(&section.class, section.identifier.iter().cloned());
    let count = provider
        .extend(parse_entities(&section.class, &contents)?)
        .await?;

    info!(class = %section.class, path = %path.display(), count, "Loaded source");
    Ok(provider)
}

/// Load every declared source and register it under its indices.
pub async fn load_registry(
    file: &FileConfig,
    config: &SyncConfig,
) -> Result<DataProviderRegistry, CliError> {
    let mut registry = DataProviderRegistry::new(config.hierarchy.clone());

    for section in &file.sources {
        let provider = load_source(section, &file.resolve_path(&section.file)).await?;
        let registered = registry.register_class(config, &section.class, Arc::new(provider));
        if registered == 0 {
            warn!(class = %section.class, "Source matches no configured index");
        }
    }

    Ok(registry)
}
