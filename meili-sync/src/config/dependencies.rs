//! Dependency initialization and wiring for the synchronizer.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{FileConfig, SettingServices};
use crate::sources::load_registry;
use crate::CliError;
use meili_sync_manager::{Importer, IndexManager, SettingsUpdater, SyncConfig};
use meili_sync_repository::{MeilisearchClient, SearchEngineClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub client: Arc<dyn SearchEngineClient>,
    pub config: Arc<SyncConfig>,
    pub manager: IndexManager,
    pub settings: SettingsUpdater,
    pub importer: Importer,
    /// Delay between two polls of an engine task.
    pub poll_interval: Duration,
}

impl Dependencies {
    /// Connect to Meilisearch and wire everything declared in `file`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(CliError)` - If the engine is unreachable or the file is invalid
    pub async fn new(file: &FileConfig) -> Result<Self, CliError> {
        let client_config = file.client_config();

        info!(
            meilisearch_url = %client_config.url,
            prefix = %file.prefix,
            indices = file.indices.len(),
            sources = file.sources.len(),
            "Initializing dependencies"
        );

        let client = MeilisearchClient::new(client_config)
            .map_err(|e| CliError::config(format!("Failed to create Meilisearch client: {}", e)))?;

        let healthy = client
            .health_check()
            .await
            .map_err(|e| CliError::config(format!("Meilisearch health check failed: {}", e)))?;

        if !healthy {
            return Err(CliError::config("Meilisearch instance is unavailable"));
        }

        info!("Meilisearch connection verified");

        Self::with_client(Arc::new(client), file, &file.setting_services()).await
    }

    /// Wire the manager, settings updater and importer around `client`.
    pub async fn with_client(
        client: Arc<dyn SearchEngineClient>,
        file: &FileConfig,
        services: &SettingServices,
    ) -> Result<Self, CliError> {
        let config = Arc::new(file.sync_config(services)?);
        let providers = Arc::new(load_registry(file, &config).await?);
        let poll_interval = file.client_config().task_poll_interval;

        let manager = IndexManager::new(client.clone(), config.clone(), providers);
        let settings =
            SettingsUpdater::new(client.clone(), config.clone()).with_poll_interval(poll_interval);
        let importer = Importer::new(manager.clone());

        info!(searchables = ?manager.searchables(), "Index manager ready");

        Ok(Self {
            client,
            config,
            manager,
            settings,
            importer,
            poll_interval,
        })
    }
}
