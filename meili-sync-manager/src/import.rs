//! Bulk (re)indexing from the data providers.
//!
//! With `swap_indices`, documents are written to shadow indices named
//! `_tmp_<uid>` which replace the live indices in a single engine swap once
//! everything is imported.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::IndexConfiguration;
use crate::errors::SyncError;
use crate::manager::IndexManager;
use crate::settings::SettingsUpdater;
use meili_sync_repository::SearchError;
use meili_sync_shared::TaskInfo;

/// Prefix added in front of the configured prefix for shadow indices.
pub const TEMPORARY_PREFIX: &str = "_tmp_";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Unprefixed index names; empty imports every index.
    pub indices: Vec<String>,
    /// Entities per page, defaulting to the configured batch size.
    pub batch_size: Option<usize>,
    /// Pages to skip at the start of each provider.
    pub skip_batches: usize,
    /// Longest wait for each engine task.
    pub response_timeout: Duration,
    pub update_settings: bool,
    pub swap_indices: bool,
    pub poll_interval: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            batch_size: None,
            skip_batches: 0,
            response_timeout: Duration::from_millis(5000),
            update_settings: true,
            swap_indices: false,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Outcome of an import for one index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexImport {
    pub name: String,
    /// Uid the documents were written to.
    pub index_uid: String,
    pub documents: usize,
    pub batches: usize,
    /// Settings pushed after the import.
    pub settings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub indices: Vec<IndexImport>,
    /// `(shadow, live)` pairs swapped at the end.
    pub swapped: Vec<(String, String)>,
}

impl ImportReport {
    /// Documents imported into the index named `name`.
    pub fn documents(&self, name: &str) -> usize {
        self.indices
            .iter()
            .filter(|index| index.name == name)
            .map(|index| index.documents)
            .sum()
    }

    pub fn total_documents(&self) -> usize {
        self.indices.iter().map(|index| index.documents).sum()
    }
}

pub struct Importer {
    manager: IndexManager,
}

impl Importer {
    pub fn new(manager: IndexManager) -> Self {
        Self { manager }
    }

    /// Import every entity of the selected indices.
    #[instrument(skip(self, options), fields(indices = ?options.indices, swap = options.swap_indices))]
    pub async fn import(&self, options: &ImportOptions) -> Result<ImportReport, SyncError> {
        let config = self.manager.configuration();
        let selected: Vec<IndexConfiguration> = config
            .select_indices(&options.indices)?
            .into_iter()
            .cloned()
            .collect();

        let target = if options.swap_indices {
            self.manager
                .with_prefix(&format!("{}{}", TEMPORARY_PREFIX, config.prefix))
        } else {
            self.manager.clone()
        };
        let updater = SettingsUpdater::new(target.client().clone(), target.shared_configuration())
            .with_poll_interval(options.poll_interval);

        let mut report = ImportReport::default();
        for index in &selected {
            let target_uid = format!("{}{}", target.configuration().prefix, index.name);

            if options.swap_indices {
                self.prepare_shadow(&target, &index.name, &target_uid, options)
                    .await?;
            }

            let mut imported = self.import_index(&target, index, &target_uid, options).await?;
            if imported.documents == 0 {
                warn!(index = %target_uid, "No entities to import");
            }

            if options.update_settings {
                imported.settings = updater.update(&target_uid, options.response_timeout).await?;
            }

            info!(
                index = %target_uid,
                documents = imported.documents,
                batches = imported.batches,
                "Imported index"
            );
            report.indices.push(imported);
        }

        if options.swap_indices && !selected.is_empty() {
            report.swapped = self.swap(&report, &selected, options).await?;
        }

        Ok(report)
    }

    /// Drop a shadow index left by an earlier run and create a fresh one.
    async fn prepare_shadow(
        &self,
        target: &IndexManager,
        name: &str,
        shadow_uid: &str,
        options: &ImportOptions,
    ) -> Result<(), SyncError> {
        match target.delete_by_index_name(shadow_uid).await {
            Ok(task) => self.wait(&task, options).await?,
            Err(SyncError::Search(SearchError::IndexNotFound(_))) => {}
            Err(e) => return Err(e),
        }

        let task = target.create_index(name).await?;
        self.wait(&task, options).await
    }

    async fn import_index(
        &self,
        target: &IndexManager,
        index: &IndexConfiguration,
        target_uid: &str,
        options: &ImportOptions,
    ) -> Result<IndexImport, SyncError> {
        let config = self.manager.configuration();
        let batch_size = options.batch_size.unwrap_or(config.batch_size).max(1);
        let classes: Vec<String> = match config.aggregator(&index.class) {
            Some(definition) => definition.entities().to_vec(),
            None => vec![index.class.clone()],
        };

        let mut imported = IndexImport {
            name: index.name.clone(),
            index_uid: target_uid.to_string(),
            ..Default::default()
        };

        for class in &classes {
            let provider = self.manager.providers().get(&index.name, class)?;
            let mut page = options.skip_batches;

            loop {
                let entities = provider.provide(batch_size, page * batch_size).await?;
                if entities.is_empty() {
                    break;
                }

                let response = target.index_into(&entities, &index.name).await?;
                for task in response.tasks() {
                    self.wait(task, options).await?;
                }

                imported.documents += response.document_count(target_uid);
                imported.batches += 1;
                info!(
                    index = %target_uid,
                    class = %class,
                    page = page,
                    count = entities.len(),
                    "Indexed page"
                );

                provider.cleanup().await?;
                if entities.len() < batch_size {
                    break;
                }
                page += 1;
            }
        }

        Ok(imported)
    }

    /// Swap every shadow index with its live index, then drop the shadows.
    ///
    /// When the swap fails the live indices are untouched and the shadow
    /// indices are left for inspection.
    async fn swap(
        &self,
        report: &ImportReport,
        selected: &[IndexConfiguration],
        options: &ImportOptions,
    ) -> Result<Vec<(String, String)>, SyncError> {
        let pairs: Vec<(String, String)> = report
            .indices
            .iter()
            .zip(selected)
            .map(|(imported, index)| (imported.index_uid.clone(), index.prefixed_name.clone()))
            .collect();

        let task = self.manager.swap_indices(&pairs).await?;
        self.wait(&task, options).await?;

        for (shadow, _) in &pairs {
            let task = self.manager.delete_by_index_name(shadow).await?;
            self.wait(&task, options).await?;
        }

        Ok(pairs)
    }

    async fn wait(&self, info: &TaskInfo, options: &ImportOptions) -> Result<(), SyncError> {
        let task = self
            .manager
            .client()
            .wait_for_task(info.task_uid, options.response_timeout, options.poll_interval)
            .await?;

        if task.is_success() {
            return Ok(());
        }

        let message = task
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("task ended with status {:?}", task.status));
        Err(SyncError::task_failed(task.uid, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::aggregator::AggregatorDefinition;
    use crate::config::{SettingValue, SyncConfig};
    use crate::entity::Entity;
    use crate::provider::{DataProvider, DataProviderRegistry, InMemoryDataProvider};
    use crate::testing::{post, tag, Call, MockClient};
    use meili_sync_shared::{Identifier, IdentifierFields, TaskType};
    use serde_json::json;

    /// Counts how often the importer releases the provider between pages.
    struct CleanupCounter {
        inner: InMemoryDataProvider,
        cleanups: AtomicUsize,
    }

    #[async_trait]
    impl DataProvider for CleanupCounter {
        async fn provide(&self, limit: usize, offset: usize) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
            self.inner.provide(limit, offset).await
        }

        async fn load_by_identifiers(
            &self,
            identifiers: &[Identifier],
        ) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
            self.inner.load_by_identifiers(identifiers).await
        }

        fn identifier_values(&self, entity: &dyn Entity) -> Result<IdentifierFields, SyncError> {
            self.inner.identifier_values(entity)
        }

        async fn cleanup(&self) -> Result<(), SyncError> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn importer(config: SyncConfig, posts: usize, tags: usize) -> (Arc<MockClient>, Importer) {
        let post_provider = Arc::new(InMemoryDataProvider::new("Post", ["id"]));
        let tag_provider = Arc::new(InMemoryDataProvider::new("Tag", ["id"]));
        post_provider
            .extend((1..=posts as i64).map(post).collect::<Vec<Arc<dyn Entity>>>())
            .await
            .unwrap();
        tag_provider
            .extend((1..=tags as i64).map(tag).collect::<Vec<Arc<dyn Entity>>>())
            .await
            .unwrap();

        let mut registry = DataProviderRegistry::new(config.hierarchy.clone());
        registry.register_class(&config, "Post", post_provider);
        registry.register_class(&config, "Tag", tag_provider);

        let client = MockClient::new();
        let manager = IndexManager::new(client.clone(), Arc::new(config), Arc::new(registry));
        (client, Importer::new(manager))
    }

    fn posts_config() -> SyncConfig {
        SyncConfig::new()
            .with_index(IndexConfiguration::new("posts", "Post"))
            .with_prefix("app_")
    }

    #[tokio::test]
    async fn test_pages_through_provider() {
        let (client, importer) = importer(posts_config(), 5, 0).await;
        let options = ImportOptions {
            batch_size: Some(2),
            ..Default::default()
        };

        let report = importer.import(&options).await.unwrap();

        assert_eq!(report.documents("posts"), 5);
        assert_eq!(report.indices[0].batches, 3);
        let sizes: Vec<usize> = client.added("app_posts").await.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_provider_cleaned_up_after_every_page() {
        let config = posts_config();
        let inner = InMemoryDataProvider::new("Post", ["id"]);
        inner
            .extend((1..=5).map(post).collect::<Vec<Arc<dyn Entity>>>())
            .await
            .unwrap();
        let provider = Arc::new(CleanupCounter {
            inner,
            cleanups: AtomicUsize::new(0),
        });
        let mut registry = DataProviderRegistry::new(config.hierarchy.clone());
        registry.register_class(&config, "Post", provider.clone());
        let client = MockClient::new();
        let manager = IndexManager::new(client.clone(), Arc::new(config), Arc::new(registry));
        let options = ImportOptions {
            batch_size: Some(2),
            update_settings: false,
            ..Default::default()
        };

        let report = Importer::new(manager).import(&options).await.unwrap();

        assert_eq!(report.documents("posts"), 5);
        assert_eq!(provider.cleanups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_skip_batches() {
        let (_client, importer) = importer(posts_config(), 5, 0).await;
        let options = ImportOptions {
            batch_size: Some(2),
            skip_batches: 1,
            ..Default::default()
        };

        let report = importer.import(&options).await.unwrap();

        assert_eq!(report.documents("posts"), 3);
        assert_eq!(report.indices[0].batches, 2);
    }

    #[tokio::test]
    async fn test_aggregated_index_imports_every_entity_class() {
        let config = SyncConfig::new()
            .with_index(IndexConfiguration::new("posts", "Post"))
            .with_index(IndexConfiguration::new("aggregated", "ContentAggregator"))
            .with_aggregator(AggregatorDefinition::new("ContentAggregator", ["Post", "Tag"]));
        let (client, importer) = importer(config, 3, 2).await;
        let options = ImportOptions {
            indices: vec!["aggregated".to_string()],
            ..Default::default()
        };

        let report = importer.import(&options).await.unwrap();

        assert_eq!(report.documents("aggregated"), 5);
        assert!(client.added("posts").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_index_fails_before_any_call() {
        let (client, importer) = importer(posts_config(), 1, 0).await;
        let options = ImportOptions {
            indices: vec!["nope".to_string()],
            ..Default::default()
        };

        assert!(matches!(
            importer.import(&options).await,
            Err(SyncError::UnknownIndex(_))
        ));
        assert!(client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_aborts_import() {
        let (client, importer) = importer(posts_config(), 3, 0).await;
        client.fail_tasks("document too large").await;

        let err = importer.import(&ImportOptions::default()).await.unwrap_err();

        assert!(matches!(err, SyncError::TaskFailed { ref message, .. } if message == "document too large"));
    }

    #[tokio::test]
    async fn test_swap_indices_workflow() {
        let config = SyncConfig::new()
            .with_index(
                IndexConfiguration::new("posts", "Post")
                    .with_setting("stopWords", SettingValue::literal(json!(["the"]))),
            )
            .with_prefix("app_");
        let (client, importer) = importer(config, 2, 0).await;
        client.missing_index("_tmp_app_posts").await;
        let options = ImportOptions {
            swap_indices: true,
            ..Default::default()
        };

        let report = importer.import(&options).await.unwrap();

        assert_eq!(
            report.swapped,
            vec![("_tmp_app_posts".to_string(), "app_posts".to_string())]
        );

        let calls = client.calls().await;
        assert_eq!(calls.len(), 5);
        assert_eq!(
            calls[0],
            Call::CreateIndex {
                uid: "_tmp_app_posts".to_string(),
                primary_key: Some("objectID".to_string()),
            }
        );
        assert!(matches!(calls[1], Call::AddDocuments { ref uid, .. } if uid == "_tmp_app_posts"));
        assert!(matches!(calls[2], Call::UpdateSetting { ref uid, .. } if uid == "_tmp_app_posts"));
        assert_eq!(calls[3], Call::SwapIndexes(report.swapped.clone()));
        assert_eq!(calls[4], Call::DeleteIndex("_tmp_app_posts".to_string()));
    }

    #[tokio::test]
    async fn test_failed_swap_keeps_shadow_indices() {
        let (client, importer) = importer(posts_config(), 1, 0).await;
        client.missing_index("_tmp_app_posts").await;
        client.fail_tasks_of(TaskType::IndexSwap, "swap failed").await;
        let options = ImportOptions {
            swap_indices: true,
            ..Default::default()
        };

        let err = importer.import(&options).await.unwrap_err();

        assert!(matches!(err, SyncError::TaskFailed { ref message, .. } if message == "swap failed"));
        let calls = client.calls().await;
        assert!(calls.iter().any(|call| matches!(call, Call::SwapIndexes(_))));
        assert!(!calls.iter().any(|call| matches!(call, Call::DeleteIndex(_))));
    }
}
