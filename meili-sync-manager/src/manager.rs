//! The index manager.
//!
//! Every `index`/`remove` call runs through the same stages:
//!
//! 1. **Resolve**: find the index configurations matching each entity's class
//! 2. **Build**: wrap entities for aggregated indices and evaluate `index_if`
//! 3. **Batch**: group by index uid and chunk by the configured batch size
//! 4. **Dispatch**: send each chunk to the engine, in order
//! 5. **Aggregate**: collect the engine tasks per index
//!
//! Tasks are returned as soon as the engine acknowledged them. Waiting for
//! them is up to the caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::{Aggregator, AggregatorDefinition};
use crate::config::{IndexConfiguration, SyncConfig};
use crate::entity::{is_truthy, ClassResolver, DeclaredClassResolver, Entity};
use crate::errors::SyncError;
use crate::provider::DataProviderRegistry;
use crate::searchable::{DefaultNormalizer, Normalizer, SearchableObject};
use meili_sync_repository::SearchEngineClient;
use meili_sync_shared::{Document, Identifier, SearchQuery, SearchResponse, TaskInfo};

/// What a chunk did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperation {
    /// Documents added or replaced.
    Upsert,
    /// Documents deleted by primary key.
    Delete,
}

/// One engine call made for a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub operation: BatchOperation,
    /// Number of documents (or primary keys) in the chunk.
    pub documents: usize,
    pub task: TaskInfo,
}

/// Engine tasks of an `index`/`remove` call, per index uid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponse {
    indices: BTreeMap<String, Vec<ChunkResult>>,
}

impl BatchResponse {
    fn push(&mut self, index_uid: &str, chunk: ChunkResult) {
        self.indices
            .entry(index_uid.to_string())
            .or_default()
            .push(chunk);
    }

    /// Chunks sent to an index, in dispatch order.
    pub fn get(&self, index_uid: &str) -> &[ChunkResult] {
        self.indices.get(index_uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index uids that received at least one chunk.
    pub fn indices(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    /// Documents added to an index.
    pub fn document_count(&self, index_uid: &str) -> usize {
        self.count(index_uid, BatchOperation::Upsert)
    }

    /// Documents deleted from an index.
    pub fn removed_count(&self, index_uid: &str) -> usize {
        self.count(index_uid, BatchOperation::Delete)
    }

    fn count(&self, index_uid: &str, operation: BatchOperation) -> usize {
        self.get(index_uid)
            .iter()
            .filter(|chunk| chunk.operation == operation)
            .map(|chunk| chunk.documents)
            .sum()
    }

    /// Every task, grouped by index.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskInfo> {
        self.indices.values().flatten().map(|chunk| &chunk.task)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// An entity ready to be written to one index.
struct Built {
    entity: Arc<dyn Entity>,
    identifier: Identifier,
}

/// Work collected for one index before dispatch.
struct Pending<'a> {
    config: &'a IndexConfiguration,
    upserts: Vec<Built>,
    deletes: Vec<Identifier>,
}

/// Routes entities to their indices and talks to the engine.
#[derive(Clone)]
pub struct IndexManager {
    client: Arc<dyn SearchEngineClient>,
    config: Arc<SyncConfig>,
    providers: Arc<DataProviderRegistry>,
    normalizer: Arc<dyn Normalizer>,
    class_resolver: Arc<dyn ClassResolver>,
}

impl IndexManager {
    pub fn new(
        client: Arc<dyn SearchEngineClient>,
        config: Arc<SyncConfig>,
        providers: Arc<DataProviderRegistry>,
    ) -> Self {
        Self {
            client,
            config,
            providers,
            normalizer: Arc::new(DefaultNormalizer),
            class_resolver: Arc::new(DeclaredClassResolver),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_class_resolver(mut self, class_resolver: Arc<dyn ClassResolver>) -> Self {
        self.class_resolver = class_resolver;
        self
    }

    /// A manager writing to the same indices under another prefix.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let config = self.config.as_ref().clone().with_prefix(prefix);
        Self {
            config: Arc::new(config),
            ..self.clone()
        }
    }

    pub fn client(&self) -> &Arc<dyn SearchEngineClient> {
        &self.client
    }

    pub fn configuration(&self) -> &SyncConfig {
        &self.config
    }

    pub fn shared_configuration(&self) -> Arc<SyncConfig> {
        self.config.clone()
    }

    pub fn providers(&self) -> &Arc<DataProviderRegistry> {
        &self.providers
    }

    /// Classes with a configured index, in configuration order.
    pub fn searchables(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = Vec::new();
        for index in &self.config.indices {
            if !classes.contains(&index.class.as_str()) {
                classes.push(&index.class);
            }
        }
        classes
    }

    /// Whether entities of `class` are written to at least one index.
    pub fn is_searchable(&self, class: &str) -> bool {
        self.config.indices.iter().any(|index| self.matches(index, class))
    }

    pub fn assert_is_searchable(&self, class: &str) -> Result<(), SyncError> {
        if self.is_searchable(class) {
            Ok(())
        } else {
            Err(SyncError::not_searchable(class))
        }
    }

    /// Add or update entities in every index they belong to.
    ///
    /// Entities of unconfigured classes are skipped. Entities failing their
    /// index's `index_if` predicate are removed from that index instead.
    #[instrument(skip(self, entities), fields(entity_count = entities.len()))]
    pub async fn index(&self, entities: &[Arc<dyn Entity>]) -> Result<BatchResponse, SyncError> {
        let candidates: Vec<&IndexConfiguration> = self.config.indices.iter().collect();
        let pending = self.build(entities, &candidates, false)?;
        self.dispatch(pending).await
    }

    /// Like [`IndexManager::index`], restricted to the index named `name`.
    #[instrument(skip(self, entities), fields(entity_count = entities.len()))]
    pub async fn index_into(
        &self,
        entities: &[Arc<dyn Entity>],
        name: &str,
    ) -> Result<BatchResponse, SyncError> {
        let index = self
            .config
            .index_by_name(name)
            .ok_or_else(|| SyncError::unknown_index(name))?;
        let pending = self.build(entities, &[index], false)?;
        self.dispatch(pending).await
    }

    /// Remove entities from every index they belong to.
    #[instrument(skip(self, entities), fields(entity_count = entities.len()))]
    pub async fn remove(&self, entities: &[Arc<dyn Entity>]) -> Result<BatchResponse, SyncError> {
        let candidates: Vec<&IndexConfiguration> = self.config.indices.iter().collect();
        let pending = self.build(entities, &candidates, true)?;
        self.dispatch(pending).await
    }

    /// Search the index of `class` and load the matching entities.
    ///
    /// Hits keep the engine's order. Hits whose entity no longer exists are
    /// dropped. Without an explicit limit, `nb_results` hits are requested.
    #[instrument(skip(self, query), fields(class = %class, q = %query.q))]
    pub async fn search(
        &self,
        class: &str,
        query: SearchQuery,
    ) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
        let index = self.search_index(class)?;
        let response = self.query(index, query).await?;
        if response.hits.is_empty() {
            return Ok(Vec::new());
        }

        let entities = match self.config.aggregator(&index.class) {
            Some(definition) => self.hydrate_aggregated(index, definition, &response.hits).await?,
            None => self.hydrate(index, class, &response.hits).await?,
        };

        if entities.len() < response.hits.len() {
            warn!(
                index = %index.prefixed_name,
                hits = response.hits.len(),
                loaded = entities.len(),
                "Dropped hits without a matching entity"
            );
        }
        Ok(entities)
    }

    /// Search the index of `class` without loading entities.
    pub async fn raw_search(
        &self,
        class: &str,
        query: SearchQuery,
    ) -> Result<SearchResponse, SyncError> {
        let index = self.search_index(class)?;
        self.query(index, query).await
    }

    /// Estimated number of documents of `class` matching the query.
    pub async fn count(&self, class: &str, query: SearchQuery) -> Result<u64, SyncError> {
        Ok(self.raw_search(class, query).await?.total_hits())
    }

    /// Remove all documents from the indices of `class`.
    pub async fn clear(&self, class: &str) -> Result<Vec<TaskInfo>, SyncError> {
        let mut tasks = Vec::new();
        for index in self.class_indices(class)? {
            info!(index = %index.prefixed_name, "Clearing index");
            tasks.push(self.client.delete_all_documents(&index.prefixed_name).await?);
        }
        Ok(tasks)
    }

    /// Delete the indices of `class`.
    pub async fn delete(&self, class: &str) -> Result<Vec<TaskInfo>, SyncError> {
        let mut tasks = Vec::new();
        for index in self.class_indices(class)? {
            tasks.push(self.delete_by_index_name(&index.prefixed_name).await?);
        }
        Ok(tasks)
    }

    /// Delete an index by uid.
    pub async fn delete_by_index_name(&self, index_uid: &str) -> Result<TaskInfo, SyncError> {
        info!(index = %index_uid, "Deleting index");
        Ok(self.client.delete_index(index_uid).await?)
    }

    /// Create the index named `name` (unprefixed) with its primary key.
    pub async fn create_index(&self, name: &str) -> Result<TaskInfo, SyncError> {
        let index = self
            .config
            .index_by_name(name)
            .ok_or_else(|| SyncError::unknown_index(name))?;

        info!(index = %index.prefixed_name, primary_key = %index.primary_key, "Creating index");
        Ok(self
            .client
            .create_index(&index.prefixed_name, Some(&index.primary_key))
            .await?)
    }

    /// Atomically swap each pair of index uids.
    pub async fn swap_indices(&self, pairs: &[(String, String)]) -> Result<TaskInfo, SyncError> {
        info!(pairs = ?pairs, "Swapping indices");
        Ok(self.client.swap_indexes(pairs).await?)
    }

    fn matches(&self, index: &IndexConfiguration, class: &str) -> bool {
        self.config.hierarchy.is_a(class, &index.class)
            || self
                .config
                .aggregator(&index.class)
                .is_some_and(|definition| definition.aggregates(class))
    }

    fn class_indices(&self, class: &str) -> Result<Vec<&IndexConfiguration>, SyncError> {
        let indices: Vec<&IndexConfiguration> = self
            .config
            .indices
            .iter()
            .filter(|index| index.class == class)
            .collect();

        if indices.is_empty() {
            return Err(SyncError::not_searchable(class));
        }
        Ok(indices)
    }

    fn search_index(&self, class: &str) -> Result<&IndexConfiguration, SyncError> {
        self.config
            .indices
            .iter()
            .find(|index| index.class == class)
            .ok_or_else(|| SyncError::not_searchable(class))
    }

    async fn query(
        &self,
        index: &IndexConfiguration,
        mut query: SearchQuery,
    ) -> Result<SearchResponse, SyncError> {
        if query.limit.is_none() {
            query.limit = Some(self.config.nb_results);
        }
        Ok(self.client.search(&index.prefixed_name, &query).await?)
    }

    /// Resolve and build: collect the documents and deletions per index.
    fn build<'a>(
        &'a self,
        entities: &[Arc<dyn Entity>],
        candidates: &[&'a IndexConfiguration],
        removal: bool,
    ) -> Result<BTreeMap<String, Pending<'a>>, SyncError> {
        let mut batches: BTreeMap<String, Pending<'a>> = BTreeMap::new();

        for entity in entities {
            let class = self.class_resolver.resolve(entity.as_ref());
            let matching: Vec<&IndexConfiguration> = candidates
                .iter()
                .copied()
                .filter(|index| self.matches(index, &class))
                .collect();

            if matching.is_empty() {
                debug!(class = %class, "Skipping entity of a class that is not searchable");
                continue;
            }

            for index in matching {
                let built = self.build_for_index(entity, &class, index)?;
                let keep = !removal && self.should_index(index, built.entity.as_ref())?;

                let pending = batches
                    .entry(index.prefixed_name.clone())
                    .or_insert_with(|| Pending {
                        config: index,
                        upserts: Vec::new(),
                        deletes: Vec::new(),
                    });

                if keep {
                    pending.upserts.push(built);
                } else {
                    pending.deletes.push(built.identifier);
                }
            }
        }

        Ok(batches)
    }

    fn build_for_index(
        &self,
        entity: &Arc<dyn Entity>,
        class: &str,
        index: &IndexConfiguration,
    ) -> Result<Built, SyncError> {
        if let Some(aggregator) = entity.as_aggregator() {
            return Ok(Built {
                identifier: Identifier::from(aggregator.object_id()),
                entity: entity.clone(),
            });
        }

        let provider = self.providers.get(&index.name, class)?;

        if let Some(definition) = self.config.aggregator(&index.class) {
            let fields = provider.identifier_values(entity.as_ref())?;
            let aggregator = Aggregator::new(
                definition.clone(),
                entity.clone(),
                class,
                &fields,
                &index.primary_key,
            )?;
            return Ok(Built {
                identifier: Identifier::from(aggregator.object_id()),
                entity: Arc::new(aggregator),
            });
        }

        Ok(Built {
            identifier: provider.identifier(entity.as_ref())?,
            entity: entity.clone(),
        })
    }

    fn should_index(&self, index: &IndexConfiguration, entity: &dyn Entity) -> Result<bool, SyncError> {
        match index.index_if {
            Some(ref path) => Ok(is_truthy(&entity.property(path)?)),
            None => Ok(true),
        }
    }

    /// Batch, dispatch and aggregate.
    async fn dispatch(&self, batches: BTreeMap<String, Pending<'_>>) -> Result<BatchResponse, SyncError> {
        let batch_size = self.config.batch_size.max(1);
        let mut response = BatchResponse::default();

        for (index_uid, pending) in batches {
            let context = pending.config.normalization_context();
            let mut documents: Vec<Document> = Vec::with_capacity(pending.upserts.len());

            for built in pending.upserts {
                let object = SearchableObject::new(
                    index_uid.as_str(),
                    pending.config.primary_key.as_str(),
                    built.entity,
                    built.identifier,
                    self.normalizer.clone(),
                    context.clone(),
                );
                match object.to_document()? {
                    Some(document) => documents.push(document),
                    None => debug!(object = ?object, "Skipping empty document"),
                }
            }

            for chunk in documents.chunks(batch_size) {
                let task = self
                    .client
                    .add_documents(&index_uid, chunk, Some(&pending.config.primary_key))
                    .await
                    .inspect_err(|e| {
                        error!(index = %index_uid, error = %e, "Failed to add documents");
                    })?;

                debug!(index = %index_uid, count = chunk.len(), task_uid = task.task_uid, "Sent documents");
                response.push(
                    &index_uid,
                    ChunkResult {
                        operation: BatchOperation::Upsert,
                        documents: chunk.len(),
                        task,
                    },
                );
            }

            for chunk in pending.deletes.chunks(batch_size) {
                let task = self
                    .client
                    .delete_documents(&index_uid, chunk)
                    .await
                    .inspect_err(|e| {
                        error!(index = %index_uid, error = %e, "Failed to delete documents");
                    })?;

                debug!(index = %index_uid, count = chunk.len(), task_uid = task.task_uid, "Sent deletions");
                response.push(
                    &index_uid,
                    ChunkResult {
                        operation: BatchOperation::Delete,
                        documents: chunk.len(),
                        task,
                    },
                );
            }

            info!(
                index = %index_uid,
                indexed = response.document_count(&index_uid),
                removed = response.removed_count(&index_uid),
                "Flushed index batch"
            );
        }

        Ok(response)
    }

    async fn hydrate(
        &self,
        index: &IndexConfiguration,
        class: &str,
        hits: &[Document],
    ) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
        let provider = self.providers.get(&index.name, class)?;
        let identifiers: Vec<Identifier> = hits
            .iter()
            .filter_map(|hit| hit.get(&index.primary_key).and_then(Identifier::from_value))
            .collect();

        let mut by_identifier: HashMap<String, Arc<dyn Entity>> = HashMap::new();
        for entity in provider.load_by_identifiers(&identifiers).await? {
            let identifier = provider.identifier(entity.as_ref())?;
            by_identifier.insert(identifier.to_string(), entity);
        }

        Ok(identifiers
            .iter()
            .filter_map(|identifier| by_identifier.get(&identifier.to_string()).cloned())
            .collect())
    }

    async fn hydrate_aggregated(
        &self,
        index: &IndexConfiguration,
        definition: &AggregatorDefinition,
        hits: &[Document],
    ) -> Result<Vec<Arc<dyn Entity>>, SyncError> {
        let object_ids: Vec<&str> = hits
            .iter()
            .filter_map(|hit| hit.get(&index.primary_key).and_then(Value::as_str))
            .collect();

        let mut by_class: BTreeMap<&str, Vec<Identifier>> = BTreeMap::new();
        for object_id in &object_ids {
            let class = definition.entity_class_from_object_id(object_id)?;
            let id = definition.entity_id_from_object_id(object_id)?;
            by_class.entry(class).or_default().push(parse_identifier(id));
        }

        let mut by_object_id: HashMap<String, Arc<dyn Entity>> = HashMap::new();
        for (class, identifiers) in by_class {
            let provider = self.providers.get(&index.name, class)?;
            for entity in provider.load_by_identifiers(&identifiers).await? {
                let identifier = provider.identifier(entity.as_ref())?;
                by_object_id.insert(
                    AggregatorDefinition::object_id(class, &identifier.to_string()),
                    entity,
                );
            }
        }

        Ok(object_ids
            .iter()
            .filter_map(|object_id| by_object_id.get(*object_id).cloned())
            .collect())
    }
}

/// Entity id from an object id: integer when it reads back identically.
fn parse_identifier(id: &str) -> Identifier {
    id.parse::<i64>()
        .ok()
        .filter(|n| n.to_string() == id)
        .map(Identifier::Int)
        .unwrap_or_else(|| Identifier::from(id))
}
