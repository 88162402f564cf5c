//! # Meili Sync Manager
//!
//! This crate keeps a set of persisted entities synchronized with search
//! indices.
//!
//! ## Architecture
//!
//! An indexing call flows through the following components:
//!
//! 1. **Config**: maps entity classes to one or more indices
//! 2. **Provider**: pages entities and extracts their identifiers
//! 3. **Aggregator**: merges several entity classes into one shared index
//! 4. **Searchable**: normalizes an entity into a search document
//! 5. **Manager**: resolves, batches and dispatches documents to the engine
//! 6. **Settings**: pushes declared index settings to the engine
//! 7. **Import**: bulk (re)indexing, optionally through swapped shadow indices

pub mod aggregator;
pub mod config;
pub mod entity;
pub mod errors;
pub mod identifier;
pub mod import;
pub mod listener;
pub mod manager;
pub mod provider;
pub mod searchable;
pub mod settings;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, AggregatorDefinition};
pub use config::{IndexConfiguration, SettingProvider, SettingValue, SyncConfig};
pub use entity::{
    ClassHierarchy, ClassResolver, DeclaredClassResolver, DynamicEntity, Entity, ProxyClassResolver,
    SelfNormalizing,
};
pub use errors::SyncError;
pub use identifier::{denormalize_identifier, normalize_identifiers};
pub use import::{ImportOptions, ImportReport, Importer, IndexImport};
pub use listener::{LifecycleEvent, LifecycleSubscriber};
pub use manager::{BatchOperation, BatchResponse, ChunkResult, IndexManager};
pub use provider::{DataProvider, DataProviderRegistry, InMemoryDataProvider};
pub use searchable::{DefaultNormalizer, NormalizationContext, Normalizer, SearchableObject};
pub use settings::{SettingsUpdated, SettingsUpdater};
