//! Data providers supply entities to index and re-hydrate search hits.

mod in_memory;
mod registry;

pub use in_memory::InMemoryDataProvider;
pub use registry::DataProviderRegistry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::Entity;
use crate::errors::SyncError;
use crate::identifier;
use meili_sync_shared::{Identifier, IdentifierFields};

/// Source of truth for the entities of one class.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// A page of entities ordered by identifier, ascending.
    async fn provide(&self, limit: usize, offset: usize) -> Result<Vec<Arc<dyn Entity>>, SyncError>;

    /// Entities for the given identifiers, in no particular order. Unknown
    /// identifiers are omitted.
    async fn load_by_identifiers(
        &self,
        identifiers: &[Identifier],
    ) -> Result<Vec<Arc<dyn Entity>>, SyncError>;

    /// The primary key fields of an entity.
    fn identifier_values(&self, entity: &dyn Entity) -> Result<IdentifierFields, SyncError>;

    fn normalize_identifiers(&self, fields: &IdentifierFields) -> Result<Identifier, SyncError> {
        identifier::normalize_identifiers(fields)
    }

    fn denormalize_identifier(&self, identifier: &str) -> Result<IdentifierFields, SyncError> {
        identifier::denormalize_identifier(identifier)
    }

    /// The document identifier of an entity.
    fn identifier(&self, entity: &dyn Entity) -> Result<Identifier, SyncError> {
        let fields = self.identifier_values(entity)?;
        self.normalize_identifiers(&fields)
    }

    /// Release per-batch state. Called after every imported page.
    async fn cleanup(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
