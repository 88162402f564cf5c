//! Keeps indices in step with persistence lifecycle events.

use std::sync::Arc;

use tracing::debug;

use crate::entity::Entity;
use crate::errors::SyncError;
use crate::manager::{BatchResponse, IndexManager};

/// A persistence event on one entity.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// The entity was inserted.
    PostPersist(Arc<dyn Entity>),
    /// The entity was updated.
    PostUpdate(Arc<dyn Entity>),
    /// The entity is about to be deleted.
    PreRemove(Arc<dyn Entity>),
}

impl LifecycleEvent {
    pub fn entity(&self) -> &Arc<dyn Entity> {
        match self {
            Self::PostPersist(entity) | Self::PostUpdate(entity) | Self::PreRemove(entity) => {
                entity
            }
        }
    }
}

/// Indexes persisted and updated entities, removes deleted ones.
#[derive(Clone)]
pub struct LifecycleSubscriber {
    manager: IndexManager,
}

impl LifecycleSubscriber {
    pub fn new(manager: IndexManager) -> Self {
        Self { manager }
    }

    pub async fn post_persist(&self, entity: Arc<dyn Entity>) -> Result<BatchResponse, SyncError> {
        self.manager.index(&[entity]).await
    }

    pub async fn post_update(&self, entity: Arc<dyn Entity>) -> Result<BatchResponse, SyncError> {
        self.manager.index(&[entity]).await
    }

    pub async fn pre_remove(&self, entity: Arc<dyn Entity>) -> Result<BatchResponse, SyncError> {
        self.manager.remove(&[entity]).await
    }

    pub async fn handle(&self, event: LifecycleEvent) -> Result<BatchResponse, SyncError> {
        debug!(class = %event.entity().class_name(), event = ?event, "Lifecycle event");
        match event {
            LifecycleEvent::PostPersist(entity) => self.post_persist(entity).await,
            LifecycleEvent::PostUpdate(entity) => self.post_update(entity).await,
            LifecycleEvent::PreRemove(entity) => self.pre_remove(entity).await,
        }
    }
}
