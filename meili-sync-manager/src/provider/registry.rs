use std::fmt;
use std::sync::Arc;

use super::DataProvider;
use crate::config::SyncConfig;
use crate::entity::ClassHierarchy;
use crate::errors::SyncError;

struct Entry {
    index: String,
    class: String,
    provider: Arc<dyn DataProvider>,
}

/// Resolves the data provider of an (index, class) pair.
///
/// Entries are kept in registration order. An exact match wins; otherwise
/// the first entry of the index registered for a superclass is used.
#[derive(Default)]
pub struct DataProviderRegistry {
    entries: Vec<Entry>,
    hierarchy: Arc<ClassHierarchy>,
}

impl DataProviderRegistry {
    pub fn new(hierarchy: Arc<ClassHierarchy>) -> Self {
        Self {
            entries: Vec::new(),
            hierarchy,
        }
    }

    /// Register a provider for `class` in the index named `index` (unprefixed).
    pub fn register(
        &mut self,
        index: impl Into<String>,
        class: impl Into<String>,
        provider: Arc<dyn DataProvider>,
    ) {
        self.entries.push(Entry {
            index: index.into(),
            class: class.into(),
            provider,
        });
    }

    /// Register a provider for `class` in every index that stores it, directly,
    /// through a superclass, or through an aggregator. Returns the number of
    /// indices it was registered for.
    pub fn register_class(
        &mut self,
        config: &SyncConfig,
        class: &str,
        provider: Arc<dyn DataProvider>,
    ) -> usize {
        let indices: Vec<String> = config
            .indices
            .iter()
            .filter(|index| {
                config.hierarchy.is_a(class, &index.class)
                    || config
                        .aggregator(&index.class)
                        .is_some_and(|definition| definition.aggregates(class))
            })
            .map(|index| index.name.clone())
            .collect();

        for index in &indices {
            self.register(index.as_str(), class, provider.clone());
        }
        indices.len()
    }

    pub fn get(&self, index: &str, class: &str) -> Result<Arc<dyn DataProvider>, SyncError> {
        self.entries_for(index)
            .find(|entry| entry.class == class)
            .or_else(|| {
                self.entries_for(index)
                    .find(|entry| self.hierarchy.is_a(class, &entry.class))
            })
            .map(|entry| entry.provider.clone())
            .ok_or_else(|| SyncError::provider_not_found(index, class))
    }

    fn entries_for<'a>(&'a self, index: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |entry| entry.index == index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DataProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.index, &e.class)))
            .finish()
    }
}
