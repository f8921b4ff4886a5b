use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use crate::error::{QuiverError, Result};

use super::Segment;

/// Registry of the current snapshot per collection.
///
/// Publishing swaps the `Arc`; queries holding an older snapshot keep
/// reading it until they finish.
#[derive(Debug, Default)]
pub struct Catalog {
    registry: DashMap<String, Arc<Segment>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            registry: DashMap::new(),
        }
    }

    /// Publish `segment` as the current snapshot of its collection,
    /// returning the snapshot it replaced.
    #[instrument(skip(self, segment), fields(collection = segment.collection()))]
    pub fn publish(&self, segment: Segment) -> Option<Arc<Segment>> {
        let name = segment.collection().to_string();
        let entities = segment.len();
        let previous = self.registry.insert(name, Arc::new(segment));
        info!(
            entities = entities,
            replaced = previous.is_some(),
            "published snapshot"
        );
        previous
    }

    /// Current snapshot of `collection`.
    pub fn snapshot(&self, collection: &str) -> Result<Arc<Segment>> {
        self.registry
            .get(collection)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QuiverError::CollectionNotFound {
                collection: collection.to_string(),
            })
    }

    #[instrument(skip(self))]
    pub fn drop_collection(&self, collection: &str) -> Result<()> {
        self.registry
            .remove(collection)
            .map(|_| info!("collection dropped"))
            .ok_or_else(|| QuiverError::CollectionNotFound {
                collection: collection.to_string(),
            })
    }

    /// Collection names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Check if a collection has a published snapshot.
    pub fn contains(&self, collection: &str) -> bool {
        self.registry.contains_key(collection)
    }
}
