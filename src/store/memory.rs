//! In-memory store backend.

use super::{CollectionStore, DefinitionCursor, DefinitionStore, StoreError};
use crate::model::{Collection, Definition, HttpMethod, NewCollection, NewDefinition};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Collections and definitions held in process memory.
///
/// Definitions are kept in insertion order, so scans are in creation order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Vec<Collection>>,
    definitions: RwLock<Vec<Definition>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursors handed out by `stream_by` and not yet released.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub async fn collection_count(&self) -> usize {
        self.collections.read().await.len()
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn create_collection(&self, new: NewCollection) -> Result<Collection, StoreError> {
        let sub_domain = new.resolved_sub_domain();
        if sub_domain.is_empty() {
            return Err(StoreError::Conflict(format!(
                "collection `{}` has no usable sub-domain",
                new.name
            )));
        }

        let mut collections = self.collections.write().await;
        if collections.iter().any(|c| c.sub_domain == sub_domain) {
            return Err(StoreError::Conflict(format!(
                "sub-domain `{}` is already taken",
                sub_domain
            )));
        }

        let collection = Collection {
            id: Uuid::new_v4(),
            name: new.name,
            sub_domain,
            description: new.description,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        collections.push(collection.clone());
        Ok(collection)
    }

    async fn find_collection(&self, id: Uuid) -> Result<Option<Collection>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_sub_domain(&self, sub_domain: &str) -> Result<Option<Collection>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.iter().find(|c| c.sub_domain == sub_domain).cloned())
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn create(&self, new: NewDefinition) -> Result<Definition, StoreError> {
        if self.find_collection(new.collection_id).await?.is_none() {
            return Err(StoreError::NotFound("collection".to_string()));
        }

        let definition = new.into_definition(Uuid::new_v4(), Utc::now());
        self.definitions.write().await.push(definition.clone());
        Ok(definition)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Definition>, StoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions.iter().find(|d| d.id == id).cloned())
    }

    async fn find_exact(
        &self,
        collection_id: Uuid,
        method: HttpMethod,
        path_pattern: &str,
    ) -> Result<Option<Definition>, StoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .iter()
            .find(|d| {
                d.collection_id == collection_id
                    && d.method == method
                    && d.path_pattern == path_pattern
            })
            .cloned())
    }

    async fn stream_by(
        &self,
        collection_id: Uuid,
        method: HttpMethod,
    ) -> Result<DefinitionCursor, StoreError> {
        let snapshot: Vec<Definition> = self
            .definitions
            .read()
            .await
            .iter()
            .filter(|d| d.collection_id == collection_id && d.method == method)
            .cloned()
            .collect();

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let open = Arc::clone(&self.open_cursors);
        debug!(candidates = snapshot.len(), %method, "Opened definition cursor");

        Ok(DefinitionCursor::new(
            stream::iter(snapshot.into_iter().map(Ok)).boxed(),
            move || {
                open.fetch_sub(1, Ordering::SeqCst);
            },
        ))
    }

    async fn list_by_collection(&self, collection_id: Uuid) -> Result<Vec<Definition>, StoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .iter()
            .filter(|d| d.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, changes: NewDefinition) -> Result<Definition, StoreError> {
        let mut definitions = self.definitions.write().await;
        let existing = definitions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound("definition".to_string()))?;

        existing.name = changes.name;
        existing.description = changes.description;
        existing.method = changes.method;
        existing.path_pattern = changes.path_pattern;
        existing.request = changes.request;
        existing.response = changes.response;
        Ok(existing.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut definitions = self.definitions.write().await;
        let before = definitions.len();
        definitions.retain(|d| d.id != id);
        Ok(definitions.len() != before)
    }
}
