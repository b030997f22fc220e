//! Document store contracts consumed by the engine.
//!
//! The engine only reads definitions; writes come from the compiler, the
//! endpoint generator and configuration seeding.

mod memory;

use crate::model::{Collection, Definition, HttpMethod, NewCollection, NewDefinition};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use uuid::Uuid;

pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Fails with `Conflict` when the sub-domain is taken.
    async fn create_collection(&self, new: NewCollection) -> Result<Collection, StoreError>;

    async fn find_collection(&self, id: Uuid) -> Result<Option<Collection>, StoreError>;

    async fn find_by_sub_domain(&self, sub_domain: &str) -> Result<Option<Collection>, StoreError>;
}

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn create(&self, new: NewDefinition) -> Result<Definition, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Definition>, StoreError>;

    /// Definition whose stored pattern is byte-for-byte `path_pattern`.
    async fn find_exact(
        &self,
        collection_id: Uuid,
        method: HttpMethod,
        path_pattern: &str,
    ) -> Result<Option<Definition>, StoreError>;

    /// Lazily stream definitions for one collection and method, oldest first.
    async fn stream_by(
        &self,
        collection_id: Uuid,
        method: HttpMethod,
    ) -> Result<DefinitionCursor, StoreError>;

    async fn list_by_collection(&self, collection_id: Uuid) -> Result<Vec<Definition>, StoreError>;

    /// Replace the mutable fields of a definition.
    async fn update(&self, id: Uuid, changes: NewDefinition) -> Result<Definition, StoreError>;

    /// Returns whether anything was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Open scan over stored definitions.
///
/// Holding a cursor holds store-side resources. They are released exactly
/// once, by [`DefinitionCursor::close`] or on drop, whichever comes first.
pub struct DefinitionCursor {
    inner: BoxStream<'static, Result<Definition, StoreError>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DefinitionCursor {
    pub fn new<F>(inner: BoxStream<'static, Result<Definition, StoreError>>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner,
            release: Some(Box::new(release)),
        }
    }

    pub async fn next(&mut self) -> Option<Result<Definition, StoreError>> {
        self.inner.next().await
    }

    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for DefinitionCursor {
    fn drop(&mut self) {
        self.release_now();
    }
}
