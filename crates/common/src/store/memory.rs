use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PathStore, StoreError};
use crate::path::Path;

/// In-memory path store
///
/// Counts writes so tests can assert that mutations were persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryPathStore {
    inner: Arc<Mutex<MemoryPathStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryPathStoreInner {
    paths: Vec<Path>,
    writes: usize,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without counting a write
    pub fn with_paths(paths: Vec<Path>) -> Self {
        let store = Self::new();
        store.inner.lock().paths = paths;
        store
    }

    pub fn paths(&self) -> Vec<Path> {
        self.inner.lock().paths.clone()
    }

    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }
}

#[async_trait]
impl PathStore for MemoryPathStore {
    async fn get_onion_request_paths(&self) -> Result<Vec<Path>, StoreError> {
        Ok(self.inner.lock().paths.clone())
    }

    async fn set_onion_request_paths(&self, paths: &[Path]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.paths = paths.to_vec();
        inner.writes += 1;
        Ok(())
    }

    async fn clear_onion_request_paths(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.paths.clear();
        inner.writes += 1;
        Ok(())
    }
}
