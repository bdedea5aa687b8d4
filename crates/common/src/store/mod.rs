//! Persistence for the onion path set
//!
//! The path manager re-persists the whole set after every mutation and
//! reloads it on startup, so a store only needs whole-set reads and writes.

use async_trait::async_trait;

use crate::path::Path;

pub mod memory;

pub use memory::MemoryPathStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unhandled path store provider error: {0}")]
    Provider(#[from] anyhow::Error),
    /// A persisted path could not be decoded
    #[error("corrupt persisted path at position {position}: {reason}")]
    Corrupt { position: usize, reason: String },
}

#[async_trait]
pub trait PathStore: Send + Sync + std::fmt::Debug {
    /// Load the persisted paths in priority order
    async fn get_onion_request_paths(&self) -> Result<Vec<Path>, StoreError>;

    /// Replace the persisted set with `paths`
    async fn set_onion_request_paths(&self, paths: &[Path]) -> Result<(), StoreError>;

    async fn clear_onion_request_paths(&self) -> Result<(), StoreError>;
}
