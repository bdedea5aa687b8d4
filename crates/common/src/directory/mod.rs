//! Node pool and swarm directory abstractions
//!
//! The pool is the known universe of service nodes; a swarm is the subset
//! of nodes holding one account's data. Both are refreshed from the network
//! by a subsystem outside this crate, so here they are plain key-value
//! stores behind traits that tests can swap out.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::crypto::PublicKey;
use crate::node::Node;

pub mod memory;

pub use memory::{parse_swarm_response, MemoryNodePool, MemorySwarmDirectory};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unhandled directory provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

/// The known universe of candidate relay / storage nodes
#[async_trait]
pub trait NodePool: Send + Sync + std::fmt::Debug {
    async fn get_snode_pool(&self) -> Result<HashSet<Node>, DirectoryError>;

    /// Remove a node from the pool. Removing an unknown key is not an error.
    async fn drop_snode_from_pool(&self, public_key: &PublicKey) -> Result<(), DirectoryError>;

    async fn get_snode_by_key(&self, public_key: &PublicKey)
        -> Result<Option<Node>, DirectoryError>;
}

/// Per-account swarm membership
#[async_trait]
pub trait SwarmDirectory: Send + Sync + std::fmt::Debug {
    async fn get_swarm(&self, swarm_public_key: &str) -> Result<HashSet<Node>, DirectoryError>;

    /// Absorb the membership carried in a "not in swarm" response body
    ///
    /// # Returns
    /// * `Ok(true)` - the body held membership that differs from what we knew
    /// * `Ok(false)` - the body was empty, malformed, or told us nothing new
    async fn update_swarm_from_response(
        &self,
        swarm_public_key: &str,
        body: &[u8],
    ) -> Result<bool, DirectoryError>;

    /// Remove `node` from the swarm if it is currently listed there
    async fn drop_snode_from_swarm_if_needed(
        &self,
        node: &Node,
        swarm_public_key: &str,
    ) -> Result<(), DirectoryError>;
}
