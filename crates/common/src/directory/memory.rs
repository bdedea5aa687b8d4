use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::{DirectoryError, NodePool, SwarmDirectory};
use crate::crypto::PublicKey;
use crate::node::Node;

/// In-memory node pool
#[derive(Debug, Clone, Default)]
pub struct MemoryNodePool {
    inner: Arc<RwLock<HashMap<PublicKey, Node>>>,
}

impl MemoryNodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let pool = Self::new();
        pool.replace(nodes);
        pool
    }

    /// Replace the pool contents, as a directory refresh would
    pub fn replace(&self, nodes: impl IntoIterator<Item = Node>) {
        let mut inner = self.inner.write();
        inner.clear();
        inner.extend(nodes.into_iter().map(|n| (*n.public_key(), n)));
    }

    pub fn insert(&self, node: Node) {
        self.inner.write().insert(*node.public_key(), node);
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.inner.read().contains_key(public_key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl NodePool for MemoryNodePool {
    async fn get_snode_pool(&self) -> Result<HashSet<Node>, DirectoryError> {
        Ok(self.inner.read().values().cloned().collect())
    }

    async fn drop_snode_from_pool(&self, public_key: &PublicKey) -> Result<(), DirectoryError> {
        if self.inner.write().remove(public_key).is_some() {
            tracing::debug!("dropped {:?} from the node pool", public_key);
        }
        Ok(())
    }

    async fn get_snode_by_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<Node>, DirectoryError> {
        Ok(self.inner.read().get(public_key).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct SwarmResponse {
    #[serde(default)]
    snodes: Vec<SwarmResponseEntry>,
}

/// Entries that fail to parse are skipped rather than failing the body
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SwarmResponseEntry {
    Node(Node),
    Unknown(serde_json::Value),
}

/// Parse the membership list carried by a "not in swarm" response
///
/// Returns an empty set for bodies that are not JSON or carry no usable
///  entries.
pub fn parse_swarm_response(body: &[u8]) -> HashSet<Node> {
    match serde_json::from_slice::<SwarmResponse>(body) {
        Ok(response) => response
            .snodes
            .into_iter()
            .filter_map(|entry| match entry {
                SwarmResponseEntry::Node(node) => Some(node),
                SwarmResponseEntry::Unknown(value) => {
                    tracing::debug!("skipping unparseable swarm entry: {}", value);
                    None
                }
            })
            .collect(),
        Err(e) => {
            tracing::debug!("swarm response body is not a membership list: {}", e);
            HashSet::new()
        }
    }
}

/// In-memory swarm directory: swarm public key -> member nodes
#[derive(Debug, Clone, Default)]
pub struct MemorySwarmDirectory {
    inner: Arc<RwLock<HashMap<String, HashSet<Node>>>>,
}

impl MemorySwarmDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_swarm(&self, swarm_public_key: impl Into<String>, nodes: impl IntoIterator<Item = Node>) {
        self.inner
            .write()
            .insert(swarm_public_key.into(), nodes.into_iter().collect());
    }

    pub fn swarm(&self, swarm_public_key: &str) -> HashSet<Node> {
        self.inner
            .read()
            .get(swarm_public_key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SwarmDirectory for MemorySwarmDirectory {
    async fn get_swarm(&self, swarm_public_key: &str) -> Result<HashSet<Node>, DirectoryError> {
        Ok(self.swarm(swarm_public_key))
    }

    async fn update_swarm_from_response(
        &self,
        swarm_public_key: &str,
        body: &[u8],
    ) -> Result<bool, DirectoryError> {
        let members = parse_swarm_response(body);
        if members.is_empty() {
            return Ok(false);
        }

        let mut inner = self.inner.write();
        let current = inner.entry(swarm_public_key.to_string()).or_default();
        if *current == members {
            return Ok(false);
        }

        tracing::info!(
            "updating swarm {} from response: {} -> {} members",
            swarm_public_key,
            current.len(),
            members.len()
        );
        *current = members;
        Ok(true)
    }

    async fn drop_snode_from_swarm_if_needed(
        &self,
        node: &Node,
        swarm_public_key: &str,
    ) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write();
        if let Some(members) = inner.get_mut(swarm_public_key) {
            if members.remove(node) {
                tracing::debug!("dropped {} from swarm {}", node, swarm_public_key);
            }
        }
        Ok(())
    }
}
