//! Onion paths and request destinations

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, X25519PublicKey};
use crate::node::Node;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("a path needs at least one node")]
    Empty,
    #[error("node {0:?} appears more than once in the path")]
    RepeatedNode(PublicKey),
    #[error("hop index {index} is out of range for a path of {len} nodes")]
    OutOfRange { index: usize, len: usize },
}

/// An ordered sequence of distinct nodes, guard hop first
///
/// Construction (including deserialization) rejects empty paths and paths
///  that visit the same node twice, so every `Path` in memory satisfies the
///  per-path distinctness invariant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Node>", into = "Vec<Node>")]
pub struct Path {
    nodes: Vec<Node>,
}

impl TryFrom<Vec<Node>> for Path {
    type Error = PathError;
    fn try_from(nodes: Vec<Node>) -> Result<Self, Self::Error> {
        Path::new(nodes)
    }
}

impl From<Path> for Vec<Node> {
    fn from(path: Path) -> Self {
        path.nodes
    }
}

impl Path {
    pub fn new(nodes: Vec<Node>) -> Result<Self, PathError> {
        if nodes.is_empty() {
            return Err(PathError::Empty);
        }
        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !seen.insert(*node.public_key()) {
                return Err(PathError::RepeatedNode(*node.public_key()));
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first hop, the only node the client connects to directly
    pub fn guard(&self) -> &Node {
        &self.nodes[0]
    }

    /// The hop that forwards to the destination
    pub fn last_hop(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: &PublicKey) -> Option<usize> {
        self.nodes.iter().position(|n| n.public_key() == key)
    }

    pub fn node(&self, key: &PublicKey) -> Option<&Node> {
        self.nodes.iter().find(|n| n.public_key() == key)
    }

    pub fn shares_node_with(&self, other: &Path) -> bool {
        self.nodes.iter().any(|n| other.contains(n.public_key()))
    }

    /// Copy of this path with the hop at `index` replaced by `node`
    pub fn with_replaced(&self, index: usize, node: Node) -> Result<Path, PathError> {
        if index >= self.nodes.len() {
            return Err(PathError::OutOfRange {
                index,
                len: self.nodes.len(),
            });
        }
        let mut nodes = self.nodes.clone();
        nodes[index] = node;
        Path::new(nodes)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.nodes.iter().map(|n| n.public_key())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| n.public_key().short()))
            .finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.nodes.iter().map(|n| n.public_key().short()).collect();
        write!(f, "[{}]", hops.join(" -> "))
    }
}

/// True when no node appears in more than one of `paths`
pub fn paths_are_disjoint(paths: &[Path]) -> bool {
    let mut seen = HashSet::new();
    paths
        .iter()
        .flat_map(|p| p.keys())
        .all(|key| seen.insert(*key))
}

/// Drop every path that shares a node with an earlier path
///
/// Earlier paths have priority: the result keeps the input order and is
///  node-disjoint.
pub fn sanitize_paths(paths: Vec<Path>) -> Vec<Path> {
    let mut used: HashSet<PublicKey> = HashSet::new();
    let mut kept = Vec::with_capacity(paths.len());
    for path in paths {
        if path.keys().any(|key| used.contains(key)) {
            tracing::debug!("discarding path {} overlapping a higher priority path", path);
            continue;
        }
        used.extend(path.keys().copied());
        kept.push(path);
    }
    kept
}

/// First path (in list order) that avoids `exclude`, falling back to the
///  first path when every path contains it.
pub fn select_path<'a>(paths: &'a [Path], exclude: Option<&PublicKey>) -> Option<&'a Path> {
    match exclude {
        Some(key) => paths
            .iter()
            .find(|p| !p.contains(key))
            .or_else(|| paths.first()),
        None => paths.first(),
    }
}

/// A server reached through the last hop of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDestination {
    pub host: String,
    pub scheme: String,
    pub port: u16,
    /// Application the last hop should hand the request to
    pub target: String,
    pub x25519_public_key: X25519PublicKey,
}

impl ServerDestination {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Where an onion request ends up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Snode(Node),
    Server(ServerDestination),
}

impl Destination {
    pub fn snode(&self) -> Option<&Node> {
        match self {
            Destination::Snode(node) => Some(node),
            Destination::Server(_) => None,
        }
    }

    pub fn is_snode(&self, key: &PublicKey) -> bool {
        self.snode().map(|n| n.public_key() == key).unwrap_or(false)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Snode(node) => write!(f, "snode {}", node),
            Destination::Server(server) => write!(f, "server {}", server.url()),
        }
    }
}
