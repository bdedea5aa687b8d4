//! Ownership of the onion path set
//!
//! The path manager is the single writer of the active paths. Readers take
//! the latest published snapshot without locking; every mutation runs under
//! one async mutex, re-checks the disjointness invariant, persists the new
//! set and only then publishes it.
//!
//! Mutations triggered by a failed request run in their own task, so a
//! caller that gives up on its request does not cancel the bookkeeping it
//! already started.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::{IndexedRandom, SliceRandom};
use serde::Deserialize;
use tokio::sync::{watch, Mutex};

use crate::crypto::PublicKey;
use crate::directory::{DirectoryError, NodePool, SwarmDirectory};
use crate::node::Node;
use crate::path::{paths_are_disjoint, sanitize_paths, select_path, Path, PathError};
use crate::store::{PathStore, StoreError};

mod strikes;

pub use strikes::StrikeLedger;

/// Tuning for path construction and node eviction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathManagerConfig {
    /// Number of disjoint paths to keep ready
    pub path_count: usize,
    /// Hops per path, guard included
    pub path_size: usize,
    /// Soft strikes after which a node is evicted as if force-removed
    pub node_strike_threshold: u32,
    /// Timeouts after which a whole path is dropped
    pub path_strike_threshold: u32,
}

impl Default for PathManagerConfig {
    fn default() -> Self {
        Self {
            path_count: 2,
            path_size: 3,
            node_strike_threshold: 3,
            path_strike_threshold: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PathManagerError {
    #[error("path store error: {0}")]
    Store(#[from] StoreError),
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("not enough nodes to build a path: need {needed}, have {available}")]
    InsufficientNodes { needed: usize, available: usize },
    #[error("path mutation task failed: {0}")]
    Task(String),
}

#[derive(Debug)]
struct Ledgers {
    nodes: StrikeLedger<PublicKey>,
    /// keyed by the guard of the struck path
    paths: StrikeLedger<PublicKey>,
}

#[derive(Debug)]
struct PathManagerInner {
    config: PathManagerConfig,
    store: Arc<dyn PathStore>,
    pool: Arc<dyn NodePool>,
    swarms: Arc<dyn SwarmDirectory>,
    snapshot: watch::Sender<Arc<Vec<Path>>>,
    writer: Mutex<Ledgers>,
    /// set when the pool could not fill the set; cleared by the next commit
    stalled: AtomicBool,
}

/// Shared handle to the active path set
#[derive(Debug, Clone)]
pub struct PathManager {
    inner: Arc<PathManagerInner>,
}

impl PathManager {
    /// Load persisted paths and sanitize them into a disjoint set
    ///
    /// A corrupt store is cleared and treated as empty; paths are then
    ///  built on demand.
    pub async fn load(
        config: PathManagerConfig,
        store: Arc<dyn PathStore>,
        pool: Arc<dyn NodePool>,
        swarms: Arc<dyn SwarmDirectory>,
    ) -> Result<Self, PathManagerError> {
        let persisted = match store.get_onion_request_paths().await {
            Ok(paths) => paths,
            Err(StoreError::Corrupt { position, reason }) => {
                tracing::warn!(
                    "discarding corrupt persisted paths (position {}): {}",
                    position,
                    reason
                );
                store.clear_onion_request_paths().await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let loaded = persisted.len();
        let paths = sanitize_paths(persisted);
        if paths.len() != loaded {
            tracing::info!(
                "dropped {} overlapping persisted paths, {} remain",
                loaded - paths.len(),
                paths.len()
            );
            store.set_onion_request_paths(&paths).await?;
        }

        let (snapshot, _) = watch::channel(Arc::new(paths));
        let ledgers = Ledgers {
            nodes: StrikeLedger::new(config.node_strike_threshold),
            paths: StrikeLedger::new(config.path_strike_threshold),
        };

        Ok(Self {
            inner: Arc::new(PathManagerInner {
                config,
                store,
                pool,
                swarms,
                snapshot,
                writer: Mutex::new(ledgers),
                stalled: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &PathManagerConfig {
        &self.inner.config
    }

    /// Latest committed path set
    pub fn paths(&self) -> Arc<Vec<Path>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Watch the path set; a new value is published after every commit
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Path>>> {
        self.inner.snapshot.subscribe()
    }

    /// A path not containing `exclude`, if one exists; otherwise any path
    ///
    /// Tops the set up from the node pool first when fewer than
    ///  `path_count` paths are held, unless the last attempt came up short
    ///  and nothing has been committed since. Selection itself is
    ///  deterministic: the first qualifying path in list order.
    pub async fn get_path(&self, exclude: Option<&Node>) -> Result<Path, PathManagerError> {
        let mut paths = self.paths();
        let short = paths.len() < self.inner.config.path_count;
        if short && (paths.is_empty() || !self.inner.stalled.load(Ordering::Acquire)) {
            match self.build_paths().await {
                Ok(built) => paths = built,
                Err(e) if !paths.is_empty() => {
                    tracing::debug!("could not top up paths, using {} held: {}", paths.len(), e);
                }
                Err(e) => return Err(e),
            }
        }

        select_path(&paths, exclude.map(|n| n.public_key()))
            .cloned()
            .ok_or(PathManagerError::InsufficientNodes {
                needed: self.inner.config.path_size,
                available: 0,
            })
    }

    /// Build paths from unused pool nodes until `path_count` are held
    ///
    /// Always consults the pool; call it after a pool refresh to top up a
    ///  set that `get_path` has stopped retrying.
    pub async fn build_paths(&self) -> Result<Arc<Vec<Path>>, PathManagerError> {
        let _ledgers = self.inner.writer.lock().await;
        let config = &self.inner.config;

        let current = self.paths();
        let missing = config.path_count.saturating_sub(current.len());
        if missing == 0 {
            return Ok(current);
        }

        let used: HashSet<PublicKey> = current.iter().flat_map(|p| p.keys()).copied().collect();
        let mut candidates: Vec<Node> = self
            .inner
            .pool
            .get_snode_pool()
            .await?
            .into_iter()
            .filter(|n| !used.contains(n.public_key()))
            .collect();
        candidates.shuffle(&mut rand::rng());

        let size = config.path_size.max(1);
        let mut paths = current.as_ref().clone();
        for hops in candidates.chunks_exact(size).take(missing) {
            paths.push(Path::new(hops.to_vec())?);
        }

        let built = paths.len() - current.len();
        let stalled = built < missing;
        if built == 0 {
            self.inner.stalled.store(stalled, Ordering::Release);
            if paths.is_empty() {
                return Err(PathManagerError::InsufficientNodes {
                    needed: size,
                    available: candidates.len(),
                });
            }
            return Ok(current);
        }

        tracing::info!("built {} new onion paths", built);
        let committed = self.commit(paths).await?;
        self.inner.stalled.store(stalled, Ordering::Release);
        Ok(committed)
    }

    /// Report a misbehaving node
    ///
    /// Without `force_remove` this records a strike; the node is evicted once
    ///  it reaches `node_strike_threshold`. On eviction the node is dropped
    ///  from the pool (and from the swarm, when `swarm_public_key` is given)
    ///  and the path holding it is repaired with an unused pool node, or
    ///  dropped when no replacement exists.
    pub async fn handle_bad_snode(
        &self,
        node: &Node,
        swarm_public_key: Option<&str>,
        force_remove: bool,
    ) -> Result<(), PathManagerError> {
        let this = self.clone();
        let node = node.clone();
        let swarm_public_key = swarm_public_key.map(str::to_owned);
        tokio::spawn(async move {
            this.apply_bad_snode(node, swarm_public_key, force_remove)
                .await
        })
        .await
        .map_err(|e| PathManagerError::Task(e.to_string()))?
    }

    /// Record a whole-path failure; drops the path at `path_strike_threshold`
    pub async fn handle_bad_path(&self, path: &Path) -> Result<(), PathManagerError> {
        let this = self.clone();
        let path = path.clone();
        tokio::spawn(async move { this.apply_bad_path(path).await })
            .await
            .map_err(|e| PathManagerError::Task(e.to_string()))?
    }

    pub async fn node_strikes(&self, key: &PublicKey) -> u32 {
        self.inner.writer.lock().await.nodes.count(key)
    }

    pub async fn path_strikes(&self, path: &Path) -> u32 {
        self.inner
            .writer
            .lock()
            .await
            .paths
            .count(path.guard().public_key())
    }

    async fn apply_bad_snode(
        &self,
        node: Node,
        swarm_public_key: Option<String>,
        force_remove: bool,
    ) -> Result<(), PathManagerError> {
        let mut ledgers = self.inner.writer.lock().await;
        let key = *node.public_key();

        if !force_remove {
            let promoted = ledgers.nodes.strike(key);
            tracing::debug!(
                "strike {} / {} against {}",
                ledgers.nodes.count(&key),
                ledgers.nodes.threshold(),
                node
            );
            if !promoted {
                return Ok(());
            }
        }
        ledgers.nodes.clear(&key);
        tracing::warn!("evicting {} from onion paths", node);

        // pool and swarm membership are independent of what happens to the path
        if let Err(e) = self.inner.pool.drop_snode_from_pool(&key).await {
            tracing::error!("failed to drop {} from the node pool: {}", node, e);
        }
        if let Some(swarm) = &swarm_public_key {
            if let Err(e) = self
                .inner
                .swarms
                .drop_snode_from_swarm_if_needed(&node, swarm)
                .await
            {
                tracing::error!("failed to drop {} from swarm {}: {}", node, swarm, e);
            }
        }

        let current = self.paths();
        let Some(index) = current.iter().position(|p| p.contains(&key)) else {
            return Ok(());
        };

        let mut paths = current.as_ref().clone();
        match self.repair(&paths, index, &key).await {
            Some(repaired) => {
                tracing::info!("repaired path {} -> {}", paths[index], repaired);
                paths[index] = repaired;
            }
            None => {
                let dropped = paths.remove(index);
                ledgers.paths.clear(dropped.guard().public_key());
                tracing::warn!(
                    "no replacement for {}, dropped path {} ({} paths left)",
                    node,
                    dropped,
                    paths.len()
                );
            }
        }

        self.commit(paths).await.map(|_| ())
    }

    /// Replacement for the hop `bad` in `paths[index]`, or None when the
    ///  pool has no node outside every held path
    async fn repair(&self, paths: &[Path], index: usize, bad: &PublicKey) -> Option<Path> {
        let slot = paths[index].position(bad)?;
        let used: HashSet<PublicKey> = paths.iter().flat_map(|p| p.keys()).copied().collect();

        let pool = match self.inner.pool.get_snode_pool().await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("node pool unavailable during repair: {}", e);
                return None;
            }
        };
        let candidates: Vec<Node> = pool
            .into_iter()
            .filter(|n| n.public_key() != bad && !used.contains(n.public_key()))
            .collect();
        let candidate = candidates.choose(&mut rand::rng())?.clone();

        let repaired = paths[index].with_replaced(slot, candidate).ok()?;
        let mut check = paths.to_vec();
        check[index] = repaired.clone();
        paths_are_disjoint(&check).then_some(repaired)
    }

    async fn apply_bad_path(&self, path: Path) -> Result<(), PathManagerError> {
        let mut ledgers = self.inner.writer.lock().await;
        let guard = *path.guard().public_key();

        let current = self.paths();
        let Some(index) = current.iter().position(|p| *p == path) else {
            tracing::debug!("ignoring failure of path {} which is no longer held", path);
            return Ok(());
        };

        if !ledgers.paths.strike(guard) {
            tracing::debug!(
                "strike {} / {} against path {}",
                ledgers.paths.count(&guard),
                ledgers.paths.threshold(),
                path
            );
            return Ok(());
        }
        ledgers.paths.clear(&guard);

        let mut paths = current.as_ref().clone();
        paths.remove(index);
        tracing::warn!("dropped failing path {} ({} paths left)", path, paths.len());
        self.commit(paths).await.map(|_| ())
    }

    /// Publish and persist a new path set. Callers hold the writer lock.
    async fn commit(&self, paths: Vec<Path>) -> Result<Arc<Vec<Path>>, PathManagerError> {
        if !paths_are_disjoint(&paths) {
            tracing::error!("refusing to commit overlapping paths");
            return Ok(self.paths());
        }

        self.inner.store.set_onion_request_paths(&paths).await?;
        let paths = Arc::new(paths);
        self.inner.snapshot.send_replace(paths.clone());
        self.inner.stalled.store(false, Ordering::Release);
        Ok(paths)
    }
}
