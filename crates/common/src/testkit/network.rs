use std::sync::Arc;

use anyhow::Result;

use super::fakes::{FakeClock, RecordingSwarmDirectory};
use crate::directory::MemoryNodePool;
use crate::node::Node;
use crate::onion::{OnionRequester, OnionTransport, RequestConfig};
use crate::path::Path;
use crate::path_manager::{PathManager, PathManagerConfig};
use crate::policy::FailurePolicy;
use crate::store::MemoryPathStore;

/// Every component wired together over in-memory stores
///
/// The store, pool, swarm directory and clock handles share state with the
///  instances the path manager and policy were given, so tests can seed and
///  inspect them directly.
pub struct TestNetwork {
    pub pool: MemoryNodePool,
    pub swarms: RecordingSwarmDirectory,
    pub store: MemoryPathStore,
    pub clock: Arc<FakeClock>,
    pub paths: PathManager,
    pub policy: FailurePolicy,
}

impl TestNetwork {
    pub fn builder() -> TestNetworkBuilder {
        TestNetworkBuilder::default()
    }

    /// A request loop over this network's paths and policy
    pub fn requester(
        &self,
        transport: Arc<dyn OnionTransport>,
        config: RequestConfig,
    ) -> OnionRequester {
        OnionRequester::new(self.paths.clone(), self.policy.clone(), transport, config)
    }
}

#[derive(Debug, Default)]
pub struct TestNetworkBuilder {
    pool: Vec<Node>,
    persisted: Vec<Path>,
    config: Option<PathManagerConfig>,
    resync_succeeds: Option<bool>,
}

impl TestNetworkBuilder {
    /// Nodes in the node pool
    pub fn pool(mut self, nodes: Vec<Node>) -> Self {
        self.pool = nodes;
        self
    }

    /// Paths already in the store when the path manager loads
    pub fn persisted(mut self, paths: Vec<Path>) -> Self {
        self.persisted = paths;
        self
    }

    pub fn config(mut self, config: PathManagerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Outcome of clock resyncs, successful unless set
    pub fn resync_succeeds(mut self, succeeds: bool) -> Self {
        self.resync_succeeds = Some(succeeds);
        self
    }

    pub async fn build(self) -> Result<TestNetwork> {
        let pool = MemoryNodePool::with_nodes(self.pool);
        let swarms = RecordingSwarmDirectory::new();
        let store = MemoryPathStore::with_paths(self.persisted);
        let clock = Arc::new(FakeClock::new(self.resync_succeeds.unwrap_or(true)));

        let paths = PathManager::load(
            self.config.unwrap_or_default(),
            Arc::new(store.clone()),
            Arc::new(pool.clone()),
            Arc::new(swarms.clone()),
        )
        .await?;

        let policy = FailurePolicy::new(
            paths.clone(),
            Arc::new(pool.clone()),
            Arc::new(swarms.clone()),
            clock.clone(),
        );

        tracing::debug!(
            "test network ready: {} pool nodes, {} paths",
            pool.len(),
            paths.paths().len()
        );

        Ok(TestNetwork {
            pool,
            swarms,
            store,
            clock,
            paths,
            policy,
        })
    }
}
