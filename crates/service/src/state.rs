use std::sync::Arc;

use url::Url;

use common::clock::{ClockError, NetworkClock, TimeSource};
use common::directory::{MemoryNodePool, MemorySwarmDirectory};
use common::onion::{OnionRequester, OnionTransport};
use common::path_manager::{PathManager, PathManagerError};
use common::policy::FailurePolicy;

use super::clock::{HttpTimeSource, NoTimeSource};
use super::config::Config;
use super::database::{Database, DatabaseSetupError};

/// Main service state - every component wired together
#[derive(Debug, Clone)]
pub struct State {
    database: Database,
    pool: MemoryNodePool,
    swarms: MemorySwarmDirectory,
    clock: NetworkClock,
    paths: PathManager,
    requester: OnionRequester,
}

impl State {
    pub async fn from_config(
        config: &Config,
        transport: Arc<dyn OnionTransport>,
    ) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if !parent.exists() {
                        return Err(StateSetupError::DatabasePathDoesNotExist);
                    }
                }
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)
            }
            // otherwise just set up an in-memory database
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl),
        }?;
        tracing::info!("Database URL: {:?}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        // 2. Setup directories; populated by the caller's directory refresh
        let pool = MemoryNodePool::new();
        let swarms = MemorySwarmDirectory::new();

        // 3. Setup clock
        let source: Arc<dyn TimeSource> = match config.clock.time_source_url {
            Some(ref url) => Arc::new(HttpTimeSource::new(url.clone(), config.clock.timeout())?),
            None => {
                tracing::warn!("no time source configured, clock resyncs will fail");
                Arc::new(NoTimeSource)
            }
        };
        let clock = NetworkClock::new(source);

        // 4. Load paths from the database
        let paths = PathManager::load(
            config.paths.clone(),
            Arc::new(database.clone()),
            Arc::new(pool.clone()),
            Arc::new(swarms.clone()),
        )
        .await?;
        tracing::info!("loaded {} onion paths", paths.paths().len());

        // 5. Failure policy and request loop
        let policy = FailurePolicy::new(
            paths.clone(),
            Arc::new(pool.clone()),
            Arc::new(swarms.clone()),
            Arc::new(clock.clone()),
        );
        let requester = OnionRequester::new(
            paths.clone(),
            policy,
            transport,
            config.requests.clone(),
        );

        Ok(Self {
            database,
            pool,
            swarms,
            clock,
            paths,
            requester,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn pool(&self) -> &MemoryNodePool {
        &self.pool
    }

    pub fn swarms(&self) -> &MemorySwarmDirectory {
        &self.swarms
    }

    pub fn clock(&self) -> &NetworkClock {
        &self.clock
    }

    pub fn paths(&self) -> &PathManager {
        &self.paths
    }

    pub fn requester(&self) -> &OnionRequester {
        &self.requester
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        &self.database
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Clock setup error: {0}")]
    ClockSetupError(#[from] ClockError),
    #[error("Path manager error: {0}")]
    PathManagerError(#[from] PathManagerError),
}
