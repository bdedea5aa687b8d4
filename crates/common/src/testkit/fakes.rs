use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::crypto::PublicKey;
use crate::directory::{DirectoryError, MemorySwarmDirectory, SwarmDirectory};
use crate::node::Node;
use crate::onion::{ErrorStatus, OnionResponse, OnionTransport, TransportFailure};
use crate::path::{Destination, Path};

/// Clock whose resync outcome is fixed by the test
#[derive(Debug)]
pub struct FakeClock {
    resync_succeeds: AtomicBool,
    resyncs: AtomicUsize,
}

impl FakeClock {
    pub fn new(resync_succeeds: bool) -> Self {
        Self {
            resync_succeeds: AtomicBool::new(resync_succeeds),
            resyncs: AtomicUsize::new(0),
        }
    }

    pub fn set_resync_succeeds(&self, succeeds: bool) {
        self.resync_succeeds.store(succeeds, Ordering::SeqCst);
    }

    /// Number of times `resync_clock` was called
    pub fn resyncs(&self) -> usize {
        self.resyncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn resync_clock(&self) -> bool {
        self.resyncs.fetch_add(1, Ordering::SeqCst);
        self.resync_succeeds.load(Ordering::SeqCst)
    }
}

/// Swarm directory that records every update and drop it is asked for
#[derive(Debug, Clone, Default)]
pub struct RecordingSwarmDirectory {
    inner: MemorySwarmDirectory,
    updates: Arc<Mutex<Vec<String>>>,
    drops: Arc<Mutex<Vec<(PublicKey, String)>>>,
}

impl RecordingSwarmDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &MemorySwarmDirectory {
        &self.inner
    }

    /// Swarm keys passed to `update_swarm_from_response`, in call order
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }

    /// (node, swarm) pairs passed to `drop_snode_from_swarm_if_needed`
    pub fn drops(&self) -> Vec<(PublicKey, String)> {
        self.drops.lock().clone()
    }
}

#[async_trait]
impl SwarmDirectory for RecordingSwarmDirectory {
    async fn get_swarm(&self, swarm_public_key: &str) -> Result<HashSet<Node>, DirectoryError> {
        self.inner.get_swarm(swarm_public_key).await
    }

    async fn update_swarm_from_response(
        &self,
        swarm_public_key: &str,
        body: &[u8],
    ) -> Result<bool, DirectoryError> {
        self.updates.lock().push(swarm_public_key.to_string());
        self.inner
            .update_swarm_from_response(swarm_public_key, body)
            .await
    }

    async fn drop_snode_from_swarm_if_needed(
        &self,
        node: &Node,
        swarm_public_key: &str,
    ) -> Result<(), DirectoryError> {
        self.drops
            .lock()
            .push((*node.public_key(), swarm_public_key.to_string()));
        self.inner
            .drop_snode_from_swarm_if_needed(node, swarm_public_key)
            .await
    }
}

/// One scripted transport result, resolved against the path actually used
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Respond(OnionResponse),
    GuardUnreachable,
    /// The hop at `hop_index` answers with `status`
    HopError { hop_index: usize, status: ErrorStatus },
}

impl ScriptedOutcome {
    pub fn ok(body: &'static [u8]) -> Self {
        ScriptedOutcome::Respond(OnionResponse::ok(Bytes::from_static(body)))
    }

    pub fn destination_status(status: u16, body: &'static [u8]) -> Self {
        ScriptedOutcome::Respond(OnionResponse {
            status,
            body: Bytes::from_static(body),
        })
    }

    pub fn hop_error(hop_index: usize, code: u16, body: impl Into<Bytes>) -> Self {
        ScriptedOutcome::HopError {
            hop_index,
            status: ErrorStatus::with_body(code, body),
        }
    }
}

/// Transport replaying a queue of outcomes; answers 200 once it runs dry
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    outcomes: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    sent: Arc<Mutex<Vec<Path>>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            sent: Arc::default(),
        }
    }

    /// Paths used so far, in send order
    pub fn sent(&self) -> Vec<Path> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl OnionTransport for ScriptedTransport {
    async fn send(
        &self,
        path: &Path,
        _destination: &Destination,
        _payload: Bytes,
    ) -> Result<OnionResponse, TransportFailure> {
        self.sent.lock().push(path.clone());
        let outcome = self.outcomes.lock().pop_front();
        match outcome {
            None => Ok(OnionResponse::ok(Bytes::new())),
            Some(ScriptedOutcome::Respond(response)) => Ok(response),
            Some(ScriptedOutcome::GuardUnreachable) => Err(TransportFailure::Unreachable {
                hop: path.guard().clone(),
                message: "connection refused".to_string(),
            }),
            Some(ScriptedOutcome::HopError { hop_index, status }) => {
                let hop = path.nodes()[hop_index.min(path.len() - 1)].clone();
                Err(TransportFailure::Http { hop, status })
            }
        }
    }
}
