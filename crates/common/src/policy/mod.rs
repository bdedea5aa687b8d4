//! Failure remediation
//!
//! Given a structured [`OnionError`] and the context of the request that hit
//! it, decide whether the caller should retry, and apply the side effects
//! that make a retry worthwhile: clock resync, swarm membership updates,
//! node strikes and evictions, path drops.
//!
//! The policy never loops; bounding retries is the caller's job.

use std::sync::Arc;

use crate::clock::Clock;
use crate::crypto::PublicKey;
use crate::directory::{NodePool, SwarmDirectory};
use crate::node::Node;
use crate::onion::mapper::{
    SERVER_BUSY, SERVICE_NODE_NOT_READY, SNODE_NOT_READY, UNPARSABLE_DATA,
};
use crate::onion::OnionError;
use crate::path::{Destination, Path};
use crate::path_manager::PathManager;

mod context;

pub use context::FailureContext;

/// Clock skew reported by a storage node
pub const SNODE_CLOCK_OUT_OF_SYNC: u16 = 406;
/// Clock skew reported by a server destination
pub const SERVER_CLOCK_OUT_OF_SYNC: u16 = 425;
/// The destination does not belong to the swarm we addressed
pub const NOT_IN_SWARM: u16 = 421;
pub const BAD_GATEWAY: u16 = 502;
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Why a failure was surfaced instead of retried
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("clock resync failed: {0}")]
    ClockResyncFailed(#[source] OnionError),
    #[error("no node to blame for: {0}")]
    NoOffendingNode(#[source] OnionError),
    #[error("unrecoverable onion error: {0}")]
    Unrecoverable(#[source] OnionError),
}

impl DecisionError {
    /// The error that produced this decision
    pub fn error(&self) -> &OnionError {
        match self {
            DecisionError::ClockResyncFailed(e)
            | DecisionError::NoOffendingNode(e)
            | DecisionError::Unrecoverable(e) => e,
        }
    }
}

#[derive(Debug)]
pub enum FailureDecision {
    Retry,
    Fail(DecisionError),
}

impl FailureDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, FailureDecision::Retry)
    }
}

/// Status code a destination uses to report clock skew
pub fn clock_out_of_sync_code(destination: &Destination) -> u16 {
    match destination {
        Destination::Snode(_) => SNODE_CLOCK_OUT_OF_SYNC,
        Destination::Server(_) => SERVER_CLOCK_OUT_OF_SYNC,
    }
}

fn is_clock_out_of_sync(error: &OnionError) -> bool {
    matches!(
        error,
        OnionError::DestinationError { status, destination, .. }
            if status.code == clock_out_of_sync_code(destination)
    )
}

#[derive(Debug, Clone)]
pub struct FailurePolicy {
    paths: PathManager,
    pool: Arc<dyn NodePool>,
    swarms: Arc<dyn SwarmDirectory>,
    clock: Arc<dyn Clock>,
}

impl FailurePolicy {
    pub fn new(
        paths: PathManager,
        pool: Arc<dyn NodePool>,
        swarms: Arc<dyn SwarmDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            paths,
            pool,
            swarms,
            clock,
        }
    }

    /// Decide what to do about `error`, applying remediation side effects
    pub async fn on_failure(&self, error: &OnionError, ctx: &FailureContext) -> FailureDecision {
        tracing::debug!("deciding on {} ({})", error.kind(), error.status());

        match error {
            OnionError::DestinationError { .. } if is_clock_out_of_sync(error) => {
                self.on_clock_out_of_sync(error, ctx).await
            }
            OnionError::DestinationError { status, .. } if status.code == NOT_IN_SWARM => {
                self.on_not_in_swarm(error, ctx).await
            }
            OnionError::DestinationError { status, .. } | OnionError::PathError { status, .. }
                if status.code == BAD_GATEWAY && status.mentions(UNPARSABLE_DATA) =>
            {
                match ctx.target() {
                    Some(node) => {
                        self.evict(node, ctx, true).await;
                        FailureDecision::Retry
                    }
                    None => FailureDecision::Fail(DecisionError::NoOffendingNode(error.clone())),
                }
            }
            OnionError::DestinationError { status, .. }
                if status.code == SERVICE_UNAVAILABLE && mentions_not_ready(&status.text()) =>
            {
                if let Some(node) = ctx.target() {
                    self.evict(node, ctx, false).await;
                }
                FailureDecision::Retry
            }
            OnionError::SnodeNotReady {
                failed_public_key, ..
            } => {
                let node = match self.resolve(failed_public_key, ctx).await {
                    Some(node) => Some(node),
                    None => ctx.target().cloned(),
                };
                if let Some(node) = node {
                    self.evict(&node, ctx, false).await;
                }
                FailureDecision::Retry
            }
            OnionError::GuardUnreachable { .. } => {
                if let Some(path) = &ctx.path {
                    self.evict(path.guard(), ctx, true).await;
                }
                FailureDecision::Retry
            }
            OnionError::IntermediateNodeUnreachable {
                failed_public_key, ..
            } => {
                match self.resolve(failed_public_key, ctx).await {
                    Some(node) => self.evict(&node, ctx, true).await,
                    None => tracing::debug!("unreachable node {} is unknown", failed_public_key),
                }
                FailureDecision::Retry
            }
            OnionError::DestinationUnreachable { destination, .. } => {
                match (destination.snode(), &ctx.path) {
                    (Some(node), _) => self.evict(node, ctx, true).await,
                    // the server is down, not the hop; only strike the hop
                    (None, Some(path)) => self.evict(path.last_hop(), ctx, false).await,
                    (None, None) => {}
                }
                FailureDecision::Retry
            }
            OnionError::PathTimedOut { .. } => {
                if let Some(path) = &ctx.path {
                    self.penalize_path(path).await;
                }
                FailureDecision::Retry
            }
            OnionError::InvalidHopResponse { .. }
            | OnionError::DestinationError { .. }
            | OnionError::PathError { .. } => {
                FailureDecision::Fail(DecisionError::Unrecoverable(error.clone()))
            }
        }
    }

    async fn on_clock_out_of_sync(&self, error: &OnionError, ctx: &FailureContext) -> FailureDecision {
        let linked = match error {
            OnionError::DestinationError { previous_error, .. } => previous_error.as_deref(),
            _ => None,
        };
        let repeated = ctx
            .previous_error
            .as_ref()
            .or(linked)
            .map(is_clock_out_of_sync)
            .unwrap_or(false);

        if !repeated {
            if self.clock.resync_clock().await {
                return FailureDecision::Retry;
            }
            return FailureDecision::Fail(DecisionError::ClockResyncFailed(error.clone()));
        }

        // the clock was already resynced for this request; blame the node
        match ctx.target() {
            Some(node) => {
                tracing::warn!("{} still reports clock skew after resync", node);
                self.evict(node, ctx, true).await;
                FailureDecision::Retry
            }
            None => FailureDecision::Fail(DecisionError::NoOffendingNode(error.clone())),
        }
    }

    async fn on_not_in_swarm(&self, error: &OnionError, ctx: &FailureContext) -> FailureDecision {
        let Some(swarm) = ctx.swarm_public_key.as_deref() else {
            return FailureDecision::Retry;
        };

        let status = error.status();
        let body = match &status.body {
            Some(body) => body.clone(),
            None => bytes::Bytes::from(status.message.clone()),
        };

        let updated = match self.swarms.update_swarm_from_response(swarm, &body).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!("failed to update swarm {}: {}", swarm, e);
                false
            }
        };

        if !updated {
            if let Some(node) = ctx.target() {
                if let Err(e) = self.swarms.drop_snode_from_swarm_if_needed(node, swarm).await {
                    tracing::error!("failed to drop {} from swarm {}: {}", node, swarm, e);
                }
            }
        }
        FailureDecision::Retry
    }

    /// Find the node behind a key reported on the wire
    async fn resolve(&self, key: &str, ctx: &FailureContext) -> Option<Node> {
        let key = PublicKey::from_hex(key).ok()?;
        if let Some(node) = ctx.path.as_ref().and_then(|p| p.node(&key)) {
            return Some(node.clone());
        }
        if let Some(node) = ctx.target().filter(|n| *n.public_key() == key) {
            return Some(node.clone());
        }
        match self.pool.get_snode_by_key(&key).await {
            Ok(node) => node,
            Err(e) => {
                tracing::error!("node pool lookup failed: {}", e);
                None
            }
        }
    }

    async fn evict(&self, node: &Node, ctx: &FailureContext, force_remove: bool) {
        if let Err(e) = self
            .paths
            .handle_bad_snode(node, ctx.swarm_public_key.as_deref(), force_remove)
            .await
        {
            tracing::error!("failed to record bad snode {}: {}", node, e);
        }
    }

    async fn penalize_path(&self, path: &Path) {
        if let Err(e) = self.paths.handle_bad_path(path).await {
            tracing::error!("failed to record bad path {}: {}", path, e);
        }
    }
}

fn mentions_not_ready(text: &str) -> bool {
    text.contains(SNODE_NOT_READY)
        || text.contains(SERVICE_NODE_NOT_READY)
        || text.contains(SERVER_BUSY)
}
