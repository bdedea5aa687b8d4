//! Sending a request over an onion path with bounded retries

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::node::Node;
use crate::path::{Destination, Path};
use crate::path_manager::{PathManager, PathManagerError};
use crate::policy::{DecisionError, FailureContext, FailureDecision, FailurePolicy};

use super::error::{ErrorStatus, OnionError};
use super::mapper::map_path_http_error;

/// Status used when no HTTP exchange took place at all
pub const NO_RESPONSE: u16 = 0;

/// What the destination answered, once every layer is peeled off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionResponse {
    pub status: u16,
    pub body: Bytes,
}

impl OnionResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failure below the destination
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    /// The guard could not be connected to
    #[error("could not reach {hop}: {message}")]
    Unreachable { hop: Node, message: String },
    /// A hop answered with an HTTP error instead of forwarding
    #[error("{hop} answered {status}")]
    Http { hop: Node, status: ErrorStatus },
}

/// Performs one multi-hop encrypted exchange
#[async_trait]
pub trait OnionTransport: Send + Sync + std::fmt::Debug {
    async fn send(
        &self,
        path: &Path,
        destination: &Destination,
        payload: Bytes,
    ) -> Result<OnionResponse, TransportFailure>;
}

/// Caller-side retry ceiling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Attempts per logical request, the first one included
    pub max_attempts: u32,
    /// Pause between a `Retry` decision and the next attempt
    pub retry_delay_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

impl RequestConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no onion path available: {0}")]
    NoPath(#[from] PathManagerError),
    #[error("request failed: {0}")]
    Failed(#[from] DecisionError),
    #[error("gave up after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<OnionError> },
}

impl RequestError {
    /// The onion error behind this failure, if there was one
    pub fn onion_error(&self) -> Option<&OnionError> {
        match self {
            RequestError::NoPath(_) => None,
            RequestError::Failed(reason) => Some(reason.error()),
            RequestError::RetriesExhausted { last, .. } => Some(last),
        }
    }
}

/// Node the next attempt should route around
fn blamed_node(error: &OnionError, path: &Path) -> Option<Node> {
    let by_key = |key: &str| {
        path.nodes()
            .iter()
            .find(|n| n.public_key().to_hex().eq_ignore_ascii_case(key))
            .cloned()
    };
    match error {
        OnionError::GuardUnreachable { .. } | OnionError::PathTimedOut { .. } => {
            Some(path.guard().clone())
        }
        OnionError::IntermediateNodeUnreachable {
            failed_public_key, ..
        }
        | OnionError::SnodeNotReady {
            failed_public_key, ..
        } => by_key(failed_public_key),
        OnionError::DestinationUnreachable { .. } => Some(path.last_hop().clone()),
        OnionError::InvalidHopResponse { .. }
        | OnionError::DestinationError { .. }
        | OnionError::PathError { .. } => None,
    }
}

/// Sends requests through the path manager's paths, consulting the failure
///  policy after every failed attempt
#[derive(Debug, Clone)]
pub struct OnionRequester {
    paths: PathManager,
    policy: FailurePolicy,
    transport: Arc<dyn OnionTransport>,
    config: RequestConfig,
}

impl OnionRequester {
    pub fn new(
        paths: PathManager,
        policy: FailurePolicy,
        transport: Arc<dyn OnionTransport>,
        config: RequestConfig,
    ) -> Self {
        Self {
            paths,
            policy,
            transport,
            config,
        }
    }

    pub async fn send(
        &self,
        destination: Destination,
        payload: Bytes,
        swarm_public_key: Option<&str>,
    ) -> Result<Bytes, RequestError> {
        let mut ctx = FailureContext::new(destination);
        if let Some(key) = swarm_public_key {
            ctx = ctx.with_swarm_public_key(key);
        }
        self.send_with_context(ctx, payload).await
    }

    /// Run one logical request to completion
    ///
    /// `ctx` should be fresh; it accumulates the failures of this request
    ///  only.
    pub async fn send_with_context(
        &self,
        mut ctx: FailureContext,
        payload: Bytes,
    ) -> Result<Bytes, RequestError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut avoid: Option<Node> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let path = self.paths.get_path(avoid.as_ref()).await?;

            let error = match self
                .transport
                .send(&path, &ctx.destination, payload.clone())
                .await
            {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) => OnionError::DestinationError {
                    status: ErrorStatus::with_body(response.status, response.body),
                    destination: ctx.destination.clone(),
                    previous_error: ctx.previous_error.clone().map(Box::new),
                },
                Err(TransportFailure::Unreachable { hop, message }) => {
                    tracing::debug!("guard {} unreachable: {}", hop, message);
                    OnionError::GuardUnreachable {
                        status: ErrorStatus::new(NO_RESPONSE, message),
                        destination: ctx.destination.clone(),
                    }
                }
                Err(TransportFailure::Http { hop, status }) => {
                    map_path_http_error(&hop, status, &path, &ctx.destination)
                }
            };

            avoid = blamed_node(&error, &path);
            ctx.path = Some(path);

            match self.policy.on_failure(&error, &ctx).await {
                FailureDecision::Fail(reason) => {
                    tracing::warn!("onion request to {} failed: {}", ctx.destination, reason);
                    return Err(reason.into());
                }
                FailureDecision::Retry if attempt >= max_attempts => {
                    tracing::warn!(
                        "onion request to {} out of attempts ({})",
                        ctx.destination,
                        max_attempts
                    );
                    return Err(RequestError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                FailureDecision::Retry => {
                    tracing::debug!(
                        "retrying onion request to {} after {} (attempt {} of {})",
                        ctx.destination,
                        error.kind(),
                        attempt,
                        max_attempts
                    );
                    ctx.advance(error);
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
            }
        }
    }
}
