use crate::node::Node;
use crate::onion::OnionError;
use crate::path::{Destination, Path};

/// What the policy knows about one logical request
///
/// Created fresh per request and threaded through its retries; never shared
///  between requests.
#[derive(Debug, Clone)]
pub struct FailureContext {
    /// The path the failed attempt used
    pub path: Option<Path>,
    pub destination: Destination,
    /// The error the previous attempt of this request hit
    pub previous_error: Option<OnionError>,
    /// Account whose swarm the destination was chosen from
    pub swarm_public_key: Option<String>,
    /// Node the request was aimed at, when it is not the destination itself
    pub target_node: Option<Node>,
}

impl FailureContext {
    pub fn new(destination: Destination) -> Self {
        Self {
            path: None,
            destination,
            previous_error: None,
            swarm_public_key: None,
            target_node: None,
        }
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_swarm_public_key(mut self, swarm_public_key: impl Into<String>) -> Self {
        self.swarm_public_key = Some(swarm_public_key.into());
        self
    }

    pub fn with_target_node(mut self, node: Node) -> Self {
        self.target_node = Some(node);
        self
    }

    pub fn with_previous_error(mut self, error: OnionError) -> Self {
        self.previous_error = Some(error);
        self
    }

    /// The node a destination-side failure is blamed on
    pub fn target(&self) -> Option<&Node> {
        self.target_node.as_ref().or_else(|| self.destination.snode())
    }

    /// Move on to the next attempt: remember `error`, forget the old path
    pub fn advance(&mut self, error: OnionError) {
        self.previous_error = Some(error);
        self.path = None;
    }
}
