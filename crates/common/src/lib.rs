/**
 * Network-synchronised time and the resync
 *  used when destinations report clock skew.
 */
pub mod clock;
/**
 * Node identity keys.
 *  - Ed25519 public keys naming nodes on the wire
 *  - X25519 keys for onion layer encryption
 */
pub mod crypto;
/**
 * Node pool and per-account swarm membership,
 *  as injectable stores.
 */
pub mod directory;
pub mod node;
/**
 * Structured onion failures, the mapping from
 *  raw hop failures, and the bounded request loop.
 */
pub mod onion;
pub mod path;
/**
 * Owner of the active path set: selection,
 *  sanitization, strikes, repair and eviction.
 */
pub mod path_manager;
/**
 * Failure remediation: turns a structured error
 *  into retry / fail plus the side effects that
 *  make a retry worthwhile.
 */
pub mod policy;
/**
 * Persistence for the path set.
 */
pub mod store;
/**
 * Fixtures and fakes for exercising the
 *  components without a network.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::clock::{Clock, NetworkClock, TimeSource};
    pub use crate::crypto::{PublicKey, SecretKey, X25519PublicKey};
    pub use crate::directory::{NodePool, SwarmDirectory};
    pub use crate::node::{Node, NodeVersion};
    pub use crate::onion::{
        map_path_http_error, ErrorStatus, OnionError, OnionRequester, OnionTransport,
        RequestConfig,
    };
    pub use crate::path::{Destination, Path, ServerDestination};
    pub use crate::path_manager::{PathManager, PathManagerConfig};
    pub use crate::policy::{FailureContext, FailureDecision, FailurePolicy};
    pub use crate::store::PathStore;
}
