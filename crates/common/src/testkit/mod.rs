/// In-process fakes for exercising the path manager, failure policy and
/// request loop without a network
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{nodes, TestNetwork};
///
/// #[tokio::test]
/// async fn test_eviction() -> anyhow::Result<()> {
///     let pool = nodes(9);
///     let net = TestNetwork::builder()
///         .pool(pool.clone())
///         .persisted(vec![path_of(&pool[0..3]), path_of(&pool[3..6])])
///         .build()
///         .await?;
///
///     net.paths.handle_bad_snode(&pool[1], None, true).await?;
///     assert!(net.paths.paths().iter().all(|p| !p.contains(pool[1].public_key())));
///     Ok(())
/// }
/// ```
mod fakes;
mod network;

pub use fakes::{FakeClock, RecordingSwarmDirectory, ScriptedOutcome, ScriptedTransport};
pub use network::{TestNetwork, TestNetworkBuilder};

use crate::crypto::SecretKey;
use crate::node::{Node, NodeVersion};
use crate::path::Path;

/// `count` nodes with fresh identities and distinct addresses
pub fn nodes(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let secret = SecretKey::generate();
            Node::new(
                secret.public(),
                secret.x25519_public(),
                format!("10.0.{}.{}", i / 250, i % 250 + 1),
                22021,
                NodeVersion::new(2, 8, 0),
            )
        })
        .collect()
}

/// A path over `hops`
///
/// # Panics
/// When `hops` is empty or repeats a node.
pub fn path_of(hops: &[Node]) -> Path {
    Path::new(hops.to_vec()).expect("fixture path must be valid")
}

/// Body of a "not in swarm" response listing `members`
pub fn swarm_response_body(members: &[Node]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "snodes": members }))
        .expect("nodes always serialize")
}
