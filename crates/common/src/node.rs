use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::crypto::{PublicKey, X25519PublicKey};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid node version: {0}")]
pub struct NodeVersionError(String);

/// Protocol version a service node advertises, e.g. `2.8.0`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    SerializeDisplay,
    DeserializeFromStr,
)]
pub struct NodeVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl NodeVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for NodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for NodeVersion {
    type Err = NodeVersionError;

    /// Missing trailing components default to zero, so `"2.8"` parses
    ///  as `2.8.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u16; 3];
        let mut count = 0;
        for part in s.trim().split('.') {
            if count == parts.len() {
                return Err(NodeVersionError(s.to_string()));
            }
            parts[count] = part
                .parse()
                .map_err(|_| NodeVersionError(s.to_string()))?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

/// A relay / storage service node
///
/// Nodes are immutable values produced by directory refreshes. Health is
///  never stored here: strike counts and pool or swarm membership live in
///  the components that own them.
///
/// Two nodes are equal when their Ed25519 keys are equal, whatever their
///  advertised address or version.
#[derive(Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "pubkey_ed25519")]
    ed25519: PublicKey,
    #[serde(rename = "pubkey_x25519")]
    x25519: X25519PublicKey,
    #[serde(rename = "ip")]
    host: String,
    port: u16,
    #[serde(default)]
    version: NodeVersion,
}

impl Node {
    pub fn new(
        ed25519: PublicKey,
        x25519: X25519PublicKey,
        host: impl Into<String>,
        port: u16,
        version: NodeVersion,
    ) -> Self {
        Self {
            ed25519,
            x25519,
            host: host.into(),
            port,
            version,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.ed25519
    }

    pub fn x25519_key(&self) -> &X25519PublicKey {
        &self.x25519
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn version(&self) -> NodeVersion {
        self.version
    }

    /// `https://host:port`, the address the guard hop is dialled on
    pub fn address(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ed25519 == other.ed25519
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ed25519.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.ed25519.short())
            .field("address", &format_args!("{}:{}", self.host, self.port))
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.ed25519.short(), self.host, self.port)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn test_version_parse() {
        assert_eq!("2.8.1".parse::<NodeVersion>().unwrap(), NodeVersion::new(2, 8, 1));
        assert_eq!("2.8".parse::<NodeVersion>().unwrap(), NodeVersion::new(2, 8, 0));
        assert!("2.x".parse::<NodeVersion>().is_err());
        assert!("1.2.3.4".parse::<NodeVersion>().is_err());
    }

    #[test]
    fn test_equality_by_public_key() {
        let secret = SecretKey::generate();
        let a = Node::new(
            secret.public(),
            secret.x25519_public(),
            "10.0.0.1",
            22021,
            NodeVersion::new(2, 8, 0),
        );
        let b = Node::new(
            secret.public(),
            secret.x25519_public(),
            "10.0.0.2",
            443,
            NodeVersion::new(2, 9, 0),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_node_json_shape() {
        let secret = SecretKey::generate();
        let node = Node::new(
            secret.public(),
            secret.x25519_public(),
            "10.0.0.1",
            22021,
            NodeVersion::new(2, 8, 0),
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["ip"], "10.0.0.1");
        assert_eq!(value["port"], 22021);
        assert_eq!(value["pubkey_ed25519"], secret.public().to_hex());
        assert_eq!(value["version"], "2.8.0");
    }
}
