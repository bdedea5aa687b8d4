//! Node identity keys
//!
//! Every service node is identified by an Ed25519 public key and advertises
//! an X25519 key used to encrypt the onion layer addressed to it. Relays refer
//! to each other by the hex form of the Ed25519 key, including inside error
//! bodies, so both key types round trip through hex.

mod keys;

pub use keys::{KeyError, PublicKey, SecretKey, X25519PublicKey, PUBLIC_KEY_SIZE};
