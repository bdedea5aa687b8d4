use std::fmt;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::SigningKey;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of X25519 public key in bytes
pub const X25519_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

fn decode_key_hex(hex: &str, what: &str) -> Result<[u8; PUBLIC_KEY_SIZE], KeyError> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut buff = [0; PUBLIC_KEY_SIZE];
    hex::decode_to_slice(hex, &mut buff)
        .map_err(|_| anyhow::anyhow!("{} hex decode error", what))?;
    Ok(buff)
}

/// Ed25519 public key identifying a service node
///
/// Relays report failing hops by embedding this key, hex encoded, inside
///  free-text error bodies, so the hex form is the canonical text form.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate();
/// let public_key = secret_key.public();
///
/// let hex = public_key.to_hex();
/// let recovered = PublicKey::from_hex(&hex)?;
/// ```
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl From<[u8; PUBLIC_KEY_SIZE]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        Ok(buff.into())
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings, and ignores
    ///  surrounding whitespace.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        decode_key_hex(hex, "public key").map(Self)
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether the key is a valid point on the Edwards curve
    pub fn is_valid(&self) -> bool {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Convert Ed25519 public key to X25519 (Montgomery curve)
    ///
    /// # Errors
    ///
    /// Returns an error if the Ed25519 point cannot be converted (invalid point).
    #[allow(clippy::wrong_self_convention)]
    pub fn to_x25519(&self) -> Result<X25519PublicKey, KeyError> {
        let edwards_point = CompressedEdwardsY::from_slice(&self.0)
            .map_err(|_| anyhow::anyhow!("public key invalid edwards point"))?
            .decompress()
            .ok_or_else(|| anyhow::anyhow!("public key failed to decompress edwards point"))?;

        Ok(X25519PublicKey(edwards_point.to_montgomery().to_bytes()))
    }

    /// Short form used in log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// X25519 public key a node uses for onion layer encryption
#[derive(Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct X25519PublicKey([u8; X25519_KEY_SIZE]);

impl From<[u8; X25519_KEY_SIZE]> for X25519PublicKey {
    fn from(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        X25519PublicKey(bytes)
    }
}

impl From<X25519PublicKey> for x25519_dalek::PublicKey {
    fn from(key: X25519PublicKey) -> Self {
        x25519_dalek::PublicKey::from(key.0)
    }
}

impl X25519PublicKey {
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        decode_key_hex(hex, "x25519 key").map(Self)
    }

    pub fn to_bytes(&self) -> [u8; X25519_KEY_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519PublicKey({})", hex::encode(&self.0[..4]))
    }
}

impl FromStr for X25519PublicKey {
    type Err = KeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Ed25519 secret key for a node identity
///
/// Clients never hold node secrets in production; this exists so fixtures
///  and local test networks can mint real node identities.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        decode_key_hex(hex, "private key").map(Self::from)
    }

    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Derive the X25519 public key matching this identity
    pub fn x25519_public(&self) -> X25519PublicKey {
        let secret = x25519_dalek::StaticSecret::from(self.0.to_scalar_bytes());
        X25519PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keypair_hex_round_trip() {
        let private_key = SecretKey::generate();
        let public_key = private_key.public();

        let recovered_private = SecretKey::from_hex(&private_key.to_hex()).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());

        let recovered_public = PublicKey::from_hex(&public_key.to_hex()).unwrap();
        assert_eq!(public_key, recovered_public);
        assert!(public_key.is_valid());
    }

    #[test]
    fn test_public_key_parse_tolerates_prefix_and_whitespace() {
        let public_key = SecretKey::generate().public();
        let padded = format!("  0x{}\n", public_key.to_hex());
        assert_eq!(PublicKey::from_hex(&padded).unwrap(), public_key);
    }

    #[test]
    fn test_public_key_rejects_bad_hex() {
        assert!(PublicKey::from_hex("not a key").is_err());
        assert!(PublicKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_x25519_derivations_agree() {
        let secret = SecretKey::generate();
        let from_secret = secret.x25519_public();
        let from_public = secret.public().to_x25519().unwrap();
        assert_eq!(from_secret, from_public);
    }

    #[test]
    fn test_public_key_serde_as_hex() {
        let public_key = SecretKey::generate().public();
        let json = serde_json::to_string(&public_key).unwrap();
        assert_eq!(json, format!("\"{}\"", public_key.to_hex()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, public_key);
    }
}
