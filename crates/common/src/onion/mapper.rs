//! Translation of raw hop failures into [`OnionError`]
//!
//! Relays report which hop failed by embedding its public key inside free
//! text error bodies. All knowledge of those texts lives here; everything
//! downstream sees structured errors only.

use crate::node::Node;
use crate::path::{Destination, Path};

use super::error::{ErrorStatus, OnionError};

pub const NEXT_NODE_NOT_FOUND: &str = "Next node not found: ";
pub const NEXT_NODE_UNREACHABLE: &str = "Next node is currently unreachable: ";
pub const SNODE_NOT_READY: &str = "Snode not ready";
pub const SNODE_NOT_READY_PREFIX: &str = "Snode not ready: ";
pub const SERVICE_NODE_NOT_READY: &str = "Service node is not ready";
pub const SERVER_BUSY: &str = "Server busy";
pub const REQUEST_TIMEOUT: &str = "Request time out";
pub const INVALID_RESPONSE_FROM_SNODE: &str = "Invalid response from snode";
pub const UNPARSABLE_DATA: &str = "oxend returned unparsable data";

/// Key embedded after `prefix`, trimmed of surrounding whitespace
fn embedded_key<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let start = text.find(prefix)? + prefix.len();
    let key = text[start..].trim();
    // keys are a single hex token; anything after whitespace is not part of it
    let key = key.split_whitespace().next().unwrap_or("");
    (!key.is_empty()).then_some(key)
}

/// Classify an HTTP-shaped failure reported by `reporting_hop`
///
/// Total over every status / body combination and never panics: anything
///  unrecognised becomes [`OnionError::PathError`].
pub fn map_path_http_error(
    reporting_hop: &Node,
    status: ErrorStatus,
    path: &Path,
    destination: &Destination,
) -> OnionError {
    let destination = destination.clone();
    let text = status.text().into_owned();

    tracing::debug!(
        "mapping {} reported by {} on path {}",
        status,
        reporting_hop,
        path
    );

    match status.code {
        502 => {
            if let Some(key) = embedded_key(&text, NEXT_NODE_NOT_FOUND) {
                let is_destination = destination
                    .snode()
                    .map(|n| n.public_key().to_hex().eq_ignore_ascii_case(key))
                    .unwrap_or(false);
                if is_destination {
                    return OnionError::DestinationUnreachable {
                        status,
                        destination,
                    };
                }
                return OnionError::IntermediateNodeUnreachable {
                    failed_public_key: key.to_string(),
                    status,
                    destination,
                };
            }
            if let Some(key) = embedded_key(&text, NEXT_NODE_UNREACHABLE) {
                return OnionError::IntermediateNodeUnreachable {
                    failed_public_key: key.to_string(),
                    status,
                    destination,
                };
            }
            OnionError::PathError {
                status,
                destination,
            }
        }
        503 => {
            if let Some(key) = embedded_key(&text, SNODE_NOT_READY_PREFIX) {
                return OnionError::SnodeNotReady {
                    failed_public_key: key.to_string(),
                    status,
                    destination,
                };
            }
            if text.contains(SERVICE_NODE_NOT_READY) || text.contains(SERVER_BUSY) {
                return OnionError::SnodeNotReady {
                    failed_public_key: reporting_hop.public_key().to_hex(),
                    status,
                    destination,
                };
            }
            OnionError::PathError {
                status,
                destination,
            }
        }
        504 if text.contains(REQUEST_TIMEOUT) => OnionError::PathTimedOut {
            status,
            destination,
        },
        500 if text.contains(INVALID_RESPONSE_FROM_SNODE) => OnionError::InvalidHopResponse {
            status,
            destination,
        },
        _ => OnionError::PathError {
            status,
            destination,
        },
    }
}
