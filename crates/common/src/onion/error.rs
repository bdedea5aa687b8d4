use std::fmt;

use bytes::Bytes;

use crate::path::Destination;

/// Wire-level facts about a failed exchange
#[derive(Clone, PartialEq, Eq)]
pub struct ErrorStatus {
    pub code: u16,
    pub message: String,
    pub body: Option<Bytes>,
}

impl ErrorStatus {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(code: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            code,
            message: String::from_utf8_lossy(&body).into_owned(),
            body: Some(body),
        }
    }

    /// Message text, falling back to a lossy decode of the body
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        match (&self.body, self.message.is_empty()) {
            (Some(body), true) => String::from_utf8_lossy(body),
            _ => std::borrow::Cow::Borrowed(self.message.as_str()),
        }
    }

    /// Whether the message or body contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.text().contains(needle)
    }
}

impl fmt::Debug for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorStatus")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .finish()
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message.trim())
        }
    }
}

/// Structured onion request failure
///
/// Every variant carries the wire status and the destination it was bound
///  for. The set is closed: the failure policy matches on it exhaustively.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OnionError {
    /// The first hop could not be reached at all
    #[error("guard unreachable ({status}) for {destination}")]
    GuardUnreachable {
        status: ErrorStatus,
        destination: Destination,
    },
    /// A relay hop refused to forward to the named node
    #[error("intermediate node {failed_public_key} unreachable ({status}) for {destination}")]
    IntermediateNodeUnreachable {
        status: ErrorStatus,
        destination: Destination,
        failed_public_key: String,
    },
    /// The last hop could not reach the destination
    #[error("destination unreachable ({status}): {destination}")]
    DestinationUnreachable {
        status: ErrorStatus,
        destination: Destination,
    },
    /// A hop reported it is temporarily unavailable
    #[error("snode {failed_public_key} not ready ({status}) for {destination}")]
    SnodeNotReady {
        status: ErrorStatus,
        destination: Destination,
        failed_public_key: String,
    },
    #[error("path timed out ({status}) for {destination}")]
    PathTimedOut {
        status: ErrorStatus,
        destination: Destination,
    },
    #[error("invalid hop response ({status}) for {destination}")]
    InvalidHopResponse {
        status: ErrorStatus,
        destination: Destination,
    },
    /// The destination answered with an application-level error status
    ///
    /// `previous_error` links the failure of the attempt before this one;
    ///  the failure policy uses it to spot repeated clock skew when the
    ///  context it was given carries no history.
    #[error("destination error ({status}) from {destination}")]
    DestinationError {
        status: ErrorStatus,
        destination: Destination,
        previous_error: Option<Box<OnionError>>,
    },
    #[error("path error ({status}) for {destination}")]
    PathError {
        status: ErrorStatus,
        destination: Destination,
    },
}

impl OnionError {
    pub fn status(&self) -> &ErrorStatus {
        match self {
            OnionError::GuardUnreachable { status, .. }
            | OnionError::IntermediateNodeUnreachable { status, .. }
            | OnionError::DestinationUnreachable { status, .. }
            | OnionError::SnodeNotReady { status, .. }
            | OnionError::PathTimedOut { status, .. }
            | OnionError::InvalidHopResponse { status, .. }
            | OnionError::DestinationError { status, .. }
            | OnionError::PathError { status, .. } => status,
        }
    }

    pub fn destination(&self) -> &Destination {
        match self {
            OnionError::GuardUnreachable { destination, .. }
            | OnionError::IntermediateNodeUnreachable { destination, .. }
            | OnionError::DestinationUnreachable { destination, .. }
            | OnionError::SnodeNotReady { destination, .. }
            | OnionError::PathTimedOut { destination, .. }
            | OnionError::InvalidHopResponse { destination, .. }
            | OnionError::DestinationError { destination, .. }
            | OnionError::PathError { destination, .. } => destination,
        }
    }

    /// Variant name, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            OnionError::GuardUnreachable { .. } => "GuardUnreachable",
            OnionError::IntermediateNodeUnreachable { .. } => "IntermediateNodeUnreachable",
            OnionError::DestinationUnreachable { .. } => "DestinationUnreachable",
            OnionError::SnodeNotReady { .. } => "SnodeNotReady",
            OnionError::PathTimedOut { .. } => "PathTimedOut",
            OnionError::InvalidHopResponse { .. } => "InvalidHopResponse",
            OnionError::DestinationError { .. } => "DestinationError",
            OnionError::PathError { .. } => "PathError",
        }
    }
}
