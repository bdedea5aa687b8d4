//! Onion request failures and the request loop
//!
//! - [`error`]: the closed set of structured failures
//! - [`mapper`]: raw hop failure -> structured failure
//! - [`request`]: send over a path, consult the policy, retry within bounds

pub mod error;
pub mod mapper;
pub mod request;

pub use error::{ErrorStatus, OnionError};
pub use mapper::map_path_http_error;
pub use request::{
    OnionRequester, OnionResponse, OnionTransport, RequestConfig, RequestError, TransportFailure,
};
