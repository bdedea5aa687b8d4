//! Service wiring for onionpath.
//!
//! This crate provides the components a long running process needs around the
//! core path manager:
//! - Configuration (TOML file with paths, requests and clock sections)
//! - Logging (stdout plus optional rolling file)
//! - Database (SQLite with a PathStore implementation)
//! - Network time source over HTTP
//! - State (every component wired together)

pub mod clock;
pub mod config;
pub mod database;
pub mod logging;
pub mod state;

// Re-export key types for convenience
pub use clock::HttpTimeSource;
pub use config::{ClockConfig, Config, ConfigError};
pub use database::{Database, DatabaseSetupError};
pub use logging::init_logging;
pub use state::{State as ServiceState, StateSetupError};
