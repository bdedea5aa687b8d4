//! Network-synchronised time
//!
//! Storage nodes reject requests whose timestamp drifts too far from their
//! own clock. `NetworkClock` keeps an offset between local time and a
//! trusted network source and can re-derive it on demand.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("time source error: {0}")]
    Source(#[from] anyhow::Error),
    #[error("time source returned an unusable timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// A trusted source of network time
#[async_trait]
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    async fn network_time(&self) -> Result<DateTime<Utc>, ClockError>;
}

#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Local time corrected by the last known network offset
    fn current_time(&self) -> DateTime<Utc>;

    /// Re-derive the network offset
    ///
    /// # Returns
    /// * `true` - the offset was refreshed from the source
    /// * `false` - the source could not be reached or returned garbage;
    ///   the previous offset is kept
    async fn resync_clock(&self) -> bool;
}

/// Clock backed by a [`TimeSource`]
#[derive(Debug, Clone)]
pub struct NetworkClock {
    source: Arc<dyn TimeSource>,
    offset_ms: Arc<AtomicI64>,
}

impl NetworkClock {
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            source,
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Milliseconds the network is ahead of the local clock
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Network time as unix milliseconds, the form request signatures use
    pub fn current_timestamp_ms(&self) -> i64 {
        self.current_time().timestamp_millis()
    }
}

#[async_trait]
impl Clock for NetworkClock {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(self.offset_ms())
    }

    async fn resync_clock(&self) -> bool {
        let before = Utc::now();
        let network = match self.source.network_time().await {
            Ok(time) => time,
            Err(e) => {
                tracing::warn!("clock resync failed: {}", e);
                return false;
            }
        };
        let after = Utc::now();

        // assume the source sampled its clock half way through the round trip
        let local = before + (after - before) / 2;
        let offset = (network - local).num_milliseconds();
        self.offset_ms.store(offset, Ordering::Relaxed);

        tracing::info!("clock resynced, network offset {} ms", offset);
        true
    }
}

/// Parse a unix-milliseconds timestamp into a time value
pub fn timestamp_from_ms(ms: i64) -> Result<DateTime<Utc>, ClockError> {
    if ms <= 0 {
        return Err(ClockError::InvalidTimestamp(ms));
    }
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or(ClockError::InvalidTimestamp(ms))
}
