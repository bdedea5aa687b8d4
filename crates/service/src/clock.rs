use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use common::clock::{timestamp_from_ms, ClockError, TimeSource};

#[derive(Debug, Deserialize)]
struct TimeResponse {
    timestamp: i64,
}

/// Network time fetched over HTTP
///
/// The endpoint answers `{"timestamp": <unix ms>}`.
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpTimeSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ClockError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClockError::Source(e.into()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn network_time(&self) -> Result<DateTime<Utc>, ClockError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ClockError::Source(e.into()))?;
        let body: TimeResponse = response
            .json()
            .await
            .map_err(|e| ClockError::Source(e.into()))?;
        tracing::debug!("network time from {}: {}", self.url, body.timestamp);
        timestamp_from_ms(body.timestamp)
    }
}

/// Time source used when none is configured; every resync fails
#[derive(Debug, Clone, Default)]
pub struct NoTimeSource;

#[async_trait]
impl TimeSource for NoTimeSource {
    async fn network_time(&self) -> Result<DateTime<Utc>, ClockError> {
        Err(ClockError::Source(anyhow::anyhow!(
            "no time source configured"
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_no_time_source_fails() {
        assert!(NoTimeSource.network_time().await.is_err());
    }

    #[test]
    fn test_time_response_shape() {
        let body: TimeResponse = serde_json::from_str(r#"{"timestamp": 1700000000123}"#).unwrap();
        assert_eq!(body.timestamp, 1_700_000_000_123);
    }
}
