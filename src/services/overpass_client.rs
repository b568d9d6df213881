use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::models::place::{Category, Coordinate};
use crate::services::clock::Clock;

/// Failure taxonomy for the geodata upstream. Timeouts and transit drops are
/// worth another attempt; a bad status or a garbled payload will not improve
/// on retry.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Overpass request timed out")]
    Timeout,

    #[error("Overpass request failed in transit: {0}")]
    Transport(String),

    #[error("Overpass returned status {0}")]
    BadStatus(u16),

    #[error("Overpass payload could not be parsed: {0}")]
    MalformedPayload(String),

    #[error("Overpass unavailable after {0} attempts")]
    Unavailable(usize),
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Timeout | UpstreamError::Transport(_))
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

/// One element of the Overpass `elements` array. Nodes carry lat/lon directly,
/// ways carry a `center` sub-object instead.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct RawElement {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<RawElement>,
}

/// One wire attempt against the Overpass interpreter.
#[async_trait]
pub trait OverpassTransport: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Vec<RawElement>, UpstreamError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client, endpoint: String, timeout: Duration) -> Self {
        Self {
            http,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl OverpassTransport for HttpTransport {
    async fn execute(&self, query: &str) -> Result<Vec<RawElement>, UpstreamError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("data", query)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::BadStatus(status.as_u16()));
        }

        let payload = response.json::<OverpassResponse>().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::MalformedPayload(e.to_string())
            }
        })?;

        Ok(payload.elements)
    }
}

/// What the proximity cache needs from the upstream side: a bounded fetch of
/// raw elements around an origin.
#[async_trait]
pub trait PoiSource: Send + Sync {
    async fn fetch(
        &self,
        origin: Coordinate,
        radius: u32,
        max_raw: usize,
    ) -> Result<Vec<RawElement>, UpstreamError>;
}

pub struct OverpassClient {
    transport: Arc<dyn OverpassTransport>,
    clock: Arc<dyn Clock>,
    retry_limit: usize,
    backoff_base: Duration,
    query_timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(
        transport: Arc<dyn OverpassTransport>,
        clock: Arc<dyn Clock>,
        retry_limit: usize,
        backoff_base: Duration,
        query_timeout_secs: u64,
    ) -> Self {
        Self {
            transport,
            clock,
            retry_limit,
            backoff_base,
            query_timeout_secs,
        }
    }
}

#[async_trait]
impl PoiSource for OverpassClient {
    async fn fetch(
        &self,
        origin: Coordinate,
        radius: u32,
        max_raw: usize,
    ) -> Result<Vec<RawElement>, UpstreamError> {
        let query = build_query(origin, radius, max_raw, self.query_timeout_secs);
        let mut backoff = self.backoff_base;

        for attempt in 1..=self.retry_limit {
            match self.transport.execute(&query).await {
                Ok(elements) => return Ok(elements),
                Err(e) if e.is_transient() && attempt < self.retry_limit => {
                    warn!(
                        "Overpass attempt {} failed due to: {}, retrying in {:?}",
                        attempt, e, backoff
                    );
                    self.clock.sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) if e.is_transient() => {
                    warn!("Overpass attempt {} failed due to: {}, giving up", attempt, e);
                    return Err(UpstreamError::Unavailable(self.retry_limit));
                }
                Err(e) => return Err(e),
            }
        }

        Err(UpstreamError::Unavailable(self.retry_limit))
    }
}

/// Overpass QL union over the three amenities, nodes and ways, around the
/// origin. `out center` gives ways a usable coordinate and bounds the payload.
fn build_query(origin: Coordinate, radius: u32, max_raw: usize, timeout_secs: u64) -> String {
    let mut clauses = String::new();
    for category in Category::ALL {
        for kind in ["node", "way"] {
            clauses.push_str(&format!(
                "  {}[\"amenity\"=\"{}\"](around:{},{},{});\n",
                kind,
                category.as_amenity(),
                radius,
                origin.lat,
                origin.lon
            ));
        }
    }

    format!(
        "[out:json][timeout:{}];\n(\n{});\nout center {};",
        timeout_secs, clauses, max_raw
    )
}
