//! HTTP chunk source.
//!
//! POSTs the chunk polyline as JSON and expects `{"items": [...]}` back.
//! The endpoint is expected to do the actual upstream query (Overpass,
//! elevation API, geocoder) and normalise results into [`CachedItem`]s.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::ChunkSource;
use super::types::{CacheKind, CachedItem};
use crate::geo::Coordinate;
use crate::prefetch::RouteChunk;
use crate::service::{BoxFuture, ServiceError};

#[derive(Serialize)]
struct ChunkQuery<'a> {
    kind: CacheKind,
    chunk_index: usize,
    start_distance_m: f64,
    points: &'a [Coordinate],
}

#[derive(Deserialize)]
struct ChunkResponse {
    items: Vec<CachedItem>,
}

/// reqwest-backed chunk source for one cache kind.
pub struct HttpChunkSource {
    kind: CacheKind,
    endpoint: String,
    http: reqwest::Client,
}

impl HttpChunkSource {
    /// Create a source posting to `endpoint`.
    pub fn new(kind: CacheKind, endpoint: impl Into<String>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("inkroute/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::failed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            kind,
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChunkSource for HttpChunkSource {
    fn fetch<'a>(&'a self, chunk: &'a RouteChunk) -> BoxFuture<'a, Result<Vec<CachedItem>, ServiceError>> {
        Box::pin(async move {
            let query = ChunkQuery {
                kind: self.kind,
                chunk_index: chunk.index,
                start_distance_m: chunk.start_distance_m,
                points: &chunk.points,
            };

            let response = self
                .http
                .post(&self.endpoint)
                .json(&query)
                .send()
                .await
                .map_err(|e| ServiceError::failed(format!("{} request failed: {}", self.kind, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ServiceError::failed(format!(
                    "{} endpoint returned HTTP {}",
                    self.kind, status
                )));
            }

            let body: ChunkResponse = response
                .json()
                .await
                .map_err(|e| ServiceError::failed(format!("{} response invalid: {}", self.kind, e)))?;

            debug!(kind = %self.kind, chunk = chunk.index, items = body.items.len(), "Chunk response");
            Ok(body.items)
        })
    }
}
