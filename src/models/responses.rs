//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{CacheDiagnostics, CacheStats, KindSummary};

/// Response body for GET /get/:key and GET /peek/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored document body
    pub value: String,
    pub pinned: bool,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>, pinned: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            pinned,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Capacity units the document occupies
    pub weight: usize,
    /// How far the owning shard is over its limit after the insert
    pub overflow: usize,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>, weight: usize, overflow: usize) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            weight,
            overflow,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /pin/:key and POST /unpin/:key
#[derive(Debug, Clone, Serialize)]
pub struct PinResponse {
    pub key: String,
    pub pinned: bool,
}

/// Response body for POST /shrink
#[derive(Debug, Clone, Serialize)]
pub struct ShrinkResponse {
    /// True when no shard is left overflowing
    pub settled: bool,
    pub overflow: usize,
}

/// Response body for POST /flush
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    /// Number of documents dropped
    pub flushed: usize,
}

/// Response body for PUT /limit
#[derive(Debug, Clone, Serialize)]
pub struct LimitResponse {
    pub space_limit: usize,
    pub overflow: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Number of evictions refused because the document was pinned
    pub vetoes: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub current_space: usize,
    pub space_limit: usize,
    pub overflow: usize,
    /// `(current_space + overflow)` as a percentage of `space_limit`
    pub filling_ratio: f64,
    /// Pinned and unpinned document counts and weights
    pub by_kind: BTreeMap<String, KindSummary>,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache counters and a diagnostics dump
    pub fn new(stats: &CacheStats, diagnostics: &CacheDiagnostics) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            vetoes: stats.vetoes,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            current_space: diagnostics.current_space,
            space_limit: diagnostics.space_limit,
            overflow: diagnostics.overflow,
            filling_ratio: diagnostics.filling_ratio,
            by_kind: diagnostics.by_kind.clone(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
