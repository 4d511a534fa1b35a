//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info};

use crate::cache::{CacheView, Footprint, OverflowingLruCache, RemovalCause, ShardedCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, Document, FlushResponse, GetResponse, HealthResponse, LimitRequest,
    LimitResponse, PinResponse, SetRequest, SetResponse, ShrinkResponse, StatsResponse,
};

/// Cache of documents keyed by name.
pub type DocumentCache = ShardedCache<String, Document>;

/// Application state shared across all handlers.
///
/// The cache shards carry their own locks, so the state only needs an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe document cache
    pub cache: Arc<DocumentCache>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: DocumentCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Documents are weighed by footprint and pinned documents refuse eviction.
    pub fn from_config(config: &Config) -> Result<Self> {
        let load_factor = config.load_factor;
        let cache = ShardedCache::new(config.shard_count, config.space_limit, |limit| {
            OverflowingLruCache::with_close_fn(limit, close_unpinned)
                .weigh_by_footprint()
                .with_listener(log_removal)
                .with_load_factor(load_factor)
        })?;
        Ok(Self::new(cache))
    }
}

/// Close hook for documents: anything not pinned may be evicted.
fn close_unpinned(
    key: &String,
    view: &mut CacheView<'_, String, Document>,
) -> anyhow::Result<bool> {
    Ok(!view.peek(key).is_some_and(|doc| doc.pinned))
}

fn log_removal(key: &String, doc: &Document, cause: RemovalCause) {
    debug!(
        "Document '{}' left the cache ({:?}, {} bytes)",
        key,
        cause,
        doc.body.len()
    );
}

/// Handler for PUT /set
///
/// Stores a document, reporting its weight and the owning shard's overflow.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let doc = Document::new(req.value, req.pinned);
    let weight = doc.cache_footprint();
    let key = req.key;

    let overflow = state.cache.with_shard(key.as_str(), |shard| -> Result<usize> {
        shard.put(key.clone(), doc)?;
        Ok(shard.overflow())
    })?;

    if overflow > 0 {
        info!("Set '{}' left its shard overflowing by {}", key, overflow);
    }
    Ok(Json(SetResponse::new(key, weight, overflow)))
}

/// Handler for GET /get/:key
///
/// Retrieves a document and marks it most recently used.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let doc = state
        .cache
        .get(key.as_str())
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, doc.body, doc.pinned)))
}

/// Handler for GET /peek/:key
///
/// Retrieves a document without touching recency or hit counters.
pub async fn peek_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let doc = state
        .cache
        .peek(key.as_str())
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, doc.body, doc.pinned)))
}

/// Handler for DELETE /del/:key
///
/// Removes a document regardless of whether it is pinned.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state
        .cache
        .remove(key.as_str())
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /pin/:key
pub async fn pin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    set_pinned(&state, key, true)
}

/// Handler for POST /unpin/:key
///
/// The document becomes evictable again on the next put or shrink.
pub async fn unpin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    set_pinned(&state, key, false)
}

fn set_pinned(state: &AppState, key: String, pinned: bool) -> Result<Json<PinResponse>> {
    state
        .cache
        .update(key.as_str(), |doc| doc.pinned = pinned)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(PinResponse { key, pinned }))
}

/// Handler for POST /shrink
///
/// Retries paying back overflow in every shard.
pub async fn shrink_handler(State(state): State<AppState>) -> Result<Json<ShrinkResponse>> {
    let settled = state.cache.shrink()?;

    Ok(Json(ShrinkResponse {
        settled,
        overflow: state.cache.overflow(),
    }))
}

/// Handler for POST /flush
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let flushed = state.cache.flush();
    info!("Flushed {} documents", flushed);

    Json(FlushResponse { flushed })
}

/// Handler for PUT /limit
///
/// Changes the total space limit; lowering it evicts unpinned documents.
pub async fn limit_handler(
    State(state): State<AppState>,
    Json(req): Json<LimitRequest>,
) -> Result<Json<LimitResponse>> {
    state.cache.set_space_limit(req.space_limit)?;

    Ok(Json(LimitResponse {
        space_limit: state.cache.space_limit(),
        overflow: state.cache.overflow(),
    }))
}

/// Handler for GET /stats
///
/// Returns counters plus the space accounting of all shards.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    let diagnostics = state.cache.diagnostics_by(|_, doc| {
        let kind = if doc.pinned { "pinned" } else { "unpinned" };
        kind.to_string()
    });

    Json(StatsResponse::new(&stats, &diagnostics))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(space_limit: usize) -> AppState {
        let config = Config {
            space_limit,
            load_factor: 1.0,
            ..Config::default()
        };
        AppState::from_config(&config).unwrap()
    }

    fn set_req(key: &str, value: &str, pinned: bool) -> Json<SetRequest> {
        Json(SetRequest {
            key: key.to_string(),
            value: value.to_string(),
            pinned,
        })
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state(10);

        // Set a value
        let response = set_handler(State(state.clone()), set_req("test_key", "test_value", false))
            .await
            .unwrap();
        assert_eq!(response.weight, 1);
        assert_eq!(response.overflow, 0);

        // Get the value
        let result = get_handler(State(state.clone()), Path("test_key".to_string())).await;
        let response = result.unwrap();
        assert_eq!(response.value, "test_value");
        assert!(!response.pinned);
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state(10);

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state(10);
        set_handler(State(state.clone()), set_req("to_delete", "value", true))
            .await
            .unwrap();

        // Pinned documents can still be deleted explicitly
        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pinned_documents_overflow_instead_of_evicting() {
        let state = test_state(2);
        for key in ["a", "b"] {
            set_handler(State(state.clone()), set_req(key, "x", true))
                .await
                .unwrap();
        }

        let response = set_handler(State(state.clone()), set_req("c", "x", false))
            .await
            .unwrap();
        assert_eq!(response.overflow, 1);
        assert!(state.cache.contains_key("a"));
        assert!(state.cache.contains_key("b"));

        // unpinning lets the next shrink pay the overflow back
        unpin_handler(State(state.clone()), Path("a".to_string()))
            .await
            .unwrap();
        let response = shrink_handler(State(state.clone())).await.unwrap();
        assert!(response.settled);
        assert_eq!(response.overflow, 0);
        assert!(!state.cache.contains_key("a"));
    }

    #[tokio::test]
    async fn test_pin_missing_key() {
        let state = test_state(10);
        let result = pin_handler(State(state), Path("ghost".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_peek_does_not_count_hits() {
        let state = test_state(10);
        set_handler(State(state.clone()), set_req("k", "v", false))
            .await
            .unwrap();

        let response = peek_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, "v");

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_limit_and_flush_handlers() {
        let state = test_state(10);
        for key in ["a", "b", "c", "d"] {
            set_handler(State(state.clone()), set_req(key, "x", false))
                .await
                .unwrap();
        }

        let response = limit_handler(State(state.clone()), Json(LimitRequest { space_limit: 2 }))
            .await
            .unwrap();
        assert_eq!(response.space_limit, 2);
        assert_eq!(response.overflow, 0);
        assert_eq!(state.cache.len(), 2);

        let response = flush_handler(State(state.clone())).await;
        assert_eq!(response.flushed, 2);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state(10);
        set_handler(State(state.clone()), set_req("p", "x", true))
            .await
            .unwrap();
        set_handler(State(state.clone()), set_req("u", "x", false))
            .await
            .unwrap();
        let _ = get_handler(State(state.clone()), Path("missing".to_string())).await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 1);
        assert_eq!(response.total_entries, 2);
        assert_eq!(response.current_space, 2);
        assert_eq!(response.space_limit, 10);
        assert_eq!(response.by_kind["pinned"].count, 1);
        assert_eq!(response.by_kind["unpinned"].count, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state(10);

        // Empty key is invalid
        let result = set_handler(State(state), set_req("", "value", false)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
