//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest accepted key, in bytes
pub const MAX_KEY_LENGTH: usize = 256;
/// Largest accepted document body, in bytes
pub const MAX_VALUE_BYTES: usize = 1024 * 1024;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the document under
/// - `value`: The document body
/// - `pinned`: Whether the document refuses eviction (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The document body
    pub value: String,
    /// Pinned documents stay cached past the space limit
    #[serde(default)]
    pub pinned: bool,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.value.len() > MAX_VALUE_BYTES {
            return Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_BYTES
            ));
        }
        None
    }
}

/// Request body for changing the space limit (PUT /limit)
#[derive(Debug, Clone, Deserialize)]
pub struct LimitRequest {
    pub space_limit: usize,
}
