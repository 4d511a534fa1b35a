//! Cached document type served by the HTTP API.

use serde::Serialize;

use crate::cache::Footprint;

/// Bytes per capacity unit when weighing a document.
pub const FOOTPRINT_UNIT_BYTES: usize = 1024;

/// A stored text body plus whether it is pinned against eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub body: String,
    pub pinned: bool,
}

impl Document {
    pub fn new(body: impl Into<String>, pinned: bool) -> Self {
        Self {
            body: body.into(),
            pinned,
        }
    }
}

impl Footprint for Document {
    /// One unit per started KiB of body, at least 1.
    fn cache_footprint(&self) -> usize {
        self.body.len().div_ceil(FOOTPRINT_UNIT_BYTES).max(1)
    }
}
