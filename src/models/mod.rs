//! Request and Response models for the cache server API
//!
//! This module defines the cached document type and the DTOs (Data Transfer
//! Objects) used for serializing/deserializing HTTP request and response bodies.

pub mod document;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use document::{Document, FOOTPRINT_UNIT_BYTES};
pub use requests::{LimitRequest, SetRequest};
pub use responses::{
    DeleteResponse, ErrorResponse, FlushResponse, GetResponse, HealthResponse, LimitResponse,
    PinResponse, SetResponse, ShrinkResponse, StatsResponse,
};
