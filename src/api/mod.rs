//! API Module
//!
//! HTTP handlers and routing for the document cache REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a document
//! - `GET /get/:key` - Retrieve a document
//! - `GET /peek/:key` - Retrieve a document without touching recency
//! - `DELETE /del/:key` - Delete a document
//! - `POST /pin/:key`, `POST /unpin/:key` - Toggle eviction protection
//! - `POST /shrink` - Retry paying back overflow
//! - `POST /flush` - Drop every document
//! - `PUT /limit` - Change the space limit
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
