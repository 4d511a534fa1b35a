//! Overflow LRU - a variable-weight LRU cache with veto-aware eviction
//!
//! The [`cache`] module is the library proper: a strict LRU cache, an
//! overflowing variant that asks a close hook before evicting, and a sharded
//! front for concurrent use. The remaining modules wrap it in a small HTTP
//! document cache service.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_shrink_task;
