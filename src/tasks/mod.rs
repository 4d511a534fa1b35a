//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Overflow shrink: retries evicting unpinned documents while any shard is
//!   over its limit

mod shrink;

pub use shrink::spawn_shrink_task;
