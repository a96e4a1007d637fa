//! Redis-backed bucket store.
//!
//! Buckets live in Redis so every replica of the service draws from the same budget.
//! All reads and writes of a bucket happen inside one Lua script execution.

mod common;
pub use common::*;

mod redis_bucket_store;
pub use redis_bucket_store::*;
