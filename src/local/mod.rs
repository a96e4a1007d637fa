//! In-process bucket store.
//!
//! The local store keeps buckets in this process using a [`DashMap`](dashmap::DashMap).
//! It enforces the same token bucket as the Redis store with the same per-key
//! atomicity, but replicas do not see each other's budget.
//!
//! # When to Use
//!
//! - Single-replica deployments
//! - Tests and benchmarks that should not need a Redis server
//!
//! With more than one replica, use [`RedisBucketStore`](crate::RedisBucketStore):
//! a local store per replica multiplies the effective budget by the replica count.
//!
//! # Examples
//!
//! ```
//! # async fn run() -> Result<(), uplimit::UplimitError> {
//! use uplimit::{
//!     BucketTtl, BurstCapacity, LocalBucketStore, RateLimiter, RateLimiterOptions, RefillRate,
//! };
//!
//! let limiter = RateLimiter::new(
//!     RateLimiterOptions {
//!         refill_rate: RefillRate::try_from(1.0)?,
//!         burst: BurstCapacity::from(2),
//!         ttl: BucketTtl::from_hours(1)?,
//!         request_timeout: None,
//!     },
//!     LocalBucketStore::new(),
//! );
//!
//! assert!(limiter.allow("chan:42").await?);
//! assert!(limiter.allow("chan:42").await?);
//! assert!(!limiter.allow("chan:42").await?);
//! # Ok(())
//! # }
//! ```

mod local_bucket_store;
pub use local_bucket_store::*;
