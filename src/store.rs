use std::future::Future;

use crate::{TokenBucketParams, UplimitError};

/// A place where buckets live.
///
/// Implementations must run the whole read, [`evaluate_bucket`](crate::evaluate_bucket),
/// write and expire sequence for one key as a single indivisible step: no other caller
/// for the same key may observe the state between the read and the write. They must not
/// keep a copy of bucket state anywhere other than the store itself.
///
/// - [`RedisBucketStore`](crate::RedisBucketStore): shared across replicas via a Lua script.
/// - [`LocalBucketStore`](crate::LocalBucketStore): process-local, per-key entry lock.
pub trait BucketStore: Send + Sync {
    /// Atomically evaluate the bucket stored under `key` at `now_ms`, persist the new state
    /// with `params.ttl` applied and return whether the request is admitted.
    ///
    /// Errors only on infrastructure failure. A rejection is `Ok(false)`.
    fn evaluate_and_store(
        &self,
        key: &str,
        now_ms: u64,
        params: &TokenBucketParams,
    ) -> impl Future<Output = Result<bool, UplimitError>> + Send;
}
