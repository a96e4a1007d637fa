use std::time::Duration;

/// Error type for this crate.
///
/// A rejected request is never an error: [`RateLimiter::allow`](crate::RateLimiter::allow)
/// returns `Ok(false)` for that. Errors mean either an invalid configuration value
/// (rejected when it is built) or an infrastructure failure while talking to the store.
#[derive(Debug, thiserror::Error)]
pub enum UplimitError {
    /// Redis error.
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Invalid Redis key prefix.
    #[error("invalid redis prefix: {0}")]
    InvalidRedisPrefix(String),

    /// Invalid number of connections for a [`RedisStoreClient`](crate::RedisStoreClient).
    #[error("invalid redis client connection count: {0}")]
    InvalidRedisClientConnectionCount(String),

    /// Invalid refill rate.
    #[error("invalid refill rate: {0}")]
    InvalidRefillRate(String),

    /// Invalid burst capacity.
    #[error("invalid burst capacity: {0}")]
    InvalidBurstCapacity(String),

    /// Invalid bucket TTL.
    #[error("invalid bucket ttl: {0}")]
    InvalidBucketTtl(String),

    /// Invalid bucket key.
    #[error("invalid bucket key: {0}")]
    InvalidBucketKey(String),

    /// The store did not answer before the deadline.
    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with something the limiter could not decode.
    #[error("unexpected store response: {0}")]
    UnexpectedStoreResponse(String),
}
