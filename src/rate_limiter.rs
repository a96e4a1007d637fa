//! Top-level entrypoint binding the token bucket algorithm to a [`BucketStore`].

use std::time::Duration;

use crate::{
    BucketStore, BucketTtl, BurstCapacity, RefillRate, TokenBucketParams, UplimitError, runtime,
};

/// Configuration for [`RateLimiter`].
///
/// Every field is validated when it is built, so an invalid configuration is rejected
/// before a limiter exists rather than on the first request.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use uplimit::{BucketTtl, BurstCapacity, RateLimiterOptions, RefillRate};
///
/// let options = RateLimiterOptions {
///     refill_rate: RefillRate::try_from(1.0).unwrap(),
///     burst: BurstCapacity::from(5),
///     ttl: BucketTtl::from_hours(24).unwrap(),
///     request_timeout: Some(Duration::from_millis(200)),
/// };
/// # let _ = options;
/// ```
#[derive(Clone, Debug)]
pub struct RateLimiterOptions {
    /// Tokens added per second to each bucket.
    pub refill_rate: RefillRate,

    /// Maximum tokens per bucket, also the token count of a new bucket.
    pub burst: BurstCapacity,

    /// Idle time after which a bucket is dropped by the store and starts over full.
    pub ttl: BucketTtl,

    /// Deadline applied by [`RateLimiter::allow`] to each store round trip.
    ///
    /// `None` waits for the store for as long as the caller keeps polling.
    pub request_timeout: Option<Duration>,
}

/// Token bucket rate limiter.
///
/// Holds only immutable configuration and a store handle. One instance can be shared
/// (e.g. behind an `Arc`) by any number of concurrent callers; bucket state lives in
/// the store alone.
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> Result<(), uplimit::UplimitError> {
/// use uplimit::{
///     BucketTtl, BurstCapacity, RateLimiter, RateLimiterOptions, RedisBucketStore,
///     RedisBucketStoreOptions, RedisStoreClient, RefillRate,
/// };
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
/// let store = RedisBucketStore::new(RedisBucketStoreOptions {
///     client: RedisStoreClient::default_from_client(client).await?,
///     prefix: None,
/// });
///
/// let limiter = RateLimiter::new(
///     RateLimiterOptions {
///         refill_rate: RefillRate::try_from(1.0)?,
///         burst: BurstCapacity::from(5),
///         ttl: BucketTtl::from_hours(24)?,
///         request_timeout: None,
///     },
///     store,
/// );
///
/// if limiter.allow("chan:42").await? {
///     // proceed with the upload
/// }
/// # Ok(())
/// # }
/// ```
pub struct RateLimiter<S> {
    store: S,
    params: TokenBucketParams,
    request_timeout: Option<Duration>,
}

impl<S: BucketStore> RateLimiter<S> {
    /// Create a new [`RateLimiter`] over `store`.
    pub fn new(options: RateLimiterOptions, store: S) -> Self {
        Self {
            store,
            params: TokenBucketParams {
                refill_rate: options.refill_rate,
                burst: options.burst,
                ttl: options.ttl,
            },
            request_timeout: options.request_timeout,
        }
    } // end constructor

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parameters every bucket is evaluated with.
    pub fn params(&self) -> &TokenBucketParams {
        &self.params
    }

    /// Consume one token from the bucket of `key` if one is available.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: admitted, one token consumed
    /// - `Ok(false)`: bucket exhausted, nothing consumed
    /// - `Err(_)`: no decision could be made (store unreachable, timeout, malformed
    ///   response, empty key). Nothing is retried here.
    ///
    /// The configured `request_timeout`, if any, bounds the store round trip. Dropping
    /// the returned future also abandons the call.
    pub async fn allow(&self, key: &str) -> Result<bool, UplimitError> {
        match self.request_timeout {
            Some(request_timeout) => self.allow_with_timeout(key, request_timeout).await,
            None => self.allow_at(key, runtime::unix_now_ms()).await,
        }
    } // end method allow

    /// Same as [`allow`](Self::allow) with an explicit deadline for this call.
    ///
    /// Returns [`UplimitError::Timeout`] if the store has not answered within `timeout`.
    /// The store applies its update atomically, so a timed out call leaves the bucket
    /// either untouched or fully updated.
    pub async fn allow_with_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<bool, UplimitError> {
        runtime::timeout(timeout, self.allow_at(key, runtime::unix_now_ms())).await?
    }

    pub(crate) async fn allow_at(&self, key: &str, now_ms: u64) -> Result<bool, UplimitError> {
        if key.is_empty() {
            return Err(UplimitError::InvalidBucketKey(
                "Bucket key must not be empty".to_string(),
            ));
        }

        self.store
            .evaluate_and_store(key, now_ms, &self.params)
            .await
    } // end method allow_at
}
