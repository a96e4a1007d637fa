//! Declarative configuration for the channel upload gate.
//!
//! Mirrors the service configuration tree so that the section can be deserialized
//! straight out of the service's config file:
//!
//! ```json
//! {
//!   "redis": { "url": "redis://127.0.0.1:6379/", "expirationHour": 24 },
//!   "rateLimit": { "channelUpload": { "rps": 200, "burst": 100 } }
//! }
//! ```
//!
//! Values are validated when converted into [`RateLimiterOptions`], never per request.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    BucketTtl, BurstCapacity, ChannelUploadGate, RateLimiter, RateLimiterOptions,
    RedisBucketStore, RedisBucketStoreOptions, RedisPrefix, RedisStoreClient, RefillRate,
    UplimitError,
};

fn default_connection_count() -> usize {
    1
}

/// Settings for the uploader's rate limiting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploaderSettings {
    /// Shared store connection.
    pub redis: RedisSettings,
    /// Budgets.
    pub rate_limit: RateLimitSettings,
}

/// Connection to the Redis server every replica shares.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisSettings {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/`.
    pub url: String,
    /// Idle hours after which a bucket expires.
    pub expiration_hour: u64,
    /// Connection managers to spread requests over.
    #[serde(default = "default_connection_count")]
    pub connection_count: usize,
    /// Key prefix, see [`RedisBucketStoreOptions::prefix`].
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Rate limit budgets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSettings {
    /// Budget of each upload channel.
    pub channel_upload: ChannelUploadSettings,
}

/// Token bucket budget of one upload channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUploadSettings {
    /// Sustained uploads per second.
    pub rps: f64,
    /// Uploads that may happen back to back.
    pub burst: i64,
    /// Deadline of each store round trip in milliseconds.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl UploaderSettings {
    /// Validated limiter options for the channel upload budget.
    pub fn rate_limiter_options(&self) -> Result<RateLimiterOptions, UplimitError> {
        let channel_upload = &self.rate_limit.channel_upload;

        Ok(RateLimiterOptions {
            refill_rate: RefillRate::try_from(channel_upload.rps)?,
            burst: BurstCapacity::try_from(channel_upload.burst)?,
            ttl: BucketTtl::from_hours(self.redis.expiration_hour)?,
            request_timeout: channel_upload.request_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Validated Redis key prefix, `None` for the default.
    pub fn redis_prefix(&self) -> Result<Option<RedisPrefix>, UplimitError> {
        self.redis
            .prefix
            .clone()
            .map(RedisPrefix::try_from)
            .transpose()
    }
}

/// Connect to Redis and build the channel upload gate described by `settings`.
///
/// Configuration errors are reported before any connection is attempted.
pub async fn build_channel_upload_gate(
    settings: &UploaderSettings,
) -> Result<ChannelUploadGate<RedisBucketStore>, UplimitError> {
    let options = settings.rate_limiter_options()?;
    let prefix = settings.redis_prefix()?;

    let client = redis::Client::open(settings.redis.url.as_str())?;
    let client = RedisStoreClient::from_client(client, settings.redis.connection_count).await?;

    let store = RedisBucketStore::new(RedisBucketStoreOptions { client, prefix });

    Ok(ChannelUploadGate::new(RateLimiter::new(options, store)))
}
