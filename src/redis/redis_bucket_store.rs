use redis::Script;

use crate::{
    BucketStore, TOKEN_RESOLUTION, TokenBucketParams, UplimitError,
    redis::{BucketKeyFormat, RedisPrefix, RedisStoreClient},
};

// Each bucket is one hash with fields `tokens` and `last_refill` (Unix ms), expired
// with PEXPIRE on every evaluation. Mirrors `evaluate_bucket` operation for operation,
// including the snap to `TOKEN_RESOLUTION`. Numbers are written with `%.17g` so that
// they read back as the exact same doubles.
const EVALUATE_BUCKET_SCRIPT: &str = r#"
    local bucket_key = KEYS[1]

    local now_ms = tonumber(ARGV[1])
    local refill_rate = tonumber(ARGV[2])
    local burst = tonumber(ARGV[3])
    local ttl_ms = ARGV[4]
    local resolution = tonumber(ARGV[5])

    local state = redis.call("HMGET", bucket_key, "tokens", "last_refill")
    local tokens = tonumber(state[1])
    local last_refill = tonumber(state[2])

    if tokens == nil or last_refill == nil then
        tokens = burst
        last_refill = now_ms
    end

    local elapsed_ms = now_ms - last_refill
    if elapsed_ms < 0 then
        elapsed_ms = 0
    else
        last_refill = now_ms
    end

    tokens = math.floor((tokens + (elapsed_ms / 1000) * refill_rate) * resolution + 0.5) / resolution
    if tokens > burst then
        tokens = burst
    elseif tokens < 0 then
        tokens = 0
    end

    local allowed = 0
    if tokens >= 1 then
        tokens = tokens - 1
        allowed = 1
    end

    local encoded_tokens = string.format("%.17g", tokens)

    redis.call("HSET", bucket_key, "tokens", encoded_tokens, "last_refill", string.format("%.17g", last_refill))
    redis.call("PEXPIRE", bucket_key, ttl_ms)

    return {allowed, encoded_tokens}
"#;

/// Configuration for [`RedisBucketStore`].
///
/// # Requirements
///
/// - **Redis version:** >= 4.0.0 (multi-field `HSET`)
/// - **Runtime:** Tokio or Smol (via `redis-tokio` or `redis-smol` features)
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> Result<(), uplimit::UplimitError> {
/// use uplimit::{RedisBucketStoreOptions, RedisPrefix, RedisStoreClient};
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
///
/// let options = RedisBucketStoreOptions {
///     client: RedisStoreClient::from_client(client, 4).await?,
///     prefix: Some(RedisPrefix::try_from("uploader".to_string())?), // Keys: uploader:<key>:tb
/// };
/// # let _ = options;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RedisBucketStoreOptions {
    /// Connections to the Redis server shared by every replica.
    pub client: RedisStoreClient,

    /// Optional prefix for all Redis keys.
    ///
    /// Buckets are stored under `<prefix>:<key>:tb`. If `None`, defaults to `"uplimit"`.
    pub prefix: Option<RedisPrefix>,
}

/// Bucket store shared by every replica through Redis.
///
/// Each evaluation is a single Lua script: the read of the previous state, the refill
/// and decrement, the write and the expiration happen inside Redis with no other command
/// interleaved. Calls for one key are therefore totally ordered no matter which process
/// issued them. Calls for different keys touch different hashes and never interact.
///
/// The script is sent with `EVALSHA` and falls back to `EVAL` when Redis does not have
/// it cached yet.
pub struct RedisBucketStore {
    client: RedisStoreClient,
    key_format: BucketKeyFormat,
    script: Script,
}

impl RedisBucketStore {
    /// Create a new [`RedisBucketStore`].
    pub fn new(options: RedisBucketStoreOptions) -> Self {
        let prefix = options.prefix.unwrap_or_else(RedisPrefix::default_prefix);

        Self {
            client: options.client,
            key_format: BucketKeyFormat::new(prefix),
            script: Script::new(EVALUATE_BUCKET_SCRIPT),
        }
    }

    /// The Redis key `key`'s bucket is stored under.
    pub fn bucket_key(&self, key: &str) -> String {
        self.key_format.bucket_key(key)
    }
}

impl BucketStore for RedisBucketStore {
    async fn evaluate_and_store(
        &self,
        key: &str,
        now_ms: u64,
        params: &TokenBucketParams,
    ) -> Result<bool, UplimitError> {
        let bucket_key = self.key_format.bucket_key(key);
        let mut connection_manager = self.client.next_connection();

        let (allowed, tokens): (i64, String) = self
            .script
            .key(&bucket_key)
            .arg(now_ms)
            .arg(*params.refill_rate)
            .arg(*params.burst)
            .arg(params.ttl.as_millis_u64())
            .arg(TOKEN_RESOLUTION)
            .invoke_async(&mut connection_manager)
            .await?;

        let allowed = match allowed {
            1 => true,
            0 => false,
            other => {
                return Err(UplimitError::UnexpectedStoreResponse(format!(
                    "admission flag must be 0 or 1, got {other}"
                )));
            }
        };

        let remaining = tokens.parse::<f64>().map_err(|_| {
            UplimitError::UnexpectedStoreResponse(format!("token count is not a number: {tokens}"))
        })?;

        tracing::debug!(key = %bucket_key, allowed, remaining, "token bucket evaluated");

        Ok(allowed)
    } // end method evaluate_and_store
}
