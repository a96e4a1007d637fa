use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{
    BucketStore, TokenBucketParams, UplimitError, runtime,
    token_bucket::{self, BucketState},
};

/// Default period of [`LocalBucketStore::run_cleanup_loop`].
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct StoredBucket {
    state: Option<BucketState>,
    /// `None` when the TTL is too large to be represented as an `Instant`.
    expires_at: Option<Instant>,
}

impl StoredBucket {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// In-process bucket store.
///
/// Runs the same algorithm as [`RedisBucketStore`](crate::RedisBucketStore) against a
/// [`DashMap`]. Every evaluation happens while holding the map entry for the key, so
/// concurrent callers in this process are totally ordered per key exactly like callers of
/// the Redis script are. State is not shared with other processes: use it for a single
/// replica or in tests.
///
/// Expired buckets are treated as absent on access. They are only removed from memory by
/// [`run_cleanup_loop`](Self::run_cleanup_loop), or when the key is used again.
///
/// Cloning is cheap and clones share the same buckets.
#[derive(Clone, Debug, Default)]
pub struct LocalBucketStore {
    buckets: Arc<DashMap<String, StoredBucket>>,
    // Odd while a cleanup loop runs. Each start and stop bumps it, so a stopped loop can
    // tell it has been superseded even if another one was started in the meantime.
    cleanup_epoch: Arc<AtomicU64>,
}

impl LocalBucketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets held in memory, expired or not.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no bucket is held in memory.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Current state of `key`'s bucket, `None` if absent or expired.
    pub fn state(&self, key: &str) -> Option<BucketState> {
        let now = Instant::now();

        self.buckets
            .get(key)
            .filter(|bucket| !bucket.is_expired(now))
            .and_then(|bucket| bucket.state)
    }

    /// Drop every expired bucket.
    pub fn cleanup(&self) -> usize {
        Self::cleanup_buckets(&self.buckets)
    }

    fn cleanup_buckets(buckets: &DashMap<String, StoredBucket>) -> usize {
        let now = Instant::now();
        let before = buckets.len();

        buckets.retain(|_, bucket| !bucket.is_expired(now));

        before.saturating_sub(buckets.len())
    } // end method cleanup_buckets

    /// Start a background task dropping expired buckets every [`DEFAULT_CLEANUP_INTERVAL`].
    ///
    /// See [`run_cleanup_loop_with_interval`](Self::run_cleanup_loop_with_interval).
    pub fn run_cleanup_loop(&self) {
        self.run_cleanup_loop_with_interval(DEFAULT_CLEANUP_INTERVAL);
    }

    /// Start a background task dropping expired buckets every `interval`.
    ///
    /// Calling this while a loop is already running does nothing. The loop ends on
    /// [`stop_cleanup_loop`](Self::stop_cleanup_loop) or once every clone of the store has
    /// been dropped.
    ///
    /// With `redis-tokio` this must be called from within a Tokio runtime.
    pub fn run_cleanup_loop_with_interval(&self, interval: Duration) {
        let current = self.cleanup_epoch.load(Ordering::Acquire);
        if current % 2 == 1 {
            return;
        }

        let epoch = current + 1;
        if self
            .cleanup_epoch
            .compare_exchange(current, epoch, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let buckets: Weak<DashMap<String, StoredBucket>> = Arc::downgrade(&self.buckets);
        let cleanup_epoch = Arc::downgrade(&self.cleanup_epoch);

        runtime::spawn_task(async move {
            let mut interval = runtime::new_interval(interval);

            loop {
                runtime::tick(&mut interval).await;

                let Some(current_epoch) = cleanup_epoch.upgrade() else {
                    break;
                };
                if current_epoch.load(Ordering::Acquire) != epoch {
                    break;
                }

                let Some(buckets) = buckets.upgrade() else {
                    break;
                };

                let removed = Self::cleanup_buckets(&buckets);
                tracing::trace!(removed, "local bucket store cleanup pass");
            }

            tracing::debug!("local bucket store cleanup loop stopped");
        });
    } // end method run_cleanup_loop_with_interval

    /// Stop the cleanup loop, if one is running.
    pub fn stop_cleanup_loop(&self) {
        let current = self.cleanup_epoch.load(Ordering::Acquire);
        if current % 2 == 1 {
            // Losing this race means another stop or start already moved the epoch on.
            let _ = self.cleanup_epoch.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}

impl BucketStore for LocalBucketStore {
    async fn evaluate_and_store(
        &self,
        key: &str,
        now_ms: u64,
        params: &TokenBucketParams,
    ) -> Result<bool, UplimitError> {
        let now = Instant::now();

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert(StoredBucket {
                state: None,
                expires_at: Some(now),
            });

        let prior = if bucket.is_expired(now) {
            None
        } else {
            bucket.state
        };

        let (allowed, state) =
            token_bucket::evaluate_bucket(prior, now_ms, params.refill_rate, params.burst);

        *bucket = StoredBucket {
            state: Some(state),
            expires_at: now.checked_add(*params.ttl),
        };

        Ok(allowed)
    } // end method evaluate_and_store
}
