use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use super::runtime::block_on;
use crate::{
    BucketStore, BucketTtl, BurstCapacity, LocalBucketStore, RateLimiter, RateLimiterOptions,
    RefillRate, TokenBucketParams, UplimitError,
};

fn options(refill_rate: f64, burst: u64) -> RateLimiterOptions {
    RateLimiterOptions {
        refill_rate: RefillRate::try_from(refill_rate).unwrap(),
        burst: BurstCapacity::from(burst),
        ttl: BucketTtl::from_hours(1).unwrap(),
        request_timeout: None,
    }
}

fn local_limiter(refill_rate: f64, burst: u64) -> RateLimiter<LocalBucketStore> {
    RateLimiter::new(options(refill_rate, burst), LocalBucketStore::new())
}

/// A store whose round trip never completes.
struct StalledStore {
    calls: AtomicU64,
}

impl BucketStore for StalledStore {
    async fn evaluate_and_store(
        &self,
        _key: &str,
        _now_ms: u64,
        _params: &TokenBucketParams,
    ) -> Result<bool, UplimitError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        std::future::pending().await
    }
}

#[test]
fn five_then_one_rejected_then_two_after_two_seconds() {
    let limiter = local_limiter(1.0, 5);
    let key = "chan:42";

    block_on(async {
        let mut decisions = Vec::new();
        for _ in 0..5 {
            decisions.push(limiter.allow_at(key, 0).await.unwrap());
        }
        assert_eq!(decisions, vec![true, true, true, true, true]);

        assert!(!limiter.allow_at(key, 0).await.unwrap());

        let decisions = vec![
            limiter.allow_at(key, 2_000).await.unwrap(),
            limiter.allow_at(key, 2_000).await.unwrap(),
            limiter.allow_at(key, 2_000).await.unwrap(),
        ];
        assert_eq!(decisions, vec![true, true, false]);
    });
}

#[test]
fn per_key_state_is_independent() {
    let limiter = local_limiter(1.0, 2);

    block_on(async {
        assert!(limiter.allow_at("a", 0).await.unwrap());
        assert!(limiter.allow_at("a", 0).await.unwrap());
        assert!(!limiter.allow_at("a", 0).await.unwrap());

        assert!(limiter.allow_at("b", 0).await.unwrap());
        assert!(limiter.allow_at("b", 0).await.unwrap());
        assert!(!limiter.allow_at("b", 0).await.unwrap());

        let a = limiter.store().state("a").unwrap();
        let b = limiter.store().state("b").unwrap();
        assert_eq!(a, b);
    });
}

#[test]
fn zero_burst_rejects_every_key() {
    let limiter = local_limiter(10.0, 0);

    block_on(async {
        for key in ["a", "b", "c"] {
            assert!(!limiter.allow_at(key, 0).await.unwrap());
            assert!(!limiter.allow_at(key, 10_000).await.unwrap());
        }
    });
}

#[test]
fn empty_key_is_an_error() {
    let limiter = local_limiter(1.0, 5);

    let err = block_on(limiter.allow("")).unwrap_err();
    assert!(matches!(err, UplimitError::InvalidBucketKey(_)));
    assert!(limiter.store().is_empty());
}

#[test]
fn allow_uses_wall_clock() {
    let limiter = local_limiter(1.0, 3);

    block_on(async {
        assert!(limiter.allow("k").await.unwrap());
        assert!(limiter.allow("k").await.unwrap());
        assert!(limiter.allow("k").await.unwrap());
        assert!(!limiter.allow("k").await.unwrap());
    });

    let state = limiter.store().state("k").unwrap();
    assert!(state.last_refill_ms > 0);
    assert!(state.tokens < 1.0);
}

#[test]
fn concurrent_callers_never_exceed_burst_at_one_instant() {
    let limiter = Arc::new(local_limiter(1.0, 25));
    let admitted = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);

            thread::spawn(move || {
                block_on(async {
                    for _ in 0..20 {
                        if limiter.allow_at("hot", 5_000).await.unwrap() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::Relaxed), 25);
}

#[test]
fn long_run_admissions_follow_refill_rate() {
    let limiter = local_limiter(2.0, 4);

    block_on(async {
        let mut admitted = 0u64;

        // Ten calls every 250ms for 60s.
        for step in 0..240u64 {
            let now_ms = step * 250;
            for _ in 0..10 {
                if limiter.allow_at("steady", now_ms).await.unwrap() {
                    admitted += 1;
                }
            }
        }

        // Initial burst plus 2 tokens/s over the 59.75s between first and last call.
        assert_eq!(admitted, 4 + 119);
    });
}

#[test]
fn allow_with_timeout_returns_timeout_error() {
    let store = StalledStore {
        calls: AtomicU64::new(0),
    };
    let limiter = RateLimiter::new(options(1.0, 5), store);

    let err = block_on(limiter.allow_with_timeout("k", Duration::from_millis(20))).unwrap_err();

    assert!(matches!(err, UplimitError::Timeout(d) if d == Duration::from_millis(20)));
    assert_eq!(limiter.store().calls.load(Ordering::Relaxed), 1);
}

#[test]
fn configured_request_timeout_applies_to_allow() {
    let store = StalledStore {
        calls: AtomicU64::new(0),
    };
    let limiter = RateLimiter::new(
        RateLimiterOptions {
            request_timeout: Some(Duration::from_millis(10)),
            ..options(1.0, 5)
        },
        store,
    );

    let err = block_on(limiter.allow("k")).unwrap_err();
    assert!(matches!(err, UplimitError::Timeout(_)));
}

#[test]
fn request_timeout_does_not_affect_fast_stores() {
    let limiter = RateLimiter::new(
        RateLimiterOptions {
            request_timeout: Some(Duration::from_secs(1)),
            ..options(1.0, 1)
        },
        LocalBucketStore::new(),
    );

    block_on(async {
        assert!(limiter.allow("k").await.unwrap());
        assert!(!limiter.allow("k").await.unwrap());
    });
}

#[test]
fn slow_channel_polled_every_second_is_readmitted_after_ten_seconds() {
    let limiter = local_limiter(0.1, 1);

    block_on(async {
        assert!(limiter.allow_at("chan:7", 0).await.unwrap());

        let mut first_readmission = None;
        for second in 1..=20u64 {
            if limiter.allow_at("chan:7", second * 1_000).await.unwrap() {
                first_readmission = Some(second);
                break;
            }
        }

        assert_eq!(first_readmission, Some(10));
    });
}
