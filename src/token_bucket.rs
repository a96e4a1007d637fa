//! Token bucket admission logic.
//!
//! A bucket holds up to `burst` tokens and is refilled continuously at `refill_rate`
//! tokens per second. Every admitted request consumes exactly one token.
//!
//! This module is pure: it never reads a clock and never touches a store. Each
//! [`BucketStore`](crate::BucketStore) runs [`evaluate_bucket`] (or an equivalent server-side
//! script) as a single atomic step against the state it persists.

use crate::{BucketTtl, BurstCapacity, RefillRate};

/// Persisted state of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    /// Available tokens, `0 <= tokens <= burst`.
    pub tokens: f64,
    /// Unix timestamp in milliseconds of the last refill.
    pub last_refill_ms: u64,
}

/// Parameters every store needs to evaluate a bucket.
///
/// Built once by [`RateLimiter::new`](crate::RateLimiter::new) and fixed for the
/// limiter's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketParams {
    /// Tokens added per second.
    pub refill_rate: RefillRate,
    /// Bucket capacity and initial token count.
    pub burst: BurstCapacity,
    /// Expiration of the stored bucket after each update.
    pub ttl: BucketTtl,
}

/// Token counts are kept on a grid of one millionth of a token.
///
/// Every refill is snapped to the grid before the admission test, so refills at
/// decimal rates add up exactly (ten refills of `0.1` make one whole token) and the
/// Redis script, which runs the same operations in the same order, reaches the same
/// decisions.
pub const TOKEN_RESOLUTION: f64 = 1_000_000f64;

fn snap_to_resolution(tokens: f64) -> f64 {
    (tokens * TOKEN_RESOLUTION + 0.5).floor() / TOKEN_RESOLUTION
}

/// Decide admission of one request against `state` at `now_ms`.
///
/// Returns the decision and the state to persist, whatever the decision.
///
/// - Missing state is a full bucket created at `now_ms`.
/// - A `now_ms` earlier than `last_refill_ms` refills nothing and keeps
///   `last_refill_ms` where it was instead of moving it back to `now_ms`, so clock
///   skew between callers can never mint tokens twice for the same interval.
pub fn evaluate_bucket(
    state: Option<BucketState>,
    now_ms: u64,
    refill_rate: RefillRate,
    burst: BurstCapacity,
) -> (bool, BucketState) {
    let burst = *burst as f64;

    let BucketState {
        tokens,
        last_refill_ms,
    } = state.unwrap_or(BucketState {
        tokens: burst,
        last_refill_ms: now_ms,
    });

    let elapsed_ms = now_ms.saturating_sub(last_refill_ms);
    let refill = (elapsed_ms as f64 / 1000f64) * *refill_rate;
    let tokens = snap_to_resolution(tokens + refill).clamp(0f64, burst);

    let (allowed, tokens) = if tokens >= 1f64 {
        (true, tokens - 1f64)
    } else {
        (false, tokens)
    };

    (
        allowed,
        BucketState {
            tokens,
            last_refill_ms: last_refill_ms.max(now_ms),
        },
    )
}
