//! Validated configuration values shared by every store.

use std::{ops::Deref, time::Duration};

use crate::UplimitError;

/// Sustained refill rate of a bucket, in tokens per second.
///
/// May be fractional. Zero is accepted and means a bucket never replenishes once
/// its initial burst is spent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RefillRate(f64);

impl Deref for RefillRate {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<f64> for RefillRate {
    type Error = UplimitError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            Err(UplimitError::InvalidRefillRate(
                "Refill rate must be a finite number".to_string(),
            ))
        } else if value < 0f64 {
            Err(UplimitError::InvalidRefillRate(
                "Refill rate must not be negative".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Maximum number of tokens a bucket holds.
///
/// This is also the token count of a bucket that has just been created. A capacity
/// of zero is accepted and makes every request for every key rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BurstCapacity(u64);

impl Deref for BurstCapacity {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u64> for BurstCapacity {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for BurstCapacity {
    type Error = UplimitError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value).map(Self).map_err(|_| {
            UplimitError::InvalidBurstCapacity("Burst capacity must not be negative".to_string())
        })
    }
}

/// Expiration applied to a stored bucket after each update.
///
/// Stores keep millisecond precision, so the TTL must be at least one millisecond.
/// It must not exceed [`BucketTtl::MAX`]; longer values could not be handed to
/// `PEXPIRE` as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketTtl(Duration);

impl BucketTtl {
    /// Longest accepted TTL: ten years of 365 days.
    pub const MAX: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

    /// TTL in whole milliseconds, saturating at `u64::MAX`.
    pub fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    /// TTL of `hours` hours.
    pub fn from_hours(hours: u64) -> Result<Self, UplimitError> {
        let secs = hours.checked_mul(3600).ok_or_else(|| {
            UplimitError::InvalidBucketTtl("Bucket TTL in hours is too large".to_string())
        })?;

        Self::try_from(Duration::from_secs(secs))
    }
}

impl Deref for BucketTtl {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Duration> for BucketTtl {
    type Error = UplimitError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value < Duration::from_millis(1) {
            Err(UplimitError::InvalidBucketTtl(
                "Bucket TTL must be at least 1 millisecond".to_string(),
            ))
        } else if value > Self::MAX {
            Err(UplimitError::InvalidBucketTtl(
                "Bucket TTL must not exceed 10 years".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}
