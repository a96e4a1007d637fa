//! Per-channel upload admission.
//!
//! The gate sits in front of the upload endpoints. It keys the limiter by channel id and
//! turns its answer into one of four outcomes a transport layer can map to a response.
//! Store failures fail closed.

use crate::{BucketStore, RateLimiter};

/// Outcome of [`ChannelUploadGate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadGateDecision {
    /// The upload may proceed.
    Admitted,
    /// The request carries no channel id.
    MissingChannel,
    /// The channel's bucket is exhausted.
    RateLimited,
    /// The limiter could not reach a decision. The request is rejected.
    StoreUnavailable,
}

impl UploadGateDecision {
    /// Whether the upload may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }

    /// HTTP status to reject the request with, `None` when admitted.
    pub fn rejection_status(&self) -> Option<u16> {
        match self {
            Self::Admitted => None,
            Self::MissingChannel => Some(401),
            Self::RateLimited => Some(429),
            Self::StoreUnavailable => Some(500),
        }
    }
}

/// Gate admitting uploads against a per-channel token bucket.
pub struct ChannelUploadGate<S> {
    limiter: RateLimiter<S>,
}

impl<S: BucketStore> ChannelUploadGate<S> {
    /// Create a gate over `limiter`.
    pub fn new(limiter: RateLimiter<S>) -> Self {
        Self { limiter }
    }

    /// Access the underlying limiter.
    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }

    /// Decide whether an upload to `channel_id` may proceed.
    ///
    /// `channel_id` is whatever the authentication layer attached to the request; `None`
    /// means it attached nothing.
    pub async fn check(&self, channel_id: Option<u64>) -> UploadGateDecision {
        let Some(channel_id) = channel_id else {
            return UploadGateDecision::MissingChannel;
        };

        match self.limiter.allow(&channel_id.to_string()).await {
            Ok(true) => UploadGateDecision::Admitted,
            Ok(false) => UploadGateDecision::RateLimited,
            Err(err) => {
                tracing::error!(error = %err, channel_id, "channel upload rate limit check failed");
                UploadGateDecision::StoreUnavailable
            }
        }
    } // end method check
}
