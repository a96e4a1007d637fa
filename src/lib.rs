#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

#[cfg(not(any(feature = "redis-tokio", feature = "redis-smol")))]
compile_error!("uplimit needs an async runtime: enable either `redis-tokio` or `redis-smol`");

mod rate_limiter;
pub use rate_limiter::*;

mod store;
pub use store::*;

mod token_bucket;
pub use token_bucket::*;

mod local;
pub use local::*;

mod redis;
pub use redis::*;

mod gate;
pub use gate::*;

mod settings;
pub use settings::*;

mod error;
pub use error::*;

mod common;
pub use common::{BucketTtl, BurstCapacity, RefillRate};

mod runtime;

#[cfg(test)]
mod tests;
