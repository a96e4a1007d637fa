//! Drives async tests on the runtime selected by the crate features.

use std::{future::Future, time::Duration};

/// Run `fut` on a fresh single-threaded runtime. Tasks it spawns (cleanup loops) make
/// progress whenever `fut` awaits.
#[cfg(feature = "redis-tokio")]
pub(super) fn block_on<T>(fut: impl Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(fut)
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(super) fn block_on<T>(fut: impl Future<Output = T>) -> T {
    smol::block_on(fut)
}

/// Yield to the runtime for `period`.
pub(super) async fn async_sleep(period: Duration) {
    #[cfg(feature = "redis-tokio")]
    tokio::time::sleep(period).await;

    #[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
    smol::Timer::after(period).await;
}
