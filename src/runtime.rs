use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::UplimitError;

#[cfg(feature = "redis-tokio")]
pub(crate) type Interval = tokio::time::Interval;

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) type Interval = smol::Timer;

#[cfg(feature = "redis-tokio")]
pub(crate) fn new_interval(period: Duration) -> Interval {
    tokio::time::interval(period)
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) fn new_interval(period: Duration) -> Interval {
    smol::Timer::interval(period)
}

#[cfg(feature = "redis-tokio")]
pub(crate) fn spawn_task<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(fut);
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) fn spawn_task<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    smol::spawn(fut).detach();
}

#[cfg(feature = "redis-tokio")]
pub(crate) async fn tick(interval: &mut Interval) {
    interval.tick().await;
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) async fn tick(interval: &mut Interval) {
    use futures::StreamExt;
    interval.next().await;
}

/// Run `fut` to completion unless `duration` elapses first.
///
/// On expiry `fut` is dropped and [`UplimitError::Timeout`] is returned.
#[cfg(feature = "redis-tokio")]
pub(crate) async fn timeout<F, T>(duration: Duration, fut: F) -> Result<T, UplimitError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| UplimitError::Timeout(duration))
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) async fn timeout<F, T>(duration: Duration, fut: F) -> Result<T, UplimitError>
where
    F: Future<Output = T>,
{
    smol::future::or(async { Ok(fut.await) }, async {
        smol::Timer::after(duration).await;
        Err(UplimitError::Timeout(duration))
    })
    .await
}

/// Wall clock in Unix milliseconds.
///
/// Buckets are shared between replicas, so the timestamp has to be comparable
/// across processes; a monotonic `Instant` would not be.
pub(crate) fn unix_now_ms() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}
