//! Request pacing for a single archive run
//!
//! Pages and assets are paced independently. The first request of each kind
//! is never delayed; later ones wait until the configured interval has passed
//! since the previous request of the same kind.

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Pacing policy consulted before every outgoing request
#[async_trait]
pub trait Throttle: Send {
    /// Waits, if needed, before an asset request
    async fn before_asset(&mut self);

    /// Waits, if needed, before a page request
    async fn before_page(&mut self);
}

/// Fixed minimum interval between requests of the same kind
#[derive(Debug, Clone)]
pub struct IntervalThrottle {
    asset_interval: Duration,
    page_interval: Duration,
    last_asset: Option<Instant>,
    last_page: Option<Instant>,
}

impl IntervalThrottle {
    pub fn new(asset_interval: Duration, page_interval: Duration) -> Self {
        Self {
            asset_interval,
            page_interval,
            last_asset: None,
            last_page: None,
        }
    }

    /// Builds the throttle from the `[crawler]` delay settings
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.asset_delay_ms),
            Duration::from_millis(config.page_delay_ms),
        )
    }
}

/// Time left before the next request may go out, if any
fn time_until_next(last: Option<Instant>, interval: Duration, now: Instant) -> Option<Duration> {
    let last = last?;
    let elapsed = now.duration_since(last);
    if elapsed < interval {
        Some(interval - elapsed)
    } else {
        None
    }
}

async fn pace(last: &mut Option<Instant>, interval: Duration) {
    if let Some(wait) = time_until_next(*last, interval, Instant::now()) {
        tracing::trace!("Throttling for {:?}", wait);
        tokio::time::sleep(wait).await;
    }
    *last = Some(Instant::now());
}

#[async_trait]
impl Throttle for IntervalThrottle {
    async fn before_asset(&mut self) {
        pace(&mut self.last_asset, self.asset_interval).await;
    }

    async fn before_page(&mut self) {
        pace(&mut self.last_page, self.page_interval).await;
    }
}

/// Never waits; used by tests and local mirrors
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn before_asset(&mut self) {}

    async fn before_page(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_until_next() {
        let now = Instant::now();
        let interval = Duration::from_millis(100);

        assert_eq!(time_until_next(None, interval, now), None);
        assert!(time_until_next(Some(now), interval, now).is_some());
        assert_eq!(
            time_until_next(Some(now), interval, now + Duration::from_millis(150)),
            None
        );
    }

    #[tokio::test]
    async fn test_first_request_not_delayed() {
        let mut throttle =
            IntervalThrottle::new(Duration::from_millis(300), Duration::from_millis(300));

        let start = Instant::now();
        throttle.before_page().await;
        throttle.before_asset().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_second_request_waits_for_interval() {
        let mut throttle =
            IntervalThrottle::new(Duration::from_millis(80), Duration::from_millis(1));

        let start = Instant::now();
        throttle.before_asset().await;
        throttle.before_asset().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_kinds_paced_independently() {
        let mut throttle =
            IntervalThrottle::new(Duration::from_millis(1), Duration::from_millis(500));

        throttle.before_page().await;
        let start = Instant::now();
        throttle.before_asset().await;
        throttle.before_asset().await;
        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_no_throttle() {
        let mut throttle = NoThrottle;
        let start = Instant::now();
        for _ in 0..10 {
            throttle.before_page().await;
            throttle.before_asset().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
