use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Keeps at least `interval` between the starts of consecutive calls.
/// The first call goes through immediately. A zero interval disables pacing.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until the next call may start, then record it as started.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let next = last + self.interval;
            if next > Instant::now() {
                trace!("Pacing for {:?}", next - Instant::now());
                sleep_until(next).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_out_calls() {
        let mut p = Pacer::from_millis(1500);
        let start = Instant::now();
        p.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        p.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
        p.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_callers_are_not_delayed() {
        let mut p = Pacer::from_millis(100);
        p.wait().await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = Instant::now();
        p.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_sleeps() {
        let mut p = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            p.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
