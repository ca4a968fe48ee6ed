use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Global requests-per-second cap shared by every VU.
///
/// Permits are evenly spaced at `1s / rps`. A VU that stalls does not earn
/// credit: missed ticks are delayed, never replayed as a burst.
pub struct RateLimiter {
    rps: u32,
    ticker: Mutex<Interval>,
}

impl RateLimiter {
    /// Must be called inside a tokio runtime.
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        let mut ticker = interval(Self::period_for(rps));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            rps,
            ticker: Mutex::new(ticker),
        }
    }

    pub fn period_for(rps: u32) -> Duration {
        Duration::from_nanos((1_000_000_000 / u64::from(rps.max(1))).max(1))
    }

    pub fn rps(&self) -> u32 {
        self.rps
    }

    pub async fn acquire(&self) {
        self.ticker.lock().await.tick().await;
    }
}
