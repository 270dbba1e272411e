use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::constants::HEARTBEAT_JITTER_PERCENT;

/// Heartbeat schedule for one connection.
///
/// Polled from the connection loop's `select!`, so a beat is never sent while a
/// frame is being processed.
pub struct HeartbeatTimer {
    ticker: Interval,
    interval: Duration,
}

impl HeartbeatTimer {
    /// First beat fires slightly before a full interval has elapsed.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(interval: Duration) -> Self {
        let jitter_ms = (interval.as_millis() as f64 * HEARTBEAT_JITTER_PERCENT) as u64;
        let jitter = Duration::from_millis(jitter_ms).min(interval);
        let mut ticker = interval_at(Instant::now() + (interval - jitter), interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker, interval }
    }

    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_beat_before_full_interval() {
        let start = Instant::now();
        let mut timer = HeartbeatTimer::new(Duration::from_millis(1000));

        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(950));

        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1950));
        assert_eq!(timer.interval(), Duration::from_millis(1000));
    }
}
