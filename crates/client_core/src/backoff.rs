//! Poll delay schedule: geometric backoff across consecutive
//! heartbeats, snapped back to the floor by any real payload.

use std::time::Duration;

pub const POLL_FLOOR: Duration = Duration::from_secs(1);
pub const POLL_CEILING: Duration = Duration::from_secs(30);
pub const POLL_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct PollBackoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
    multiplier: f64,
}

impl PollBackoff {
    pub fn new(floor: Duration, multiplier: f64, ceiling: Duration) -> Self {
        Self {
            current: floor,
            floor,
            ceiling,
            multiplier,
        }
    }

    pub fn standard() -> Self {
        Self::new(POLL_FLOOR, POLL_MULTIPLIER, POLL_CEILING)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Snapshot or patch arrived: the stream is live, poll eagerly.
    pub fn reset(&mut self) -> Duration {
        self.current = self.floor;
        self.current
    }

    /// Heartbeat: nothing new, stretch the next delay up to the ceiling.
    pub fn bump(&mut self) -> Duration {
        self.current = self.ceiling.min(self.current.mul_f64(self.multiplier));
        self.current
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeats_grow_geometrically_and_clamp() {
        let mut backoff = PollBackoff::standard();
        assert_eq!(backoff.current(), Duration::from_secs(1));
        assert_eq!(backoff.bump(), Duration::from_millis(1500));
        assert_eq!(backoff.bump(), Duration::from_millis(2250));
        assert_eq!(backoff.bump(), Duration::from_millis(3375));

        for _ in 0..32 {
            backoff.bump();
        }
        assert_eq!(backoff.current(), Duration::from_secs(30));
        assert_eq!(backoff.bump(), Duration::from_secs(30));
    }

    #[test]
    fn any_progress_resets_to_the_floor() {
        let mut backoff = PollBackoff::standard();
        backoff.bump();
        backoff.bump();
        assert_eq!(backoff.reset(), Duration::from_secs(1));
        assert_eq!(backoff.bump(), Duration::from_millis(1500));
    }
}
