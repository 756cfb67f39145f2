use crate::types::constants::{DEFAULT_RECONNECT_FALLBACK, RECONNECT_INTERVALS};
use std::time::Duration;
use tokio::time::sleep;

/// Stepped backoff between reconnect attempts
///
/// Walks through the configured intervals and then stays on the last one.
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    attempts: u32,
    intervals: Vec<Duration>,
}

impl ReconnectTimer {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self {
            attempts: 0,
            intervals,
        }
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .intervals
            .get(self.attempts as usize)
            .or(self.intervals.last())
            .copied()
            .unwrap_or(Duration::from_millis(DEFAULT_RECONNECT_FALLBACK));

        self.attempts += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Sleep for the next delay
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        tracing::debug!("Waiting {:?} before reconnect attempt {}", delay, self.attempts);
        sleep(delay).await;
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new(
            RECONNECT_INTERVALS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_then_saturates() {
        let mut timer = ReconnectTimer::default();
        let delays: Vec<u64> = (0..6)
            .map(|_| timer.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 5000, 10000, 10000, 10000]);
        assert_eq!(timer.attempts(), 6);

        timer.reset();
        assert_eq!(timer.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn empty_intervals_use_fallback() {
        let mut timer = ReconnectTimer::new(Vec::new());
        assert_eq!(
            timer.next_delay(),
            Duration::from_millis(DEFAULT_RECONNECT_FALLBACK)
        );
    }
}
