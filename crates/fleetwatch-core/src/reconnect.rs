// ── Reconnection policy ──
//
// Capped exponential backoff with a bounded attempt count, plus the single
// retry timer a session owns. Backoff is deterministic (no jitter): one
// client per trip, so there is no reconnection storm to spread out.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Exponential backoff configuration for subscription reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub base_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Reconnection attempts before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// `delay = min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether another attempt may be scheduled after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// At most one pending delayed retry.
///
/// Scheduling replaces (and so cancels) any timer already pending. Runs on
/// the Tokio clock, so tests drive it with `tokio::time::pause`.
#[derive(Debug, Default)]
pub struct RetryTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, dropping any previously pending deadline.
    pub fn schedule(&mut self, delay: Duration) {
        if self.pending.is_some() {
            tracing::debug!("replacing pending reconnect timer");
        }
        self.pending = Some(Box::pin(tokio::time::sleep(delay)));
    }

    /// Disarm the timer. No-op when nothing is pending.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("reconnect timer cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending timer will fire.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|sleep| sleep.deadline())
    }

    /// Wait for the pending timer and disarm it. Never resolves when
    /// nothing is pending.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(sleep) => {
                sleep.await;
                self.pending = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn delay_sequence_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (0..8).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn huge_attempts_do_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(31), Duration::from_secs(30));
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn custom_policy() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(2));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let mut timer = RetryTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(4));
        assert!(timer.is_pending());

        timer.fired().await;

        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_pending_timer() {
        let mut timer = RetryTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(16));
        timer.schedule(Duration::from_secs(2));
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(2)));

        timer.fired().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timer = RetryTimer::new();
        timer.schedule(Duration::from_secs(1));
        timer.cancel();
        assert!(!timer.is_pending());

        let fired = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(fired.is_err(), "cancelled timer must not fire");
    }
}
