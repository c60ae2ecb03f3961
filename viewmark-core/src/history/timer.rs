//! A cancellable, resettable one-shot timer driven by explicit time.
//!
//! Nothing here schedules anything. The owner asks [`SettleTimer::deadline`] when to wake up, and calls
//! [`SettleTimer::poll`] with the current time when it does.

use std::time::{Duration, Instant};

/// Source of the current time. Swapped for a manual clock in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Debug)]
pub struct SettleTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl SettleTimer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
    /// Takes effect the next time the timer is armed.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
    /// Start the timer, or restart it with the full delay if already running. There is never more than one
    /// pending deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }
    /// Stop without firing. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
    /// Returns true exactly once, the first time it is polled at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DELAY: Duration = Duration::from_millis(200);

    #[test]
    fn fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = SettleTimer::new(DELAY);
        assert!(!timer.poll(start + DELAY));

        timer.arm(start);
        assert!(!timer.poll(start + Duration::from_millis(199)));
        assert!(timer.poll(start + DELAY));
        // One-shot
        assert!(!timer.poll(start + DELAY * 2));
        assert!(!timer.is_armed());
    }
    #[test]
    fn rearm_resets_to_full_delay() {
        let start = Instant::now();
        let mut timer = SettleTimer::new(DELAY);
        timer.arm(start);
        let later = start + Duration::from_millis(150);
        timer.arm(later);
        assert_eq!(timer.deadline(), Some(later + DELAY));
        // Would have fired under the first arming.
        assert!(!timer.poll(start + DELAY));
        assert!(timer.poll(later + DELAY));
    }
    #[test]
    fn cancel_prevents_firing() {
        let start = Instant::now();
        let mut timer = SettleTimer::new(DELAY);
        timer.arm(start);
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.poll(start + DELAY * 10));
    }
}
