//! Leading-edge rate limiting of the auto-fill trigger.
//!
//! The first trigger arms a fire at `now + window`; triggers while armed
//! are absorbed. A burst of resource updates thus costs one pass per window.

use crate::clock::Timestamp;

#[derive(Clone, Debug)]
pub struct RateLimiter {
    window_ms: i64,
    /// When the pending pass fires.
    due_at: Option<Timestamp>,
    absorbed: usize,
}

impl RateLimiter {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms as i64,
            due_at: None,
            absorbed: 0,
        }
    }

    /// Returns true when this trigger armed a new pass.
    pub fn trigger(&mut self, now: Timestamp) -> bool {
        if self.due_at.is_some() {
            self.absorbed += 1;
            return false;
        }
        self.due_at = Some(now + self.window_ms);
        true
    }

    /// Whether the armed pass should run now. Disarms when it does.
    ///
    /// Yields the number of triggers coalesced into the pass.
    pub fn due(&mut self, now: Timestamp) -> Option<usize> {
        match self.due_at {
            Some(at) if now >= at => {
                self.due_at = None;
                Some(std::mem::take(&mut self.absorbed) + 1)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
        self.absorbed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_coalesces_into_one_pass() {
        let mut limiter = RateLimiter::new(100);
        assert!(limiter.trigger(1_000));
        for t in 1_001..1_050 {
            assert!(!limiter.trigger(t));
        }
        assert_eq!(limiter.due(1_099), None);
        assert_eq!(limiter.due(1_100), Some(50));
        assert_eq!(limiter.due(1_200), None);
        assert!(!limiter.is_pending());
    }

    #[test]
    fn test_trigger_after_fire_rearms() {
        let mut limiter = RateLimiter::new(100);
        limiter.trigger(0);
        limiter.due(100);
        assert!(limiter.trigger(150));
        assert_eq!(limiter.due(250), Some(1));
    }

    #[test]
    fn test_cancel() {
        let mut limiter = RateLimiter::new(100);
        limiter.trigger(0);
        limiter.cancel();
        assert_eq!(limiter.due(1_000), None);
    }
}
