//! Bounded fixed-interval polling
//!
//! The device applies scheduled changes on its own clock, so results are
//! observed by re-reading a resource a fixed number of times. If the device is
//! slower than `attempts * interval` the check fails.

use std::time::Duration;

/// Retry policy: at most `attempts` evaluations, `interval` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub attempts: u32,
    pub interval: Duration,
}

impl Retry {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Evaluate once, no waiting
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Evaluate `check` until it returns `true` or attempts run out.
    ///
    /// `check` receives the 1-based attempt number. Errors from `check` stop
    /// polling immediately. At least one attempt is always made.
    pub fn poll<F, E>(&self, mut check: F) -> Result<bool, E>
    where
        F: FnMut(u32) -> Result<bool, E>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            if check(attempt)? {
                return Ok(true);
            }
            tracing::debug!(attempt, attempts, "Condition not met yet");
            if attempt < attempts {
                std::thread::sleep(self.interval);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_succeeds_on_first_match() {
        let mut calls = 0;
        let done = Retry::new(5, Duration::from_millis(1))
            .poll::<_, ()>(|attempt| {
                calls += 1;
                Ok(attempt == 3)
            })
            .unwrap();
        assert!(done);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let mut calls = 0;
        let done = Retry::new(4, Duration::from_millis(1))
            .poll::<_, ()>(|_| {
                calls += 1;
                Ok(false)
            })
            .unwrap();
        assert!(!done);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_zero_attempts_still_checks_once() {
        let mut calls = 0;
        let _ = Retry::new(0, Duration::from_secs(10)).poll::<_, ()>(|_| {
            calls += 1;
            Ok(false)
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_error_stops_polling() {
        let mut calls = 0;
        let result = Retry::new(5, Duration::from_millis(1)).poll(|_| {
            calls += 1;
            Err::<bool, _>("device gone")
        });
        assert_eq!(result, Err("device gone"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_no_sleep_after_last_attempt() {
        let start = Instant::now();
        let _ = Retry::new(2, Duration::from_millis(100)).poll::<_, ()>(|_| Ok(false));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200), "slept {elapsed:?}");
    }
}
