use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Something that can put the current thread to sleep
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps for real
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retries an operation with exponentially growing pauses.
///
/// Every error is treated as transient (rate limiting is the usual
/// culprit). Calls whose failure carries meaning must not go through here.
/// This blocks the calling thread, so never use it on the UI thread.
#[derive(Clone)]
pub struct Backoff {
    max_attempts: u32,
    base: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff")
            .field("max_attempts", &self.max_attempts)
            .field("base", &self.base)
            .finish()
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause taken after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent)
    }

    pub fn fetch<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    debug!(
                        "query failed ({}/{}), giving up: {}",
                        attempt, self.max_attempts, err
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        "query error ({}/{}), retrying in {:?}: {}",
                        attempt, self.max_attempts, delay, err
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn backoff_with_recorder() -> (Backoff, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let backoff = Backoff::new(10, Duration::from_secs(1)).with_sleeper(sleeper.clone());
        (backoff, sleeper)
    }

    #[test]
    fn test_success_returns_immediately() {
        let (backoff, sleeper) = backoff_with_recorder();
        let result: Result<u32, String> = backoff.fetch(|| Ok(7));
        assert_eq!(result, Ok(7));
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fails_k_times_then_succeeds() {
        for failures in 1..10u32 {
            let (backoff, sleeper) = backoff_with_recorder();
            let mut calls = 0;
            let result: Result<&str, String> = backoff.fetch(|| {
                calls += 1;
                if calls <= failures {
                    Err(format!("throttled #{calls}"))
                } else {
                    Ok("value")
                }
            });

            assert_eq!(result, Ok("value"));
            assert_eq!(calls, failures + 1);

            let slept: Duration = sleeper.slept.lock().unwrap().iter().sum();
            let expected = Duration::from_secs((1u64 << failures) - 1);
            assert_eq!(slept, expected, "after {failures} failures");
        }
    }

    #[test]
    fn test_always_failing_stops_at_ceiling() {
        let (backoff, sleeper) = backoff_with_recorder();
        let mut calls = 0;
        let result: Result<(), String> = backoff.fetch(|| {
            calls += 1;
            Err(format!("attempt {calls}"))
        });

        assert_eq!(calls, 10);
        assert_eq!(result, Err("attempt 10".to_string()));
        // No pause after the final attempt
        assert_eq!(sleeper.slept.lock().unwrap().len(), 9);
    }

    #[test]
    fn test_delays_double() {
        let backoff = Backoff::new(10, Duration::from_millis(5));
        assert_eq!(backoff.delay_after(1), Duration::from_millis(5));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(10));
        assert_eq!(backoff.delay_after(4), Duration::from_millis(40));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let backoff = Backoff::new(0, Duration::ZERO);
        let mut calls = 0;
        let _: Result<(), &str> = backoff.fetch(|| {
            calls += 1;
            Err("nope")
        });
        assert_eq!(calls, 1);
    }
}
