//! Injectable source of "now", used for expiry comparisons and scheduling.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Abstraction over wall-clock time so tests can advance time deterministically
/// instead of sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock whose value tests can set and advance directly.
#[derive(Debug, Clone)]
pub struct TestClock {
    inner: Arc<Mutex<SystemTime>>,
}

impl TestClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `duration` and return the new value.
    pub fn advance(&self, duration: Duration) -> SystemTime {
        let mut guard = self.inner.lock().unwrap();
        *guard += duration;
        *guard
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, at: SystemTime) {
        *self.inner.lock().unwrap() = at;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        *self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances_on_its_own() {
        let clock = SystemClock;
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(1));
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_test_clock_advance() {
        let start = SystemTime::UNIX_EPOCH;
        let clock = TestClock::new(start);
        assert_eq!(clock.now(), start);

        let after = clock.advance(Duration::from_secs(10));
        assert_eq!(after, start + Duration::from_secs(10));
        assert_eq!(clock.now(), start + Duration::from_secs(10));
    }

    #[test]
    fn test_test_clock_set() {
        let clock = TestClock::new(SystemTime::UNIX_EPOCH);
        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
