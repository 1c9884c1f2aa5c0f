//! Expiration input and per-call insert options

use crate::Clock;
use std::time::{Duration, SystemTime};

/// Caller-facing expiration, resolved against a `Clock` at the point of the call.
#[derive(Debug, Clone, Copy, Default)]
pub enum ExpiresAt {
    /// No expiration
    #[default]
    Never,
    /// An absolute wall-clock timestamp
    At(SystemTime),
    /// A duration from "now", resolved via the store's clock
    In(Duration),
}

impl ExpiresAt {
    /// Resolve to an absolute `SystemTime`, or `None` for "never".
    ///
    /// An expiration at or before `created_at` is treated as "never" (spec.md
    /// forbids `expires_at <= created_at`; historical inputs that violate this
    /// collapse to "never" rather than erroring).
    pub fn resolve(&self, created_at: SystemTime, clock: &dyn Clock) -> Option<SystemTime> {
        let resolved = match self {
            ExpiresAt::Never => return None,
            ExpiresAt::At(at) => *at,
            ExpiresAt::In(duration) => clock.now() + *duration,
        };

        if resolved <= created_at {
            None
        } else {
            Some(resolved)
        }
    }
}

impl From<Duration> for ExpiresAt {
    fn from(duration: Duration) -> Self {
        ExpiresAt::In(duration)
    }
}

impl From<SystemTime> for ExpiresAt {
    fn from(at: SystemTime) -> Self {
        ExpiresAt::At(at)
    }
}
