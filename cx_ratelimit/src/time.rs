use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall-clock source for window arithmetic
///
/// Windows are derived from unix seconds so that every process sharing a counter store
/// lands on the same window index. `Manual` exists so window boundaries can be crossed in tests.
#[derive(Debug, Clone, Default)]
pub enum TimeSource {
    #[default]
    System,
    Manual(Arc<AtomicU64>),
}

impl TimeSource {
    /// Manual clock starting at `unix_secs`
    pub fn manual(unix_secs: u64) -> Self {
        TimeSource::Manual(Arc::new(AtomicU64::new(unix_secs)))
    }

    /// Current unix time in whole seconds
    #[inline]
    pub fn now_secs(&self) -> u64 {
        match self {
            TimeSource::System => SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0),
            TimeSource::Manual(secs) => secs.load(Ordering::Acquire),
        }
    }

    /// Move a manual clock forward; no-op for the system clock
    pub fn advance(&self, secs: u64) {
        if let TimeSource::Manual(now) = self {
            now.fetch_add(secs, Ordering::AcqRel);
        }
    }

    /// Set a manual clock; no-op for the system clock
    pub fn set(&self, unix_secs: u64) {
        if let TimeSource::Manual(now) = self {
            now.store(unix_secs, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(TimeSource::System.now_secs() > 1_577_836_800);
    }

    #[test]
    fn test_manual_clock() {
        let clock = TimeSource::manual(1_609_459_200);
        assert_eq!(clock.now_secs(), 1_609_459_200);

        let shared = clock.clone();
        shared.advance(300);
        assert_eq!(clock.now_secs(), 1_609_459_500);

        clock.set(42);
        assert_eq!(shared.now_secs(), 42);
    }

    #[test]
    fn test_system_clock_ignores_adjustments() {
        let clock = TimeSource::System;
        clock.set(0);
        assert!(clock.now_secs() > 0);
    }
}
