//! Per-symbol admission state for the sink feeds.
//!
//! Some kinds are too chatty to store verbatim. The feeds keep a small amount
//! of state per `(exchange, symbol)` to decide what reaches the queue:
//!
//! 1. [`IntervalThrottle`]: funding and open interest. At most one update
//!    per `interval` seconds of receipt time is admitted.
//! 2. [`SnapshotCounter`]: order books. Counts deltas and signals when a
//!    full snapshot should be written alongside them.
//!
//! Neither is thread-safe. Each feed owns its own instances.

use ahash::AHashMap;

/// Map key: `(exchange, symbol)`.
type Key = (String, String);

#[inline]
fn key(exchange: &str, symbol: &str) -> Key {
    (exchange.to_owned(), symbol.to_owned())
}

// ---------------------------------------------------------------------------
// IntervalThrottle: time-based
// ---------------------------------------------------------------------------

/// Admits the first update per key, then at most one every `interval_secs`.
pub struct IntervalThrottle {
    interval_secs: f64,
    last_admitted: AHashMap<Key, f64>,
}

impl IntervalThrottle {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: interval_secs as f64,
            last_admitted: AHashMap::new(),
        }
    }

    /// Returns `true` if an update received at `receipt_secs` should be written.
    ///
    /// If `true`, `receipt_secs` becomes the new reference point for the key.
    #[inline]
    pub fn check_and_update(&mut self, exchange: &str, symbol: &str, receipt_secs: f64) -> bool {
        match self.last_admitted.get_mut(&key(exchange, symbol)) {
            Some(last) if receipt_secs - *last < self.interval_secs => false,
            Some(last) => {
                *last = receipt_secs;
                true
            }
            None => {
                self.last_admitted.insert(key(exchange, symbol), receipt_secs);
                true
            }
        }
    }

    /// Receipt time of the last admitted update for a key, or `None`.
    pub fn last_admitted(&self, exchange: &str, symbol: &str) -> Option<f64> {
        self.last_admitted.get(&key(exchange, symbol)).copied()
    }
}

// ---------------------------------------------------------------------------
// SnapshotCounter: count-based
// ---------------------------------------------------------------------------

/// Counts book deltas per key and fires every `interval` deltas.
pub struct SnapshotCounter {
    interval: u64,
    counts: AHashMap<Key, u64>,
}

impl SnapshotCounter {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            counts: AHashMap::new(),
        }
    }

    /// Record one delta for the key.
    ///
    /// Returns `true` when the count reaches the interval; the count is reset
    /// and the caller should write a full snapshot. An interval of zero
    /// fires on every delta.
    #[inline]
    pub fn record_delta(&mut self, exchange: &str, symbol: &str) -> bool {
        let count = self.counts.entry(key(exchange, symbol)).or_insert(0);
        *count += 1;
        if *count >= self.interval {
            *count = 0;
            true
        } else {
            false
        }
    }

    pub fn count(&self, exchange: &str, symbol: &str) -> u64 {
        self.counts.get(&key(exchange, symbol)).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_throttle_basic() {
        let mut t = IntervalThrottle::new(60);
        assert!(t.check_and_update("X", "BTC-USD", 1000.0));
        assert!(!t.check_and_update("X", "BTC-USD", 1030.0));
        assert!(!t.check_and_update("X", "BTC-USD", 1059.9));
        assert!(t.check_and_update("X", "BTC-USD", 1060.0));
        assert_eq!(t.last_admitted("X", "BTC-USD"), Some(1060.0));
    }

    #[test]
    fn interval_throttle_per_symbol() {
        let mut t = IntervalThrottle::new(60);
        assert!(t.check_and_update("X", "BTC-USD", 1000.0));
        assert!(t.check_and_update("X", "ETH-USD", 1001.0)); // different symbol
        assert!(t.check_and_update("Y", "BTC-USD", 1002.0)); // different exchange
        assert!(!t.check_and_update("X", "BTC-USD", 1003.0));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let mut t = IntervalThrottle::new(0);
        assert!(t.check_and_update("X", "S", 1.0));
        assert!(t.check_and_update("X", "S", 1.0));
    }

    #[test]
    fn snapshot_counter_fires_and_resets() {
        let mut c = SnapshotCounter::new(3);
        assert!(!c.record_delta("X", "S"));
        assert!(!c.record_delta("X", "S"));
        assert!(c.record_delta("X", "S"));
        assert_eq!(c.count("X", "S"), 0);
        assert!(!c.record_delta("X", "S"));
        assert_eq!(c.count("X", "S"), 1);
    }

    #[test]
    fn snapshot_counter_zero_fires_every_delta() {
        let mut c = SnapshotCounter::new(0);
        for _ in 0..10 {
            assert!(c.record_delta("X", "S"));
            assert_eq!(c.count("X", "S"), 0);
        }
    }
}
