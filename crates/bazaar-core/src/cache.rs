//! Expiring in-memory caches with an injectable clock.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner<K, V> {
    entries: HashMap<K, (V, Instant)>,
    last_sweep: Instant,
}

/// Key-value cache whose entries expire a fixed time after insertion.
///
/// Expired entries are never returned. They are physically dropped by a
/// sweep, which runs on access at most once per `sweep_interval`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, sweep_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            ttl,
            sweep_interval,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn maybe_sweep(&self, inner: &mut Inner<K, V>, now: Instant) {
        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            inner.entries.retain(|_, (_, expires)| *expires > now);
            inner.last_sweep = now;
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.maybe_sweep(&mut inner, now);
        inner
            .entries
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(v, _)| v.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.maybe_sweep(&mut inner, now);
        inner.entries.insert(key, (value, now + self.ttl));
    }

    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.lock().entries.remove(key).map(|(v, _)| v)
    }

    pub fn flush(&self) {
        self.lock().entries.clear();
    }

    /// Drop every expired entry now, regardless of the sweep interval.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.entries.retain(|_, (_, expires)| *expires > now);
        inner.last_sweep = now;
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache(clock: &Arc<ManualClock>) -> TtlCache<String, u64> {
        TtlCache::new(6 * HOUR, HOUR / 2, clock.clone())
    }

    #[test]
    fn test_get_put_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let c = cache(&clock);
        c.put("a".to_string(), 1);
        clock.advance(5 * HOUR);
        assert_eq!(c.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_entries_expire() {
        let clock = Arc::new(ManualClock::new());
        let c = cache(&clock);
        c.put("a".to_string(), 1);
        clock.advance(6 * HOUR);
        assert_eq!(c.get(&"a".to_string()), None);
        // The access above was past the sweep interval, so the entry is gone.
        assert!(c.is_empty());
    }

    #[test]
    fn test_expired_entries_linger_until_sweep() {
        let clock = Arc::new(ManualClock::new());
        let c: TtlCache<String, u64> = TtlCache::new(HOUR / 4, HOUR, clock.clone());
        c.put("a".to_string(), 1);
        clock.advance(HOUR / 2);
        assert_eq!(c.get(&"a".to_string()), None);
        assert_eq!(c.len(), 1);
        c.sweep();
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn test_invalidate_and_flush() {
        let clock = Arc::new(ManualClock::new());
        let c = cache(&clock);
        c.put("a".to_string(), 1);
        c.put("b".to_string(), 2);
        assert_eq!(c.invalidate(&"a".to_string()), Some(1));
        assert_eq!(c.get(&"a".to_string()), None);
        assert_eq!(c.get(&"b".to_string()), Some(2));
        c.flush();
        assert!(c.is_empty());
    }
}
