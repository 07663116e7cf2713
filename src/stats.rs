use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// A thread-safe, internal statistics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
///
/// Recording is gated on the `record_stats` builder flag; when disabled every
/// recorder is a branch and nothing else.
#[derive(Debug)]
pub(crate) struct StatsCounter {
  enabled: bool,
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  load_successes: CachePadded<AtomicU64>,
  load_failures: CachePadded<AtomicU64>,
  total_load_nanos: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
}

impl StatsCounter {
  pub(crate) fn new(enabled: bool) -> Self {
    Self {
      enabled,
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      load_successes: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      total_load_nanos: CachePadded::new(AtomicU64::new(0)),
      evictions: CachePadded::new(AtomicU64::new(0)),
    }
  }

  #[inline]
  pub(crate) fn record_hit(&self) {
    if self.enabled {
      self.hits.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_miss(&self) {
    if self.enabled {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_load_success(&self, nanos: u64) {
    if self.enabled {
      self.load_successes.fetch_add(1, Ordering::Relaxed);
      self.total_load_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_load_failure(&self, nanos: u64) {
    if self.enabled {
      self.load_failures.fetch_add(1, Ordering::Relaxed);
      self.total_load_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_eviction(&self) {
    if self.enabled {
      self.evictions.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current counters.
  pub(crate) fn snapshot(&self) -> CacheStats {
    CacheStats {
      hit_count: self.hits.load(Ordering::Relaxed),
      miss_count: self.misses.load(Ordering::Relaxed),
      load_success_count: self.load_successes.load(Ordering::Relaxed),
      load_error_count: self.load_failures.load(Ordering::Relaxed),
      total_load_nanos: self.total_load_nanos.load(Ordering::Relaxed),
      eviction_count: self.evictions.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's statistics.
///
/// All counts are zero unless statistics were enabled at construction with
/// `record_stats`.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheStats {
  /// The number of lookups that returned a live value.
  pub hit_count: u64,
  /// The number of lookups that found no live value.
  pub miss_count: u64,
  /// The number of loads that produced a value.
  pub load_success_count: u64,
  /// The number of loads that failed (error, panic, or absent value).
  pub load_error_count: u64,
  /// The total nanoseconds spent in loaders, successful or not.
  pub total_load_nanos: u64,
  /// The number of entries evicted by size, expiration, or reclamation.
  pub eviction_count: u64,
}

impl CacheStats {
  /// The ratio of hits to total lookups, or `1.0` with no lookups.
  pub fn hit_rate(&self) -> f64 {
    let lookups = self.hit_count + self.miss_count;
    if lookups == 0 {
      1.0
    } else {
      self.hit_count as f64 / lookups as f64
    }
  }
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("hit_count", &self.hit_count)
      .field("miss_count", &self.miss_count)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate() * 100.0))
      .field("load_success_count", &self.load_success_count)
      .field("load_error_count", &self.load_error_count)
      .field("total_load_nanos", &self.total_load_nanos)
      .field("eviction_count", &self.eviction_count)
      .finish()
  }
}
