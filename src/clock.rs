use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A monotonic nanosecond clock source.
///
/// The cache reads time exclusively through this trait so that expiration
/// behavior can be tested deterministically with a [`ManualTicker`].
pub trait Ticker: Send + Sync {
  /// Returns the current time in nanoseconds since an arbitrary fixed origin.
  fn read(&self) -> u64;
}

/// The default [`Ticker`], backed by `Instant` relative to a process-wide epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTicker;

impl Ticker for SystemTicker {
  #[inline]
  fn read(&self) -> u64 {
    Instant::now().saturating_duration_since(*CACHE_EPOCH).as_nanos() as u64
  }
}

/// A hand-advanced [`Ticker`] for deterministic expiration tests.
///
/// Time starts at zero and only moves when [`ManualTicker::advance`] is called.
#[derive(Debug, Default)]
pub struct ManualTicker {
  nanos: AtomicU64,
}

impl ManualTicker {
  pub fn new() -> Self {
    Self {
      nanos: AtomicU64::new(0),
    }
  }

  /// Moves the clock forward by `duration`.
  pub fn advance(&self, duration: Duration) {
    self
      .nanos
      .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
  }
}

impl Ticker for ManualTicker {
  #[inline]
  fn read(&self) -> u64 {
    self.nanos.load(Ordering::SeqCst)
  }
}
