use crate::cache::Cache;
use crate::clock::{SystemTicker, Ticker};
use crate::entry::Expiry;
use crate::error::ConfigError;
use crate::listener::RemovalListener;
use crate::loading::{CacheLoader, LoadingCache};
use crate::notifier::Notifier;
use crate::reclaim::Strength;
use crate::segment::Segment;
use crate::shared::{CacheShared, Config, RemovalDispatch, WeigherFn};
use crate::stats::StatsCounter;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// A builder for [`Cache`] and [`LoadingCache`] instances.
///
/// Construction validates the whole configuration and fails fast with a
/// [`ConfigError`] on conflicting options; nothing is deferred to first use.
pub struct CacheBuilder<K: Send, V: Send, H = ahash::RandomState> {
  concurrency_level: usize,
  maximum_size: Option<u64>,
  maximum_weight: Option<u64>,
  weigher: Option<WeigherFn<K, V>>,
  expire_after_write: Option<Duration>,
  expire_after_access: Option<Duration>,
  key_strength: Strength,
  value_strength: Strength,
  listener: Option<Arc<dyn RemovalListener<K, V>>>,
  async_delivery: bool,
  ticker: Arc<dyn Ticker>,
  record_stats: bool,
  load_wait_timeout: Option<Duration>,
  hasher: H,
}

impl<K: Send, V: Send, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("concurrency_level", &self.concurrency_level)
      .field("maximum_size", &self.maximum_size)
      .field("maximum_weight", &self.maximum_weight)
      .field("expire_after_write", &self.expire_after_write)
      .field("expire_after_access", &self.expire_after_access)
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

// --- General configuration methods ---
impl<K: Send, V: Send, H> CacheBuilder<K, V, H> {
  /// Guides how many independently locked segments the cache is striped
  /// into. Rounded up to a power of two; capped so that a bounded cache
  /// gives every segment room for at least one entry.
  pub fn concurrency_level(mut self, level: usize) -> Self {
    self.concurrency_level = level;
    self
  }

  /// Bounds the cache by entry count, each entry weighing one. Mutually
  /// exclusive with [`maximum_weight`](Self::maximum_weight).
  pub fn maximum_size(mut self, size: u64) -> Self {
    self.maximum_size = Some(size);
    self
  }

  /// Bounds the cache by total weight; requires a
  /// [`weigher`](Self::weigher).
  pub fn maximum_weight(mut self, weight: u64) -> Self {
    self.maximum_weight = Some(weight);
    self
  }

  /// Sets the function that weighs each entry when `maximum_weight` is
  /// configured.
  pub fn weigher(mut self, f: impl Fn(&K, &V) -> u32 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(f));
    self
  }

  /// Entries become invalid `duration` after their last write. Mutually
  /// exclusive with [`expire_after_access`](Self::expire_after_access).
  pub fn expire_after_write(mut self, duration: Duration) -> Self {
    self.expire_after_write = Some(duration);
    self
  }

  /// Entries become invalid `duration` after their last write or read.
  /// Mutually exclusive with
  /// [`expire_after_write`](Self::expire_after_write).
  pub fn expire_after_access(mut self, duration: Duration) -> Self {
    self.expire_after_access = Some(duration);
    self
  }

  /// Holds keys weakly: the pressure sweeper may collect entries
  /// out-of-band.
  pub fn weak_keys(mut self) -> Self {
    self.key_strength = Strength::Weak;
    self
  }

  /// Holds values weakly: the pressure sweeper may clear them out-of-band.
  pub fn weak_values(mut self) -> Self {
    self.value_strength = Strength::Weak;
    self
  }

  /// Holds values softly: cleared by the pressure sweeper only after weak
  /// entries.
  pub fn soft_values(mut self) -> Self {
    self.value_strength = Strength::Soft;
    self
  }

  /// Registers a removal listener, invoked on the mutating thread after the
  /// segment lock is released.
  pub fn removal_listener<L>(mut self, listener: L) -> Self
  where
    L: RemovalListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self.async_delivery = false;
    self
  }

  /// Registers a removal listener with asynchronous delivery on a dedicated
  /// notifier thread.
  pub fn async_removal_listener<L>(mut self, listener: L) -> Self
  where
    L: RemovalListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self.async_delivery = true;
    self
  }

  /// Injects the clock used for expiration. Defaults to the system
  /// monotonic clock.
  pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
    self.ticker = ticker;
    self
  }

  /// Enables hit/miss/load/eviction statistics. Off by default; when off,
  /// [`Cache::stats`] reports zeroes.
  pub fn record_stats(mut self) -> Self {
    self.record_stats = true;
    self
  }

  /// Bounds how long a caller blocks on another caller's in-flight load for
  /// the same key. Unbounded by default; on timeout the wait fails with
  /// `LoadError::WaitTimeout` while the load itself continues.
  pub fn load_wait_timeout(mut self, timeout: Duration) -> Self {
    self.load_wait_timeout = Some(timeout);
    self
  }
}

// --- Default constructor ---
impl<K: Send, V: Send, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a builder with default settings: unbounded, no expiration,
  /// strong keys and values, statistics off.
  pub fn new() -> Self {
    Self {
      concurrency_level: num_cpus::get().max(1),
      maximum_size: None,
      maximum_weight: None,
      weigher: None,
      expire_after_write: None,
      expire_after_access: None,
      key_strength: Strength::Strong,
      value_strength: Strength::Strong,
      listener: None,
      async_delivery: false,
      ticker: Arc::new(SystemTicker),
      record_stats: false,
      load_wait_timeout: None,
      hasher: H::default(),
    }
  }
}

impl<K: Send, V: Send> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Sets the hasher for the cache.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Builds a [`Cache`].
  pub fn build(self) -> Result<Cache<K, V, H>, ConfigError> {
    let shared = self.build_shared()?;
    Ok(Cache { shared })
  }

  /// Builds a [`LoadingCache`] with `loader` bound for `get`, `get_all`,
  /// and `refresh`.
  pub fn build_with_loader<L>(self, loader: L) -> Result<LoadingCache<K, V, H>, ConfigError>
  where
    L: CacheLoader<K, V> + 'static,
  {
    let shared = self.build_shared()?;
    Ok(LoadingCache {
      cache: Cache { shared },
      loader: Arc::new(loader),
    })
  }

  /// Central logic to validate the options and construct the shared core.
  fn build_shared(mut self) -> Result<Arc<CacheShared<K, V, H>>, ConfigError> {
    self.validate()?;

    let bound = self.maximum_size.or(self.maximum_weight);
    let mut segment_count = self.concurrency_level.next_power_of_two();
    if let Some(bound) = bound {
      // Leave every segment room for at least one entry.
      while segment_count > 1 && segment_count as u64 > bound {
        segment_count /= 2;
      }
    }

    let expiry = match (self.expire_after_write, self.expire_after_access) {
      (Some(duration), None) => Expiry::AfterWrite(duration.as_nanos() as u64),
      (None, Some(duration)) => Expiry::AfterAccess(duration.as_nanos() as u64),
      _ => Expiry::Never,
    };

    let config = Config {
      expiry,
      key_strength: self.key_strength,
      value_strength: self.value_strength,
      load_wait_timeout: self.load_wait_timeout,
      bounded: bound.is_some(),
    };

    // Distribute the bound so the per-segment shares sum to it exactly.
    let segment_share = |index: usize| -> Option<u64> {
      bound.map(|bound| {
        let quotient = bound / segment_count as u64;
        let remainder = bound % segment_count as u64;
        if (index as u64) < remainder {
          quotient + 1
        } else {
          quotient
        }
      })
    };

    let segments = (0..segment_count)
      .map(|index| CachePadded::new(Segment::new(self.hasher.clone(), segment_share(index))))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    let (removal, notifier) = match self.listener.take() {
      None => (RemovalDispatch::Disabled, None),
      Some(listener) if self.async_delivery => {
        let (notifier, sender) = Notifier::spawn(listener);
        (RemovalDispatch::Async(sender), Some(notifier))
      }
      Some(listener) => (RemovalDispatch::Sync(listener), None),
    };

    Ok(Arc::new(CacheShared {
      segments,
      hasher: self.hasher,
      config,
      weigher: self.weigher,
      ticker: self.ticker,
      stats: StatsCounter::new(self.record_stats),
      removal,
      notifier,
    }))
  }

  /// Validates the builder configuration.
  fn validate(&self) -> Result<(), ConfigError> {
    if self.concurrency_level == 0 {
      return Err(ConfigError::ZeroConcurrencyLevel);
    }
    if self.maximum_size.is_some() && self.maximum_weight.is_some() {
      return Err(ConfigError::MaximumSizeAndWeight);
    }
    if self.weigher.is_some() && self.maximum_weight.is_none() {
      return Err(ConfigError::WeigherWithoutMaximumWeight);
    }
    if self.maximum_weight.is_some() && self.weigher.is_none() {
      return Err(ConfigError::MaximumWeightWithoutWeigher);
    }
    if self.expire_after_write.is_some() && self.expire_after_access.is_some() {
      return Err(ConfigError::ConflictingExpiration);
    }
    Ok(())
  }
}
