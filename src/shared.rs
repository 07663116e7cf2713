use crate::clock::Ticker;
use crate::entry::{Expiry, ValueSlot};
use crate::listener::{Removal, RemovalListener};
use crate::notifier::Notifier;
use crate::reclaim::{ReclaimableSlot, Strength};
use crate::segment::Segment;
use crate::stats::StatsCounter;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use fibre::mpsc;

/// The weigher callback: a non-negative weight per entry.
pub(crate) type WeigherFn<K, V> = Arc<dyn Fn(&K, &V) -> u32 + Send + Sync>;

/// The frozen, validated configuration of a cache instance.
#[derive(Debug, Clone)]
pub(crate) struct Config {
  pub(crate) expiry: Expiry,
  pub(crate) key_strength: Strength,
  pub(crate) value_strength: Strength,
  pub(crate) load_wait_timeout: Option<Duration>,
  pub(crate) bounded: bool,
}

impl Config {
  /// The access queue exists for size eviction and for access expiry.
  #[inline]
  pub(crate) fn uses_access_queue(&self) -> bool {
    self.bounded || matches!(self.expiry, Expiry::AfterAccess(_))
  }

  #[inline]
  pub(crate) fn uses_write_queue(&self) -> bool {
    matches!(self.expiry, Expiry::AfterWrite(_))
  }

  #[inline]
  pub(crate) fn reclaimable(&self) -> bool {
    self.key_strength != Strength::Strong || self.value_strength != Strength::Strong
  }
}

/// How removal notifications leave the cache.
pub(crate) enum RemovalDispatch<K: Send, V: Send + Sync> {
  Disabled,
  /// Delivered on the mutating thread, after the segment lock is released.
  Sync(Arc<dyn RemovalListener<K, V>>),
  /// Handed to the notifier thread through a bounded channel.
  Async(mpsc::BoundedSender<Removal<K, V>>),
}

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<K: Send, V: Send + Sync, H> {
  pub(crate) segments: Box<[CachePadded<Segment<K, V, H>>]>,
  pub(crate) hasher: H,
  pub(crate) config: Config,
  pub(crate) weigher: Option<WeigherFn<K, V>>,
  pub(crate) ticker: Arc<dyn Ticker>,
  pub(crate) stats: StatsCounter,
  pub(crate) removal: RemovalDispatch<K, V>,
  pub(crate) notifier: Option<Notifier<K, V>>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("segments", &self.segments.len())
      .field("config", &self.config)
      .field("stats", &self.stats.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send + Sync, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    if let Some(notifier) = self.notifier.take() {
      notifier.stop();
    }
  }
}

impl<K: Send, V: Send + Sync, H> CacheShared<K, V, H> {
  #[inline]
  pub(crate) fn now(&self) -> u64 {
    self.ticker.read()
  }

  /// Segment counts are powers of two, so the low hash bits select one.
  #[inline]
  pub(crate) fn segment_for(&self, hash: u64) -> &Segment<K, V, H> {
    &self.segments[hash as usize & (self.segments.len() - 1)]
  }

  #[inline]
  pub(crate) fn weigh(&self, key: &K, value: &V) -> u32 {
    match &self.weigher {
      Some(weigher) => weigher(key, value),
      None => 1,
    }
  }

  /// Wraps a freshly stored value per the configured reference strength.
  pub(crate) fn make_live_slot(&self, value: Arc<V>) -> ValueSlot<V> {
    if self.config.reclaimable() {
      let strength = if self.config.key_strength == Strength::Weak
        || self.config.value_strength == Strength::Weak
      {
        Strength::Weak
      } else {
        Strength::Soft
      };
      ValueSlot::Reclaimable(Arc::new(ReclaimableSlot::new(value, strength)))
    } else {
      ValueSlot::Strong(value)
    }
  }

  /// Delivers a batch of removal notices collected under a segment lock.
  ///
  /// Listener panics are contained per notification and never reach the
  /// cache operation that produced the batch.
  pub(crate) fn dispatch_removals(&self, removals: Vec<Removal<K, V>>) {
    if removals.is_empty() {
      return;
    }
    match &self.removal {
      RemovalDispatch::Disabled => {}
      RemovalDispatch::Sync(listener) => {
        for (key, value, cause) in removals {
          let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            listener.on_removal(key, value, cause);
          }));
        }
      }
      RemovalDispatch::Async(sender) => {
        for notice in removals {
          let _ = sender.try_send(notice);
        }
      }
    }
  }
}
