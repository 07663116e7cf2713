use crate::loader::LoadFuture;
use crate::queue::QueueKind;
use crate::reclaim::ReclaimableSlot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use generational_arena::Index;

/// The frozen expiration mode of a cache instance. The two time bounds are
/// mutually exclusive; the builder rejects a configuration with both.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Expiry {
  Never,
  /// Entries die this many nanoseconds after their last write.
  AfterWrite(u64),
  /// Entries die this many nanoseconds after their last write or read.
  AfterAccess(u64),
}

/// Intrusive links into one of a segment's order queues. Indices, never
/// pointers; a freed arena slot invalidates its generation, so a stale link
/// can never resurrect an entry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Links {
  pub(crate) prev: Option<Index>,
  pub(crate) next: Option<Index>,
}

/// The value position of an entry over its lifecycle.
pub(crate) enum ValueSlot<V> {
  /// An ordinary live value.
  Strong(Arc<V>),
  /// A live value (or dead husk) behind a clearable reference.
  Reclaimable(Arc<ReclaimableSlot<V>>),
  /// A computation in flight; the entry is in the table but in no queue and
  /// carries no weight until the load resolves.
  Loading(Arc<LoadFuture<V>>),
}

impl<V> ValueSlot<V> {
  /// Returns the live value, if this slot currently holds one.
  pub(crate) fn live(&self) -> Option<Arc<V>> {
    match self {
      ValueSlot::Strong(value) => Some(value.clone()),
      ValueSlot::Reclaimable(slot) => slot.live(),
      ValueSlot::Loading(_) => None,
    }
  }

  pub(crate) fn is_loading(&self) -> bool {
    matches!(self, ValueSlot::Loading(_))
  }

  /// The value a removal notification should carry. Differs from [`live`]
  /// only for cleared reclaimable slots that retained their value for the
  /// notification.
  pub(crate) fn notify_value(&self) -> Option<Arc<V>> {
    match self {
      ValueSlot::Strong(value) => Some(value.clone()),
      ValueSlot::Reclaimable(slot) => slot.residual(),
      ValueSlot::Loading(_) => None,
    }
  }
}

/// One key/value slot plus its ordering metadata.
///
/// Owned exclusively by its segment's arena; the table maps the key to this
/// node's index, and the order queues thread through the two link pairs.
pub(crate) struct EntryNode<K, V> {
  pub(crate) key: K,
  pub(crate) hash: u64,
  pub(crate) value: ValueSlot<V>,
  pub(crate) weight: u32,
  pub(crate) write_time: u64,
  /// Refreshed on every read with a plain atomic store; queue order catches
  /// up when the recency buffer drains under the segment write lock.
  pub(crate) access_time: AtomicU64,
  pub(crate) access_links: Links,
  pub(crate) write_links: Links,
}

impl<K, V> EntryNode<K, V> {
  pub(crate) fn new(key: K, hash: u64, value: ValueSlot<V>, weight: u32, now: u64) -> Self {
    Self {
      key,
      hash,
      value,
      weight,
      write_time: now,
      access_time: AtomicU64::new(now),
      access_links: Links::default(),
      write_links: Links::default(),
    }
  }

  /// Updates the last-access timestamp. A cheap atomic store, safe under the
  /// segment read lock.
  #[inline]
  pub(crate) fn touch(&self, now: u64) {
    self.access_time.store(now, Ordering::Relaxed);
  }

  /// Checks whether the entry has outlived the configured time bound.
  #[inline]
  pub(crate) fn is_expired(&self, expiry: Expiry, now: u64) -> bool {
    match expiry {
      Expiry::Never => false,
      Expiry::AfterWrite(bound) => now >= self.write_time.saturating_add(bound),
      Expiry::AfterAccess(bound) => {
        let last = self.access_time.load(Ordering::Relaxed);
        now >= last.saturating_add(bound)
      }
    }
  }

  pub(crate) fn links(&self, kind: QueueKind) -> &Links {
    match kind {
      QueueKind::Access => &self.access_links,
      QueueKind::Write => &self.write_links,
    }
  }

  pub(crate) fn links_mut(&mut self, kind: QueueKind) -> &mut Links {
    match kind {
      QueueKind::Access => &mut self.access_links,
      QueueKind::Write => &mut self.write_links,
    }
  }
}
