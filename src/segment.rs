use crate::entry::{EntryNode, Expiry, ValueSlot};
use crate::listener::{Removal, RemovalCause};
use crate::loader::LoadFuture;
use crate::queue::{OrderQueue, QueueKind};
use crate::shared::Config;
use crate::stats::StatsCounter;

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use generational_arena::{Arena, Index};
use parking_lot::{Mutex, RwLock};

/// The most read entries a segment will buffer before queue reordering
/// catches up. Overflowing reads still refresh the entry's access timestamp,
/// so expiration stays exact; only the LRU ordering becomes approximate.
const RECENCY_BUFFER_LIMIT: usize = 64;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// Everything the cleanup routines need besides the segment itself.
pub(crate) struct CleanupCtx<'a> {
  pub(crate) now: u64,
  pub(crate) config: &'a Config,
  pub(crate) stats: &'a StatsCounter,
}

/// The lock-guarded structural state of one segment.
pub(crate) struct SegmentInner<K, V, H> {
  /// Maps each key to its entry's arena index.
  pub(crate) table: HashMap<K, Index, H>,
  /// Owns every entry of this segment.
  pub(crate) entries: Arena<EntryNode<K, V>>,
  /// Recency order; present entries are candidates for size eviction and,
  /// under expire-after-access, for expiration.
  pub(crate) access_queue: OrderQueue,
  /// Strict write order; populated only under expire-after-write.
  pub(crate) write_queue: OrderQueue,
  /// Sum of the weights of all live entries.
  pub(crate) total_weight: u64,
}

impl<K, V, H> SegmentInner<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  fn new(hasher: H) -> Self {
    Self {
      table: HashMap::with_hasher(hasher),
      entries: Arena::new(),
      access_queue: OrderQueue::new(QueueKind::Access),
      write_queue: OrderQueue::new(QueueKind::Write),
      total_weight: 0,
    }
  }

  /// Unlinks and frees the entry at `idx`, queueing a removal notice unless
  /// the entry was a loading placeholder (which never held a live value).
  pub(crate) fn remove_entry(
    &mut self,
    idx: Index,
    cause: RemovalCause,
    removals: &mut Vec<Removal<K, V>>,
  ) {
    self.access_queue.unlink(&mut self.entries, idx);
    self.write_queue.unlink(&mut self.entries, idx);
    if let Some(node) = self.entries.remove(idx) {
      self.table.remove(&node.key);
      self.total_weight -= node.weight as u64;
      if !node.value.is_loading() {
        removals.push((node.key, node.value.notify_value(), cause));
      }
    }
  }

  /// Places a live entry at the fresh end of whichever queues the
  /// configuration maintains.
  pub(crate) fn link_live(&mut self, idx: Index, config: &Config) {
    if config.uses_access_queue() {
      self.access_queue.requeue(&mut self.entries, idx);
    }
    if config.uses_write_queue() {
      self.write_queue.requeue(&mut self.entries, idx);
    }
  }

  /// Sweeps expired entries off the head of the relevant order queue.
  ///
  /// Both queues are oldest-first, so the sweep stops at the first live
  /// head.
  pub(crate) fn expire(&mut self, ctx: &CleanupCtx<'_>, removals: &mut Vec<Removal<K, V>>) {
    let queue_kind = match ctx.config.expiry {
      Expiry::Never => return,
      Expiry::AfterWrite(_) => QueueKind::Write,
      Expiry::AfterAccess(_) => QueueKind::Access,
    };
    loop {
      let head = match queue_kind {
        QueueKind::Write => self.write_queue.peek_front(),
        QueueKind::Access => self.access_queue.peek_front(),
      };
      let Some(idx) = head else { break };
      if !self.entries[idx].is_expired(ctx.config.expiry, ctx.now) {
        break;
      }
      self.remove_entry(idx, RemovalCause::Expired, removals);
      ctx.stats.record_eviction();
    }
  }

  /// Evicts least-recently-used entries until the segment is back under its
  /// weight share. Runs under the same lock as the insertion that pushed it
  /// over.
  pub(crate) fn evict_for_size(
    &mut self,
    max_weight: Option<u64>,
    ctx: &CleanupCtx<'_>,
    removals: &mut Vec<Removal<K, V>>,
  ) {
    let Some(max_weight) = max_weight else { return };
    while self.total_weight > max_weight {
      let Some(idx) = self.access_queue.peek_front() else {
        break;
      };
      self.remove_entry(idx, RemovalCause::Size, removals);
      ctx.stats.record_eviction();
    }
  }
}

/// One independently lockable shard of the cache.
///
/// Structural mutation happens under `inner`'s write lock; reads take the
/// read lock and leave breadcrumbs in the side buffers, which the next
/// locked cleanup folds back in.
pub(crate) struct Segment<K, V, H> {
  /// This segment's share of the global weight bound.
  pub(crate) max_weight: Option<u64>,
  pub(crate) inner: RwLock<SegmentInner<K, V, H>>,
  /// Indices of recently read entries awaiting an access-queue relink.
  recency: Mutex<Vec<Index>>,
  /// Indices whose reclaimable reference was cleared out-of-band.
  reclaimed: Mutex<Vec<Index>>,
  /// In-flight asynchronous reloads, one per key.
  pub(crate) refreshes: Mutex<HashMap<K, Arc<LoadFuture<V>>, H>>,
}

impl<K, V, H> Segment<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(hasher: H, max_weight: Option<u64>) -> Self {
    Self {
      max_weight,
      inner: RwLock::new(SegmentInner::new(hasher.clone())),
      recency: Mutex::new(Vec::new()),
      reclaimed: Mutex::new(Vec::new()),
      refreshes: Mutex::new(HashMap::with_hasher(hasher)),
    }
  }
}

impl<K, V, H> Segment<K, V, H> {
  /// Records a read for later access-queue reordering. Bounded; a full
  /// buffer drops the record rather than stalling the reader.
  pub(crate) fn record_read(&self, idx: Index) {
    let mut buffer = self.recency.lock();
    if buffer.len() < RECENCY_BUFFER_LIMIT {
      buffer.push(idx);
    }
  }

  /// Records that an entry's reclaimable reference was cleared.
  pub(crate) fn record_reclaimed(&self, idx: Index) {
    self.reclaimed.lock().push(idx);
  }

  pub(crate) fn clear_buffers(&self) {
    self.recency.lock().clear();
    self.reclaimed.lock().clear();
  }

  /// Whether an opportunistic cleanup would have anything to do.
  pub(crate) fn needs_cleanup(&self, config: &Config) -> bool {
    !matches!(config.expiry, Expiry::Never)
      || !self.recency.lock().is_empty()
      || !self.reclaimed.lock().is_empty()
  }
}

impl<K, V, H> Segment<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  /// The full per-segment maintenance pass, run under the write lock held by
  /// the caller: purge collected entries first, fold buffered reads into the
  /// access queue, then sweep expired entries.
  pub(crate) fn run_locked_cleanup(
    &self,
    inner: &mut SegmentInner<K, V, H>,
    ctx: &CleanupCtx<'_>,
    removals: &mut Vec<Removal<K, V>>,
  ) {
    self.drain_reclaimed(inner, ctx, removals);
    self.drain_recency(inner, ctx);
    inner.expire(ctx, removals);
  }

  fn drain_reclaimed(
    &self,
    inner: &mut SegmentInner<K, V, H>,
    ctx: &CleanupCtx<'_>,
    removals: &mut Vec<Removal<K, V>>,
  ) {
    let drained = {
      let mut buffer = self.reclaimed.lock();
      if buffer.is_empty() {
        return;
      }
      std::mem::take(&mut *buffer)
    };
    for idx in drained {
      // The generation in the index protects against slot reuse; the
      // cleared check protects against the slot having been replaced by a
      // fresh value in the meantime.
      let dead = matches!(
        inner.entries.get(idx),
        Some(node) if matches!(&node.value, ValueSlot::Reclaimable(slot) if slot.is_cleared())
      );
      if dead {
        inner.remove_entry(idx, RemovalCause::Collected, removals);
        ctx.stats.record_eviction();
      }
    }
  }

  fn drain_recency(&self, inner: &mut SegmentInner<K, V, H>, ctx: &CleanupCtx<'_>) {
    let drained = {
      let mut buffer = self.recency.lock();
      if buffer.is_empty() {
        return;
      }
      std::mem::take(&mut *buffer)
    };
    if !ctx.config.uses_access_queue() {
      return;
    }
    for idx in drained {
      let live = matches!(inner.entries.get(idx), Some(node) if !node.value.is_loading());
      if live {
        inner.access_queue.requeue(&mut inner.entries, idx);
      }
    }
  }
}
