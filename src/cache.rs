use crate::entry::{EntryNode, ValueSlot};
use crate::error::{DynError, LoadError};
use crate::listener::RemovalCause;
use crate::loader::LoadFuture;
use crate::segment::{hash_key, CleanupCtx, Segment};
use crate::shared::CacheShared;
use crate::stats::CacheStats;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use generational_arena::Arena;

/// What the locked miss path found for the requested key.
enum Claim<V> {
  /// Another caller raced us to a live value.
  Hit(Arc<V>),
  /// A load for this key is already in flight; share its outcome.
  Waiter(Arc<LoadFuture<V>>),
  /// We installed the placeholder and own the load.
  Leader(Arc<LoadFuture<V>>),
}

/// A thread-safe, segment-striped cache.
///
/// Values are stored as `Arc<V>`, so `V` needs no `Clone` bound and readers
/// share the stored allocation. Cloning the handle shares the cache.
pub struct Cache<K: Send, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K: Send, V: Send + Sync, H> Clone for Cache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for Cache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  /// Returns the live value for `key` without triggering a load.
  ///
  /// An entry that is expired, collected, or still loading counts as a miss.
  /// Records hit/miss statistics and opportunistically cleans the key's
  /// segment on the way out.
  pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
    let now = self.shared.now();
    let segment = self.shared.segment_for(hash_key(&self.shared.hasher, key));
    let value = self.read_live(segment, key, now);
    if value.is_some() {
      self.shared.stats.record_hit();
    } else {
      self.shared.stats.record_miss();
    }
    self.post_read_cleanup(segment, now);
    value
  }

  /// Returns the cached value for `key`, running `loader` to compute it on a
  /// miss.
  ///
  /// At most one loader runs per key at a time: concurrent callers for the
  /// same key wait on the in-flight computation and observe its outcome,
  /// success or failure alike. The loader runs on the calling thread, outside
  /// any segment lock. `Ok(Some(v))` caches and returns `v`; `Ok(None)` fails
  /// with [`LoadError::InvalidLoad`]; errors and panics are surfaced as
  /// [`LoadError::Execution`] and [`LoadError::Panicked`] and are never
  /// cached, so a later call retries.
  pub fn get_with<F>(&self, key: &K, loader: F) -> Result<Arc<V>, LoadError>
  where
    F: FnOnce(&K) -> Result<Option<V>, DynError>,
  {
    let now = self.shared.now();
    let hash = hash_key(&self.shared.hasher, key);
    let segment = self.shared.segment_for(hash);

    // Optimistic read-locked fast path.
    if let Some(value) = self.read_live(segment, key, now) {
      self.shared.stats.record_hit();
      return Ok(value);
    }

    let mut removals = Vec::new();
    let claim = {
      let mut guard = segment.inner.write();
      let inner = &mut *guard;
      let ctx = CleanupCtx {
        now,
        config: &self.shared.config,
        stats: &self.shared.stats,
      };
      segment.run_locked_cleanup(inner, &ctx, &mut removals);

      match inner.table.get(key).copied() {
        Some(idx) => {
          enum Found<V> {
            Loading(Arc<LoadFuture<V>>),
            Live(Arc<V>),
            Dead(RemovalCause),
          }
          let found = {
            let node = &inner.entries[idx];
            match &node.value {
              ValueSlot::Loading(future) => Found::Loading(future.clone()),
              slot => match slot.live() {
                Some(value) if !node.is_expired(self.shared.config.expiry, now) => {
                  node.touch(now);
                  Found::Live(value)
                }
                Some(_) => Found::Dead(RemovalCause::Expired),
                None => Found::Dead(RemovalCause::Collected),
              },
            }
          };
          match found {
            Found::Loading(future) => Claim::Waiter(future),
            Found::Live(value) => {
              if self.shared.config.uses_access_queue() {
                inner.access_queue.requeue(&mut inner.entries, idx);
              }
              Claim::Hit(value)
            }
            Found::Dead(cause) => {
              inner.remove_entry(idx, cause, &mut removals);
              ctx.stats.record_eviction();
              Claim::Leader(install_placeholder(inner, key, hash, now))
            }
          }
        }
        None => Claim::Leader(install_placeholder(inner, key, hash, now)),
      }
    };
    self.shared.dispatch_removals(removals);

    match claim {
      Claim::Hit(value) => {
        self.shared.stats.record_hit();
        Ok(value)
      }
      Claim::Waiter(future) => {
        self.shared.stats.record_miss();
        future.wait(self.shared.config.load_wait_timeout)
      }
      Claim::Leader(future) => {
        self.shared.stats.record_miss();
        self.run_load(segment, key, &future, loader)
      }
    }
  }

  /// Inserts or replaces the value for `key`. A superseded live value is
  /// notified with [`RemovalCause::Replaced`].
  pub fn put(&self, key: K, value: V) {
    let _ = self.insert_value(key, value);
  }

  /// Removes the entry for `key`, returning `true` if a live value was
  /// removed. The listener observes [`RemovalCause::Explicit`].
  pub fn invalidate(&self, key: &K) -> bool {
    let now = self.shared.now();
    let segment = self.shared.segment_for(hash_key(&self.shared.hasher, key));
    let mut removals = Vec::new();
    let removed = {
      let mut guard = segment.inner.write();
      let inner = &mut *guard;
      let ctx = CleanupCtx {
        now,
        config: &self.shared.config,
        stats: &self.shared.stats,
      };
      segment.run_locked_cleanup(inner, &ctx, &mut removals);
      match inner.table.get(key).copied() {
        Some(idx) => {
          let was_live = !inner.entries[idx].value.is_loading();
          inner.remove_entry(idx, RemovalCause::Explicit, &mut removals);
          was_live
        }
        None => false,
      }
    };
    self.shared.dispatch_removals(removals);
    removed
  }

  /// Removes the entries for all of `keys`.
  pub fn invalidate_keys<I>(&self, keys: I)
  where
    I: IntoIterator<Item = K>,
  {
    for key in keys {
      self.invalidate(&key);
    }
  }

  /// Removes every entry. Each removed live value is notified with
  /// [`RemovalCause::Explicit`].
  pub fn invalidate_all(&self) {
    let mut removals = Vec::new();
    for segment in self.shared.segments.iter() {
      let mut guard = segment.inner.write();
      segment.clear_buffers();
      let inner = &mut *guard;
      let entries = std::mem::replace(&mut inner.entries, Arena::new());
      inner.table.clear();
      inner.access_queue.reset();
      inner.write_queue.reset();
      inner.total_weight = 0;
      drop(guard);
      for node in entries {
        if !node.value.is_loading() {
          removals.push((node.key, node.value.notify_value(), RemovalCause::Explicit));
        }
      }
    }
    self.shared.dispatch_removals(removals);
  }

  /// The approximate number of entries.
  ///
  /// Sums per-segment counts without a global lock, so the result may be
  /// stale with respect to concurrent mutation.
  pub fn len(&self) -> usize {
    self
      .shared
      .segments
      .iter()
      .map(|segment| segment.inner.read().table.len())
      .sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Runs a full maintenance sweep over every segment: purges collected
  /// entries, folds buffered reads into the access order, and removes
  /// expired entries — without waiting for further cache traffic.
  pub fn clean_up(&self) {
    let now = self.shared.now();
    let mut removals = Vec::new();
    for segment in self.shared.segments.iter() {
      let mut guard = segment.inner.write();
      let ctx = CleanupCtx {
        now,
        config: &self.shared.config,
        stats: &self.shared.stats,
      };
      segment.run_locked_cleanup(&mut guard, &ctx, &mut removals);
    }
    self.shared.dispatch_removals(removals);
  }

  /// A snapshot of the cache's statistics. All counts are zero unless the
  /// cache was built with `record_stats`.
  pub fn stats(&self) -> CacheStats {
    self.shared.stats.snapshot()
  }

  /// Clears up to `max` reclaimable entries, standing in for the memory
  /// manager of a garbage-collected runtime acting under pressure.
  ///
  /// Weak entries are cleared before soft ones. Cleared entries become
  /// unobservable immediately and are purged with [`RemovalCause::Collected`]
  /// as reclamation buffers drain. Returns the number of entries cleared.
  /// A no-op unless the cache was built with a non-strong key or value
  /// strength.
  pub fn reclaim(&self, max: usize) -> usize {
    use crate::reclaim::Strength;

    if !self.shared.config.reclaimable() || max == 0 {
      return 0;
    }
    // A cleared value is gone; it can only ride along in the notification
    // when the key side was the reclaimable one.
    let retain_value = self.shared.config.value_strength == Strength::Strong;
    let mut cleared = 0;
    for pass in [Strength::Weak, Strength::Soft] {
      for segment in self.shared.segments.iter() {
        if cleared >= max {
          break;
        }
        {
          let inner = segment.inner.read();
          for (idx, node) in inner.entries.iter() {
            if cleared >= max {
              break;
            }
            if let ValueSlot::Reclaimable(slot) = &node.value {
              if slot.strength() == pass && slot.clear(retain_value) {
                segment.record_reclaimed(idx);
                cleared += 1;
              }
            }
          }
        }
        self.post_read_cleanup(segment, self.shared.now());
      }
    }
    cleared
  }

  /// Reads a live, non-expired value under the segment read lock, refreshing
  /// recency metadata. Records no statistics.
  pub(crate) fn read_live(
    &self,
    segment: &Segment<K, V, H>,
    key: &K,
    now: u64,
  ) -> Option<Arc<V>> {
    let inner = segment.inner.read();
    let idx = *inner.table.get(key)?;
    let node = &inner.entries[idx];
    let value = node.value.live()?;
    if node.is_expired(self.shared.config.expiry, now) {
      return None;
    }
    if self.shared.config.uses_access_queue() {
      node.touch(now);
      segment.record_read(idx);
    }
    Some(value)
  }

  /// Reads without touching recency or statistics; used to pick up the old
  /// value for a reload.
  pub(crate) fn peek_live(&self, key: &K) -> Option<Arc<V>> {
    let now = self.shared.now();
    let segment = self.shared.segment_for(hash_key(&self.shared.hasher, key));
    let inner = segment.inner.read();
    let idx = *inner.table.get(key)?;
    let node = &inner.entries[idx];
    let value = node.value.live()?;
    if node.is_expired(self.shared.config.expiry, now) {
      return None;
    }
    Some(value)
  }

  /// Inserts and returns the stored `Arc`. Shared by `put`, loads, and bulk
  /// loading.
  pub(crate) fn insert_value(&self, key: K, value: V) -> Arc<V> {
    let now = self.shared.now();
    let weight = self.shared.weigh(&key, &value);
    let value = Arc::new(value);
    let hash = hash_key(&self.shared.hasher, &key);
    let segment = self.shared.segment_for(hash);
    let mut removals = Vec::new();
    {
      let mut inner = segment.inner.write();
      let ctx = CleanupCtx {
        now,
        config: &self.shared.config,
        stats: &self.shared.stats,
      };
      segment.run_locked_cleanup(&mut inner, &ctx, &mut removals);

      let slot = self.shared.make_live_slot(value.clone());
      match inner.table.get(&key).copied() {
        Some(idx) => {
          let node = &mut inner.entries[idx];
          let old_slot = std::mem::replace(&mut node.value, slot);
          let old_weight = std::mem::replace(&mut node.weight, weight) as u64;
          node.write_time = now;
          node.touch(now);
          // A put over a loading placeholder takes the slot; the orphaned
          // load will complete its waiters without installing.
          if !old_slot.is_loading() {
            removals.push((key.clone(), old_slot.notify_value(), RemovalCause::Replaced));
          }
          inner.total_weight = inner.total_weight - old_weight + weight as u64;
          inner.link_live(idx, &self.shared.config);
        }
        None => {
          let node = EntryNode::new(key.clone(), hash, slot, weight, now);
          let idx = inner.entries.insert(node);
          inner.table.insert(key, idx);
          inner.total_weight += weight as u64;
          inner.link_live(idx, &self.shared.config);
        }
      }
      inner.evict_for_size(segment.max_weight, &ctx, &mut removals);
    }
    self.shared.dispatch_removals(removals);
    value
  }

  /// Runs the loader as the single flight for `key` and resolves the shared
  /// placeholder with the outcome.
  fn run_load<F>(
    &self,
    segment: &Segment<K, V, H>,
    key: &K,
    future: &Arc<LoadFuture<V>>,
    loader: F,
  ) -> Result<Arc<V>, LoadError>
  where
    F: FnOnce(&K) -> Result<Option<V>, DynError>,
  {
    let started = self.shared.now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| loader(key)));
    let elapsed = self.shared.now().saturating_sub(started);
    let loaded = match outcome {
      Ok(Ok(Some(value))) => Ok(value),
      Ok(Ok(None)) => Err(LoadError::InvalidLoad),
      Ok(Err(error)) => Err(LoadError::from_dyn(error)),
      Err(payload) => Err(LoadError::from_panic(payload)),
    };
    match loaded {
      Ok(value) => {
        self.shared.stats.record_load_success(elapsed);
        let value = self.store_loaded(segment, key, future, value);
        future.complete(value.clone());
        Ok(value)
      }
      Err(error) => {
        self.shared.stats.record_load_failure(elapsed);
        self.discard_load(segment, key, future);
        future.fail(error.clone());
        Err(error)
      }
    }
  }

  /// Promotes the placeholder entry to a live value, unless a concurrent
  /// `put` or `invalidate` took the slot first — the last writer wins, and a
  /// superseded load completes its waiters without installing.
  fn store_loaded(
    &self,
    segment: &Segment<K, V, H>,
    key: &K,
    future: &Arc<LoadFuture<V>>,
    value: V,
  ) -> Arc<V> {
    let now = self.shared.now();
    let value = Arc::new(value);
    let mut removals = Vec::new();
    {
      let mut inner = segment.inner.write();
      if let Some(idx) = inner.table.get(key).copied() {
        let ours = matches!(
          &inner.entries[idx].value,
          ValueSlot::Loading(installed) if Arc::ptr_eq(installed, future)
        );
        if ours {
          let weight = self.shared.weigh(key, &value);
          let slot = self.shared.make_live_slot(value.clone());
          let node = &mut inner.entries[idx];
          node.value = slot;
          node.weight = weight;
          node.write_time = now;
          node.touch(now);
          inner.total_weight += weight as u64;
          inner.link_live(idx, &self.shared.config);
          let ctx = CleanupCtx {
            now,
            config: &self.shared.config,
            stats: &self.shared.stats,
          };
          inner.evict_for_size(segment.max_weight, &ctx, &mut removals);
        }
      }
    }
    self.shared.dispatch_removals(removals);
    value
  }

  /// Removes the placeholder after a failed load, so the failure is never
  /// cached and the next request retries.
  fn discard_load(&self, segment: &Segment<K, V, H>, key: &K, future: &Arc<LoadFuture<V>>) {
    let mut inner = segment.inner.write();
    if let Some(idx) = inner.table.get(key).copied() {
      let ours = matches!(
        &inner.entries[idx].value,
        ValueSlot::Loading(installed) if Arc::ptr_eq(installed, future)
      );
      if ours {
        // Placeholders are in no queue and carry no weight; nothing to
        // notify.
        let mut removals = Vec::new();
        inner.remove_entry(idx, RemovalCause::Explicit, &mut removals);
        debug_assert!(removals.is_empty());
      }
    }
  }

  /// Opportunistic maintenance after a read: only if there is work and the
  /// write lock is free right now.
  fn post_read_cleanup(&self, segment: &Segment<K, V, H>, now: u64) {
    if !segment.needs_cleanup(&self.shared.config) {
      return;
    }
    let Some(mut inner) = segment.inner.try_write() else {
      return;
    };
    let mut removals = Vec::new();
    let ctx = CleanupCtx {
      now,
      config: &self.shared.config,
      stats: &self.shared.stats,
    };
    segment.run_locked_cleanup(&mut inner, &ctx, &mut removals);
    drop(inner);
    self.shared.dispatch_removals(removals);
  }
}

/// Installs a loading placeholder for `key` under the caller's write lock.
fn install_placeholder<K, V, H>(
  inner: &mut crate::segment::SegmentInner<K, V, H>,
  key: &K,
  hash: u64,
  now: u64,
) -> Arc<LoadFuture<V>>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  let future = Arc::new(LoadFuture::new());
  let node = EntryNode::new(key.clone(), hash, ValueSlot::Loading(future.clone()), 0, now);
  let idx = inner.entries.insert(node);
  inner.table.insert(key.clone(), idx);
  future
}
