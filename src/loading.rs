use crate::cache::Cache;
use crate::error::{DynError, LoadError};
use crate::loader::{LoadFuture, PendingLoad};
use crate::segment::hash_key;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use ahash::{HashMap, HashMapExt};

/// Computes values for a [`LoadingCache`].
///
/// `load` may fail with any boxed error; `Ok(None)` means the loader could
/// not produce a value, which the cache surfaces as
/// [`LoadError::InvalidLoad`].
pub trait CacheLoader<K, V>: Send + Sync {
  /// Computes the value for `key`.
  fn load(&self, key: &K) -> Result<Option<V>, DynError>;

  /// Recomputes the value for a key that is already cached, given the value
  /// being replaced. Defaults to [`CacheLoader::load`].
  fn reload(&self, key: &K, old_value: Arc<V>) -> Result<Option<V>, DynError> {
    let _ = old_value;
    self.load(key)
  }

  /// Computes values for a batch of keys at once.
  ///
  /// Returning `None` signals that bulk loading is unsupported; `get_all`
  /// then falls back to loading each key individually. The returned pairs
  /// may include keys that were not requested; all of them are cached.
  fn load_all(&self, keys: &[K]) -> Option<Result<Vec<(K, V)>, DynError>> {
    let _ = keys;
    None
  }
}

/// A [`CacheLoader`] built from a plain function.
pub struct LoaderFn<F>(F);

/// Wraps a function as a [`CacheLoader`] with the default `reload` and
/// `load_all` behavior.
pub fn loader_fn<K, V, F>(f: F) -> LoaderFn<F>
where
  F: Fn(&K) -> Result<Option<V>, DynError> + Send + Sync,
{
  LoaderFn(f)
}

impl<K, V, F> CacheLoader<K, V> for LoaderFn<F>
where
  F: Fn(&K) -> Result<Option<V>, DynError> + Send + Sync,
{
  fn load(&self, key: &K) -> Result<Option<V>, DynError> {
    (self.0)(key)
  }
}

/// A [`Cache`] with a loader bound at construction.
///
/// Dereferences to the underlying cache, so every façade operation is
/// available alongside the loading ones.
pub struct LoadingCache<K: Send, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) cache: Cache<K, V, H>,
  pub(crate) loader: Arc<dyn CacheLoader<K, V>>,
}

impl<K: Send, V: Send + Sync, H> Clone for LoadingCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      loader: self.loader.clone(),
    }
  }
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for LoadingCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache")
      .field("cache", &self.cache)
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send + Sync, H> Deref for LoadingCache<K, V, H> {
  type Target = Cache<K, V, H>;

  fn deref(&self) -> &Self::Target {
    &self.cache
  }
}

impl<K, V, H> LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  /// Returns the value for `key`, loading it with the bound loader on a
  /// miss. Single-flight: concurrent callers for one key share one load.
  pub fn get(&self, key: &K) -> Result<Arc<V>, LoadError> {
    self.cache.get_with(key, |key| self.loader.load(key))
  }

  /// Returns the values for `keys`, loading the missing ones.
  ///
  /// Missing keys go through the loader's `load_all` when it supports bulk
  /// loading; every returned pair is cached, and a requested key absent from
  /// the bulk result fails the call with [`LoadError::InvalidLoad`]. When
  /// bulk loading is unsupported, each missing key is loaded individually.
  pub fn get_all<I>(&self, keys: I) -> Result<HashMap<K, Arc<V>>, LoadError>
  where
    I: IntoIterator<Item = K>,
  {
    let mut found = HashMap::new();
    let mut missing: Vec<K> = Vec::new();
    for key in keys {
      if found.contains_key(&key) || missing.contains(&key) {
        continue;
      }
      match self.cache.get_if_present(&key) {
        Some(value) => {
          found.insert(key, value);
        }
        None => missing.push(key),
      }
    }
    if missing.is_empty() {
      return Ok(found);
    }

    let shared = &self.cache.shared;
    let started = shared.now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.loader.load_all(&missing)));
    let elapsed = shared.now().saturating_sub(started);
    match outcome {
      Ok(Some(Ok(pairs))) => {
        shared.stats.record_load_success(elapsed);
        let mut loaded = HashMap::new();
        for (key, value) in pairs {
          let value = self.cache.insert_value(key.clone(), value);
          loaded.insert(key, value);
        }
        for key in missing {
          match loaded.remove(&key) {
            Some(value) => {
              found.insert(key, value);
            }
            None => return Err(LoadError::InvalidLoad),
          }
        }
        Ok(found)
      }
      Ok(Some(Err(error))) => {
        shared.stats.record_load_failure(elapsed);
        Err(LoadError::from_dyn(error))
      }
      Ok(None) => {
        // Bulk loading unsupported; fall back to individual loads.
        for key in missing {
          let value = self.get(&key)?;
          found.insert(key, value);
        }
        Ok(found)
      }
      Err(payload) => {
        shared.stats.record_load_failure(elapsed);
        Err(LoadError::from_panic(payload))
      }
    }
  }
}

impl<K, V, H> LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Starts an asynchronous reload of `key` and returns immediately.
  ///
  /// The cached value, if any, keeps being served until the reload resolves;
  /// it is then replaced (notifying [`RemovalCause::Replaced`]). A failed
  /// reload leaves the old value untouched. Concurrent refreshes of the same
  /// key coalesce onto one in-flight reload.
  ///
  /// [`RemovalCause::Replaced`]: crate::RemovalCause::Replaced
  pub fn refresh(&self, key: &K) -> PendingLoad<V> {
    let shared = &self.cache.shared;
    let segment = shared.segment_for(hash_key(&shared.hasher, key));

    let (future, is_leader) = {
      let mut refreshes = segment.refreshes.lock();
      match refreshes.get(key) {
        Some(existing) => (existing.clone(), false),
        None => {
          let future = Arc::new(LoadFuture::new());
          refreshes.insert(key.clone(), future.clone());
          (future, true)
        }
      }
    };
    if !is_leader {
      return PendingLoad::new(future);
    }

    let old_value = self.cache.peek_live(key);
    let cache = self.cache.clone();
    let loader = self.loader.clone();
    let key = key.clone();
    let reload_future = future.clone();
    thread::spawn(move || {
      run_reload(cache, loader, key, old_value, reload_future);
    });
    PendingLoad::new(future)
  }
}

/// The body of a refresh thread: run the reload, install on success, and
/// resolve the shared future either way.
fn run_reload<K, V, H>(
  cache: Cache<K, V, H>,
  loader: Arc<dyn CacheLoader<K, V>>,
  key: K,
  old_value: Option<Arc<V>>,
  future: Arc<LoadFuture<V>>,
) where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  let shared = &cache.shared;
  let started = shared.now();
  let outcome = panic::catch_unwind(AssertUnwindSafe(|| match old_value {
    Some(old) => loader.reload(&key, old),
    None => loader.load(&key),
  }));
  let elapsed = shared.now().saturating_sub(started);
  let loaded = match outcome {
    Ok(Ok(Some(value))) => Ok(value),
    Ok(Ok(None)) => Err(LoadError::InvalidLoad),
    Ok(Err(error)) => Err(LoadError::from_dyn(error)),
    Err(payload) => Err(LoadError::from_panic(payload)),
  };
  let result = match loaded {
    Ok(value) => {
      shared.stats.record_load_success(elapsed);
      Ok(cache.insert_value(key.clone(), value))
    }
    Err(error) => {
      shared.stats.record_load_failure(elapsed);
      Err(error)
    }
  };

  let segment = shared.segment_for(hash_key(&shared.hasher, &key));
  segment.refreshes.lock().remove(&key);

  match result {
    Ok(value) => future.complete(value),
    Err(error) => future.fail(error),
  }
}
