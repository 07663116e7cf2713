use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// The entry was manually invalidated.
  Explicit,
  /// The entry's value was superseded by a `put`.
  Replaced,
  /// The entry expired under the configured time bound.
  Expired,
  /// The entry was evicted to keep the cache within its size/weight bound.
  Size,
  /// The entry's reclaimable key or value was cleared by the pressure sweeper.
  Collected,
}

impl RemovalCause {
  /// Returns `true` when the removal was automatic rather than caller-driven.
  pub fn was_evicted(&self) -> bool {
    matches!(
      self,
      RemovalCause::Expired | RemovalCause::Size | RemovalCause::Collected
    )
  }
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Explicit => write!(f, "manually invalidated"),
      RemovalCause::Replaced => write!(f, "replaced by a newer value"),
      RemovalCause::Expired => write!(f, "expired"),
      RemovalCause::Size => write!(f, "evicted due to size"),
      RemovalCause::Collected => write!(f, "reclaimable reference collected"),
    }
  }
}

/// A listener that receives a notification each time a live entry leaves the
/// cache.
///
/// Notifications are delivered exactly once per removed entry, after the
/// owning segment's lock has been released: on the mutating thread by
/// default, or on a dedicated background thread when the listener was
/// registered with `async_removal_listener`. The value is `None` only when
/// the removal cause is [`RemovalCause::Collected`] and the value itself was
/// the reclaimed side.
///
/// A listener must not call back into the same cache synchronously;
/// reentrancy is undefined behavior by contract. Panics in a listener are
/// contained per notification and never abort the cache operation that
/// triggered them.
pub trait RemovalListener<K, V>: Send + Sync {
  fn on_removal(&self, key: K, value: Option<Arc<V>>, cause: RemovalCause);
}

/// A removal notice queued while a segment lock is held and delivered after
/// it is released.
pub(crate) type Removal<K, V> = (K, Option<Arc<V>>, RemovalCause);
