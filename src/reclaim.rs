use parking_lot::Mutex;
use std::sync::Arc;

/// How strongly the cache holds a key or value.
///
/// Non-strong entries may be invalidated out-of-band by the pressure sweeper
/// (`Cache::reclaim`), standing in for an external memory manager clearing a
/// weak or soft reference. `Weak` entries are reclaimed before `Soft` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
  Strong,
  Weak,
  Soft,
}

enum SlotState<V> {
  Live(Arc<V>),
  // The retained value is present only when the key, not the value, was the
  // reclaimable side; it is handed to the removal notification.
  Cleared(Option<Arc<V>>),
}

/// A clearable value holder for entries with a non-strong key or value.
///
/// Clearing happens under the slot's own lock, not the segment lock, so the
/// sweeper never contends with structural mutation. A cleared slot makes its
/// entry logically dead; the owning segment purges it (cause `Collected`)
/// when the reclamation buffer drains.
pub(crate) struct ReclaimableSlot<V> {
  strength: Strength,
  state: Mutex<SlotState<V>>,
}

impl<V> ReclaimableSlot<V> {
  pub(crate) fn new(value: Arc<V>, strength: Strength) -> Self {
    Self {
      strength,
      state: Mutex::new(SlotState::Live(value)),
    }
  }

  pub(crate) fn strength(&self) -> Strength {
    self.strength
  }

  /// Returns the value if the slot has not been cleared.
  pub(crate) fn live(&self) -> Option<Arc<V>> {
    match &*self.state.lock() {
      SlotState::Live(value) => Some(value.clone()),
      SlotState::Cleared(_) => None,
    }
  }

  pub(crate) fn is_cleared(&self) -> bool {
    matches!(&*self.state.lock(), SlotState::Cleared(_))
  }

  /// Clears the slot, returning `true` on the transition and `false` if it
  /// was already cleared. `retain_value` keeps the value alive for the
  /// removal notification (the weak-key, strong-value case).
  pub(crate) fn clear(&self, retain_value: bool) -> bool {
    let mut state = self.state.lock();
    match &*state {
      SlotState::Live(value) => {
        let retained = retain_value.then(|| value.clone());
        *state = SlotState::Cleared(retained);
        true
      }
      SlotState::Cleared(_) => false,
    }
  }

  /// The value to attach to the `Collected` notification, if any survived.
  pub(crate) fn residual(&self) -> Option<Arc<V>> {
    match &*self.state.lock() {
      SlotState::Live(value) => Some(value.clone()),
      SlotState::Cleared(retained) => retained.clone(),
    }
  }
}
