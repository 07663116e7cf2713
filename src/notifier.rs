use crate::listener::{Removal, RemovalListener};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 512;

/// The background task that delivers removal notifications when the listener
/// was registered for asynchronous delivery.
pub(crate) struct Notifier<K: Send, V: Send + Sync> {
  _handle: JoinHandle<()>,
  _sender: mpsc::BoundedSender<Removal<K, V>>,
}

impl<K: Send, V: Send + Sync> Notifier<K, V> {
  /// Spawns the notifier thread and returns the sender the cache feeds it
  /// through.
  pub(crate) fn spawn(
    listener: Arc<dyn RemovalListener<K, V>>,
  ) -> (Self, mpsc::BoundedSender<Removal<K, V>>)
  where
    K: 'static,
    V: 'static,
  {
    let (tx, rx): (
      mpsc::BoundedSender<Removal<K, V>>,
      mpsc::BoundedReceiver<Removal<K, V>>,
    ) = mpsc::bounded(NOTIFICATION_CHANNEL_CAPACITY);

    let handle = thread::spawn(move || {
      // Ends when the channel disconnects, i.e. when every sender held by
      // the cache has been dropped.
      while let Ok((key, value, cause)) = rx.recv() {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
          listener.on_removal(key, value, cause);
        }));
      }
    });

    let notifier = Self {
      _handle: handle,
      _sender: tx.clone(),
    };

    (notifier, tx)
  }

  /// Disconnects this side of the channel; the thread exits once the cache's
  /// own senders are gone as well.
  pub(crate) fn stop(self) {
    drop(self._sender);
  }
}
