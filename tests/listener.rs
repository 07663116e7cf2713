use loadcache::{CacheBuilder, RemovalCause, RemovalListener};
use std::sync::{mpsc, Arc};
use std::time::Duration;

struct ChannelListener {
  sender: mpsc::Sender<(i32, Option<Arc<String>>, RemovalCause)>,
}

impl RemovalListener<i32, String> for ChannelListener {
  fn on_removal(&self, key: i32, value: Option<Arc<String>>, cause: RemovalCause) {
    self.sender.send((key, value, cause)).unwrap();
  }
}

#[test]
fn sync_listener_runs_on_the_mutating_thread() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .removal_listener(ChannelListener { sender: tx })
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.invalidate(&1);

  // Synchronous delivery: the notification is already in the channel.
  let (key, value, cause) = rx.try_recv().unwrap();
  assert_eq!(key, 1);
  assert_eq!(value, Some(Arc::new("one".to_string())));
  assert_eq!(cause, RemovalCause::Explicit);
}

#[test]
fn async_listener_delivers_on_the_notifier_thread() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .async_removal_listener(ChannelListener { sender: tx })
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.invalidate(&1);

  let (key, value, cause) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(key, 1);
  assert_eq!(value, Some(Arc::new("one".to_string())));
  assert_eq!(cause, RemovalCause::Explicit);
}

struct PanickyListener {
  sender: mpsc::Sender<i32>,
}

impl RemovalListener<i32, String> for PanickyListener {
  fn on_removal(&self, key: i32, _value: Option<Arc<String>>, _cause: RemovalCause) {
    self.sender.send(key).unwrap();
    panic!("listener bug");
  }
}

#[test]
fn listener_panics_do_not_abort_cache_operations() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .removal_listener(PanickyListener { sender: tx })
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.put(2, "two".to_string());
  cache.invalidate(&1);
  cache.invalidate(&2);

  // Both notifications fired despite the first one panicking.
  assert_eq!(rx.try_recv().unwrap(), 1);
  assert_eq!(rx.try_recv().unwrap(), 2);
  assert!(cache.is_empty());
}

#[test]
fn removal_causes_expose_eviction_status() {
  assert!(!RemovalCause::Explicit.was_evicted());
  assert!(!RemovalCause::Replaced.was_evicted());
  assert!(RemovalCause::Expired.was_evicted());
  assert!(RemovalCause::Size.was_evicted());
  assert!(RemovalCause::Collected.was_evicted());
}
