use loadcache::{CacheBuilder, RemovalCause, RemovalListener};
use std::sync::{mpsc, Arc};

struct TestListener {
  sender: mpsc::Sender<(String, Option<Arc<i32>>, RemovalCause)>,
}

impl RemovalListener<String, i32> for TestListener {
  fn on_removal(&self, key: String, value: Option<Arc<i32>>, cause: RemovalCause) {
    self.sender.send((key, value, cause)).unwrap();
  }
}

#[test]
fn put_then_get_round_trips() {
  let cache = CacheBuilder::<String, i32>::new().build().unwrap();
  cache.put("key1".to_string(), 10);

  assert_eq!(cache.get_if_present(&"key1".to_string()), Some(Arc::new(10)));
  assert!(cache.get_if_present(&"missing".to_string()).is_none());
  assert_eq!(cache.len(), 1);
  assert!(!cache.is_empty());
}

#[test]
fn put_replaces_and_notifies() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .removal_listener(TestListener { sender: tx })
    .build()
    .unwrap();

  cache.put("key1".to_string(), 10);
  cache.put("key1".to_string(), 20);

  assert_eq!(cache.get_if_present(&"key1".to_string()), Some(Arc::new(20)));
  assert_eq!(cache.len(), 1);

  let (key, value, cause) = rx.try_recv().unwrap();
  assert_eq!(key, "key1");
  assert_eq!(value, Some(Arc::new(10)));
  assert_eq!(cause, RemovalCause::Replaced);
  assert!(rx.try_recv().is_err(), "exactly one notification expected");
}

#[test]
fn invalidate_removes_and_notifies_exactly_once() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .removal_listener(TestListener { sender: tx })
    .build()
    .unwrap();

  cache.put("key1".to_string(), 10);
  assert!(cache.invalidate(&"key1".to_string()));
  assert!(
    !cache.invalidate(&"key1".to_string()),
    "double invalidate should report nothing removed"
  );
  assert!(cache.get_if_present(&"key1".to_string()).is_none());

  let (key, value, cause) = rx.try_recv().unwrap();
  assert_eq!(key, "key1");
  assert_eq!(value, Some(Arc::new(10)));
  assert_eq!(cause, RemovalCause::Explicit);
  assert!(rx.try_recv().is_err());
}

#[test]
fn invalidate_keys_removes_each() {
  let cache = CacheBuilder::<String, i32>::new().build().unwrap();
  for i in 0..5 {
    cache.put(format!("key{}", i), i);
  }

  cache.invalidate_keys(vec!["key0".to_string(), "key3".to_string()]);

  assert!(cache.get_if_present(&"key0".to_string()).is_none());
  assert!(cache.get_if_present(&"key3".to_string()).is_none());
  assert_eq!(cache.len(), 3);
}

#[test]
fn invalidate_all_empties_the_cache() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .removal_listener(TestListener { sender: tx })
    .build()
    .unwrap();

  cache.put("key1".to_string(), 1);
  cache.put("key2".to_string(), 2);
  cache.invalidate_all();

  assert!(cache.is_empty());
  let mut causes = Vec::new();
  while let Ok((_, _, cause)) = rx.try_recv() {
    causes.push(cause);
  }
  assert_eq!(causes, vec![RemovalCause::Explicit, RemovalCause::Explicit]);
}

#[test]
fn stats_track_hits_and_misses() {
  let cache = CacheBuilder::<String, i32>::new()
    .record_stats()
    .build()
    .unwrap();

  cache.put("key1".to_string(), 10);
  assert!(cache.get_if_present(&"key1".to_string()).is_some());
  assert!(cache.get_if_present(&"nope".to_string()).is_none());
  assert!(cache.get_if_present(&"nope".to_string()).is_none());

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 1);
  assert_eq!(stats.miss_count, 2);
  assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn stats_stay_zero_when_disabled() {
  let cache = CacheBuilder::<String, i32>::new().build().unwrap();

  cache.put("key1".to_string(), 10);
  assert!(cache.get_if_present(&"key1".to_string()).is_some());
  assert!(cache.get_if_present(&"nope".to_string()).is_none());

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 0);
  assert_eq!(stats.miss_count, 0);
  assert_eq!(stats.hit_rate(), 1.0);
}

#[test]
fn handles_share_state() {
  let cache = CacheBuilder::<String, i32>::new().build().unwrap();
  let clone = cache.clone();

  cache.put("shared".to_string(), 99);
  assert_eq!(clone.get_if_present(&"shared".to_string()), Some(Arc::new(99)));

  clone.invalidate(&"shared".to_string());
  assert!(cache.get_if_present(&"shared".to_string()).is_none());
}
