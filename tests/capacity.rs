use loadcache::{CacheBuilder, RemovalCause, RemovalListener};
use std::sync::{mpsc, Arc};

struct TestListener {
  sender: mpsc::Sender<(String, Option<Arc<String>>, RemovalCause)>,
}

impl RemovalListener<String, String> for TestListener {
  fn on_removal(&self, key: String, value: Option<Arc<String>>, cause: RemovalCause) {
    self.sender.send((key, value, cause)).unwrap();
  }
}

fn entry(n: u32) -> (String, String) {
  (format!("key{}", n), format!("value{}", n))
}

#[test]
fn size_bound_evicts_the_least_recently_used() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .maximum_size(2)
    .concurrency_level(1)
    .removal_listener(TestListener { sender: tx })
    .build()
    .unwrap();

  // Insert A, B, C with no reads in between: A is the LRU victim.
  for n in 0..3 {
    let (key, value) = entry(n);
    cache.put(key, value);
  }

  assert_eq!(cache.len(), 2);
  assert!(cache.get_if_present(&"key0".to_string()).is_none());
  assert!(cache.get_if_present(&"key1".to_string()).is_some());
  assert!(cache.get_if_present(&"key2".to_string()).is_some());

  let (key, value, cause) = rx.try_recv().unwrap();
  assert_eq!(key, "key0");
  assert_eq!(value, Some(Arc::new("value0".to_string())));
  assert_eq!(cause, RemovalCause::Size);
  assert!(rx.try_recv().is_err());
}

#[test]
fn reads_protect_entries_from_eviction() {
  let cache = CacheBuilder::<String, String>::new()
    .maximum_size(2)
    .concurrency_level(1)
    .build()
    .unwrap();

  let (key0, value0) = entry(0);
  let (key1, value1) = entry(1);
  cache.put(key0.clone(), value0);
  cache.put(key1, value1);

  // Touch key0; key1 becomes the eviction victim.
  assert!(cache.get_if_present(&key0).is_some());
  let (key2, value2) = entry(2);
  cache.put(key2, value2);

  assert!(cache.get_if_present(&"key0".to_string()).is_some());
  assert!(cache.get_if_present(&"key1".to_string()).is_none());
  assert!(cache.get_if_present(&"key2".to_string()).is_some());
}

#[test]
fn loaded_values_respect_the_size_bound() {
  let cache = CacheBuilder::<i32, i32>::new()
    .maximum_size(2)
    .concurrency_level(1)
    .build()
    .unwrap();

  for key in 0..3 {
    let value = cache.get_with(&key, |key| Ok(Some(key * 10))).unwrap();
    assert_eq!(*value, key * 10);
  }

  assert_eq!(cache.len(), 2);
  assert!(cache.get_if_present(&0).is_none());
  assert!(cache.get_if_present(&1).is_some());
  assert!(cache.get_if_present(&2).is_some());
}

#[test]
fn weight_bound_evicts_until_under_the_limit() {
  let (tx, rx) = mpsc::channel();
  let cache = CacheBuilder::default()
    .maximum_weight(10)
    .weigher(|_key: &String, value: &String| value.len() as u32)
    .concurrency_level(1)
    .removal_listener(TestListener { sender: tx })
    .build()
    .unwrap();

  cache.put("a".to_string(), "aaaa".to_string()); // weight 4
  cache.put("b".to_string(), "bbbb".to_string()); // weight 4
  cache.put("c".to_string(), "cccc".to_string()); // weight 4, total 12 > 10

  assert!(cache.get_if_present(&"a".to_string()).is_none());
  assert!(cache.get_if_present(&"b".to_string()).is_some());
  assert!(cache.get_if_present(&"c".to_string()).is_some());

  let (key, _, cause) = rx.try_recv().unwrap();
  assert_eq!(key, "a");
  assert_eq!(cause, RemovalCause::Size);
}

#[test]
fn an_oversized_entry_is_evicted_immediately() {
  let cache = CacheBuilder::default()
    .maximum_weight(5)
    .weigher(|_key: &String, value: &String| value.len() as u32)
    .concurrency_level(1)
    .build()
    .unwrap();

  cache.put("big".to_string(), "x".repeat(100));
  assert!(cache.get_if_present(&"big".to_string()).is_none());
  assert_eq!(cache.len(), 0);
}

#[test]
fn replacement_updates_the_weight_accounting() {
  let cache = CacheBuilder::default()
    .maximum_weight(10)
    .weigher(|_key: &String, value: &String| value.len() as u32)
    .concurrency_level(1)
    .build()
    .unwrap();

  cache.put("a".to_string(), "aaaa".to_string()); // weight 4
  cache.put("a".to_string(), "aa".to_string()); // weight 2 now
  cache.put("b".to_string(), "bbbb".to_string()); // total 6
  cache.put("c".to_string(), "cccc".to_string()); // total 10, still fits

  assert_eq!(cache.len(), 3);
  assert!(cache.get_if_present(&"a".to_string()).is_some());
}

#[test]
fn stats_count_size_evictions() {
  let cache = CacheBuilder::<String, String>::new()
    .maximum_size(1)
    .concurrency_level(1)
    .record_stats()
    .build()
    .unwrap();

  for n in 0..4 {
    let (key, value) = entry(n);
    cache.put(key, value);
  }

  assert_eq!(cache.stats().eviction_count, 3);
  assert_eq!(cache.len(), 1);
}
