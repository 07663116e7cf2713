use loadcache::{CacheBuilder, ConfigError};
use std::time::Duration;

#[test]
fn zero_concurrency_level_is_rejected() {
  let result = CacheBuilder::<i32, i32>::new().concurrency_level(0).build();
  assert_eq!(result.unwrap_err(), ConfigError::ZeroConcurrencyLevel);
}

#[test]
fn size_and_weight_bounds_are_mutually_exclusive() {
  let result = CacheBuilder::<i32, String>::new()
    .maximum_size(100)
    .maximum_weight(1000)
    .weigher(|_, value: &String| value.len() as u32)
    .build();
  assert_eq!(result.unwrap_err(), ConfigError::MaximumSizeAndWeight);
}

#[test]
fn weigher_requires_maximum_weight() {
  let result = CacheBuilder::<i32, String>::new()
    .weigher(|_, value: &String| value.len() as u32)
    .build();
  assert_eq!(result.unwrap_err(), ConfigError::WeigherWithoutMaximumWeight);
}

#[test]
fn maximum_weight_requires_a_weigher() {
  let result = CacheBuilder::<i32, String>::new().maximum_weight(1000).build();
  assert_eq!(result.unwrap_err(), ConfigError::MaximumWeightWithoutWeigher);
}

#[test]
fn the_two_expiration_modes_cannot_be_combined() {
  let result = CacheBuilder::<i32, i32>::new()
    .expire_after_write(Duration::from_secs(1))
    .expire_after_access(Duration::from_secs(1))
    .build();
  assert_eq!(result.unwrap_err(), ConfigError::ConflictingExpiration);
}

#[test]
fn valid_configurations_build() {
  assert!(CacheBuilder::<i32, i32>::new().build().is_ok());

  assert!(CacheBuilder::<i32, i32>::new()
    .maximum_size(10)
    .expire_after_write(Duration::from_secs(1))
    .build()
    .is_ok());

  assert!(CacheBuilder::<i32, String>::new()
    .maximum_weight(1000)
    .weigher(|_, value: &String| value.len() as u32)
    .expire_after_access(Duration::from_secs(1))
    .build()
    .is_ok());

  assert!(CacheBuilder::<i32, i32>::new()
    .weak_keys()
    .soft_values()
    .build()
    .is_ok());
}

#[test]
fn a_tiny_bound_still_builds_and_evicts() {
  // The segment count collapses so each segment can hold an entry.
  let cache = CacheBuilder::<i32, i32>::new()
    .concurrency_level(64)
    .maximum_size(2)
    .build()
    .unwrap();

  for key in 0..10 {
    cache.put(key, key);
  }
  assert!(cache.len() <= 2);
}

#[test]
fn config_errors_display_their_conflict() {
  let message = format!("{}", ConfigError::ConflictingExpiration);
  assert!(message.contains("expire_after_write"));
}
