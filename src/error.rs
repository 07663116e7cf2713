use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The boxed error type loaders may fail with.
pub type DynError = Box<dyn Error + Send + Sync>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// The concurrency level was zero; at least one segment is required.
  ZeroConcurrencyLevel,
  /// Both `maximum_size` and `maximum_weight` were configured; the cache is
  /// bounded by exactly one of them.
  MaximumSizeAndWeight,
  /// A `weigher` was configured without `maximum_weight`.
  WeigherWithoutMaximumWeight,
  /// `maximum_weight` was configured without a `weigher`.
  MaximumWeightWithoutWeigher,
  /// Both `expire_after_write` and `expire_after_access` were configured;
  /// the two expiration modes are mutually exclusive.
  ConflictingExpiration,
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::ZeroConcurrencyLevel => write!(f, "concurrency level cannot be zero"),
      ConfigError::MaximumSizeAndWeight => {
        write!(f, "maximum_size and maximum_weight cannot be combined")
      }
      ConfigError::WeigherWithoutMaximumWeight => {
        write!(f, "a weigher requires maximum_weight to be set")
      }
      ConfigError::MaximumWeightWithoutWeigher => {
        write!(f, "maximum_weight requires a weigher to be set")
      }
      ConfigError::ConflictingExpiration => write!(
        f,
        "expire_after_write and expire_after_access cannot be combined"
      ),
    }
  }
}

impl Error for ConfigError {}

/// Errors surfaced by a value load.
///
/// A failed load is never cached: every waiter of the failed attempt observes
/// the same error, and the next request for the key runs the loader again.
#[derive(Debug, Clone)]
pub enum LoadError {
  /// The loader returned an error.
  Execution(Arc<dyn Error + Send + Sync>),
  /// The loader panicked; the payload message is preserved.
  Panicked(String),
  /// The loader completed without producing a value. Values are never
  /// absent, so an empty load is a failure.
  InvalidLoad,
  /// The configured wait bound elapsed while another caller's load for the
  /// same key was still in flight. The load itself keeps running.
  WaitTimeout,
}

impl LoadError {
  pub(crate) fn from_dyn(err: DynError) -> Self {
    LoadError::Execution(Arc::from(err))
  }

  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "loader panicked".to_string()
    };
    LoadError::Panicked(message)
  }
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoadError::Execution(err) => write!(f, "loader failed: {}", err),
      LoadError::Panicked(msg) => write!(f, "loader panicked: {}", msg),
      LoadError::InvalidLoad => write!(f, "loader returned no value"),
      LoadError::WaitTimeout => write!(f, "timed out waiting for an in-flight load"),
    }
  }
}

impl Error for LoadError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      LoadError::Execution(err) => Some(err.as_ref()),
      _ => None,
    }
  }
}
