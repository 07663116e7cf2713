//! A concurrent, segment-striped in-memory cache with single-flight loading.
//!
//! # Features
//! - **High concurrency**: state is striped across independently locked
//!   segments; reads take a per-segment read lock and never block on another
//!   key's in-flight load.
//! - **Single-flight loading**: concurrent requests for one missing key share
//!   a single loader invocation and observe the same outcome.
//! - **Bounded size or weight**: LRU eviction through intrusive, arena-backed
//!   order queues.
//! - **Time-based expiration**: expire-after-write or expire-after-access,
//!   driven by an injectable clock for deterministic tests.
//! - **Reclaimable references**: weak/soft keys and values cleared by an
//!   explicit pressure sweeper, purged with a `Collected` removal cause.
//! - **Asynchronous refresh**: `refresh` reloads in the background while the
//!   old value keeps being served.
//! - **Observability**: hit/miss/load/eviction statistics and removal
//!   notifications, synchronous or via a background notifier thread.

// Public modules that form the API
pub mod builder;
pub mod cache;
pub mod clock;
pub mod error;
pub mod listener;
pub mod loading;
pub mod reclaim;
pub mod stats;

// Internal, crate-only modules
mod entry;
mod loader;
mod notifier;
mod queue;
mod segment;
mod shared;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use cache::Cache;
pub use clock::{ManualTicker, SystemTicker, Ticker};
pub use error::{ConfigError, DynError, LoadError};
pub use listener::{RemovalCause, RemovalListener};
pub use loader::PendingLoad;
pub use loading::{loader_fn, CacheLoader, LoaderFn, LoadingCache};
pub use reclaim::Strength;
pub use stats::CacheStats;
