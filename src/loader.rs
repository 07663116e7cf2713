use crate::error::LoadError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// Represents a waiter parked on an unresolved [`LoadFuture`].
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// The state of a value being computed.
pub(crate) enum LoadState<V> {
  Computing,
  Complete(Arc<V>),
  Failed(LoadError),
}

struct Inner<V> {
  state: LoadState<V>,
  waiters: VecDeque<Waiter>,
}

/// A value computation shared between the loading thread and its waiters.
///
/// Installed in an entry's value slot while the load is in flight; exactly
/// one exists per key per segment at a time. It can be awaited by multiple
/// sync threads and async tasks simultaneously, and resolves exactly once:
/// either with the computed value or with the failure every waiter observes.
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the computing state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: LoadState::Computing,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Resolves the future with a value, waking all waiters.
  pub(crate) fn complete(&self, value: Arc<V>) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Complete(value);
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }

  /// Resolves the future with a failure, waking all waiters.
  pub(crate) fn fail(&self, error: LoadError) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Failed(error);
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }

  pub(crate) fn is_resolved(&self) -> bool {
    !matches!(self.inner.lock().state, LoadState::Computing)
  }

  /// Blocks the current thread until the future resolves.
  ///
  /// With a timeout, the wait fails with [`LoadError::WaitTimeout`] once the
  /// deadline passes; the computation itself keeps running.
  pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<Arc<V>, LoadError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        LoadState::Complete(value) => return Ok(value.clone()),
        LoadState::Failed(error) => return Err(error.clone()),
        LoadState::Computing => {
          inner.waiters.push_back(Waiter::Sync(thread::current()));
          // Unlock before parking so the resolver can make progress.
          drop(inner);
          match deadline {
            Some(deadline) => {
              let now = Instant::now();
              if now >= deadline {
                return Err(LoadError::WaitTimeout);
              }
              thread::park_timeout(deadline - now);
            }
            None => thread::park(),
          }
          inner = self.inner.lock();
        }
      }
    }
  }

  fn poll_resolved(&self, cx: &mut Context<'_>) -> Poll<Result<Arc<V>, LoadError>> {
    let mut inner = self.inner.lock();
    match &inner.state {
      LoadState::Complete(value) => Poll::Ready(Ok(value.clone())),
      LoadState::Failed(error) => Poll::Ready(Err(error.clone())),
      LoadState::Computing => {
        inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        Poll::Pending
      }
    }
  }
}

/// A handle to an in-flight asynchronous load, returned by `refresh`.
///
/// The handle resolves to the reloaded value or the failure that ended the
/// attempt. It can be waited on synchronously or polled as a `Future`;
/// dropping it detaches from the load without cancelling it.
pub struct PendingLoad<V> {
  future: Arc<LoadFuture<V>>,
}

impl<V> PendingLoad<V> {
  pub(crate) fn new(future: Arc<LoadFuture<V>>) -> Self {
    Self { future }
  }

  /// Returns `true` once the load has completed or failed.
  pub fn is_done(&self) -> bool {
    self.future.is_resolved()
  }

  /// Blocks until the load resolves.
  pub fn wait(&self) -> Result<Arc<V>, LoadError> {
    self.future.wait(None)
  }

  /// Blocks until the load resolves or `timeout` elapses.
  pub fn wait_timeout(&self, timeout: Duration) -> Result<Arc<V>, LoadError> {
    self.future.wait(Some(timeout))
  }
}

impl<V> Clone for PendingLoad<V> {
  fn clone(&self) -> Self {
    Self {
      future: self.future.clone(),
    }
  }
}

impl<V> Future for PendingLoad<V> {
  type Output = Result<Arc<V>, LoadError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.future.poll_resolved(cx)
  }
}
