//! Lock used by [`Task`](crate::Task) to hand its continuation between threads.
//!
//! Backed by `parking_lot` when the `parking_lot` feature is enabled and by
//! `std::sync` otherwise. Neither variant poisons: a panic while holding the
//! lock leaves the stored waker usable.

#[cfg(feature = "parking_lot")]
pub(crate) use parking_lot::Mutex;

#[cfg(not(feature = "parking_lot"))]
pub(crate) use self::std_sync::Mutex;

#[cfg(not(feature = "parking_lot"))]
mod std_sync {
  use std::{ops::DerefMut, sync as std_sync};

  pub(crate) struct Mutex<T: ?Sized> {
    inner: std_sync::Mutex<T>,
  }

  impl<T> Mutex<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
      Self { inner: std_sync::Mutex::new(value) }
    }
  }

  impl<T: ?Sized> Mutex<T> {
    /// Never fails; a poisoned lock is recovered.
    #[inline]
    pub(crate) fn lock(&self) -> impl DerefMut<Target = T> + '_ {
      self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
  }
}
