//! Single-owner waiter slot.
//!
//! Each suspending direction of a [`Connection`](crate::Connection) or
//! [`Acceptor`](crate::Acceptor) has one slot. A suspended operation parks its
//! waker here and the matching `notify_*` call wakes it exactly once. A second
//! operation trying to park while the first is still pending is rejected.

use std::{cell::RefCell, fmt, task::Waker};

use crate::error::{Error, Result};

#[derive(Default)]
pub struct WaiterSlot {
  waiter: RefCell<Option<Waker>>,
}

impl WaiterSlot {
  pub const fn new() -> WaiterSlot {
    WaiterSlot { waiter: RefCell::new(None) }
  }

  /// Parks `waker`. Re-registering the same task refreshes its waker; a
  /// different task is turned away while the slot is taken.
  pub fn register(&self, waker: &Waker) -> Result<()> {
    let mut waiter = self.waiter.borrow_mut();
    match waiter.as_ref() {
      Some(current) if !current.will_wake(waker) => {
        Err(Error::Usage("another operation is already waiting"))
      }
      _ => {
        *waiter = Some(waker.clone());
        Ok(())
      }
    }
  }

  /// Clears the slot if `waker` is the one parked in it.
  pub fn release(&self, waker: &Waker) {
    let mut waiter = self.waiter.borrow_mut();
    if waiter.as_ref().is_some_and(|current| current.will_wake(waker)) {
      *waiter = None;
    }
  }

  /// Wakes and removes the parked waker. Returns whether there was one.
  pub fn wake(&self) -> bool {
    // Taken before waking: the woken task may register again right away.
    let waiter = self.waiter.borrow_mut().take();
    match waiter {
      Some(waker) => {
        waker.wake();
        true
      }
      None => false,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.waiter.borrow().is_some()
  }
}

impl fmt::Debug for WaiterSlot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WaiterSlot").field("pending", &self.is_pending()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{
    sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
    },
    task::Wake,
  };

  struct Counter(AtomicUsize);

  impl Wake for Counter {
    fn wake(self: Arc<Self>) {
      self.0.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn counter() -> (Arc<Counter>, Waker) {
    let counter = Arc::new(Counter(AtomicUsize::new(0)));
    let waker = Waker::from(counter.clone());
    (counter, waker)
  }

  #[test]
  fn wakes_exactly_once() {
    let slot = WaiterSlot::new();
    let (count, waker) = counter();

    slot.register(&waker).unwrap();
    assert!(slot.is_pending());
    assert!(slot.wake());
    assert!(!slot.wake());
    assert_eq!(count.0.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn rejects_a_second_waiter() {
    let slot = WaiterSlot::new();
    let (_, first) = counter();
    let (_, second) = counter();

    slot.register(&first).unwrap();
    slot.register(&first).unwrap();
    assert!(slot.register(&second).unwrap_err().is_usage());

    slot.release(&second);
    assert!(slot.is_pending());
    slot.release(&first);
    assert!(!slot.is_pending());
    slot.register(&second).unwrap();
  }
}
