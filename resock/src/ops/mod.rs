//! Futures behind the `async_*` methods of [`Connection`](crate::Connection)
//! and [`Acceptor`](crate::Acceptor).
//!
//! Every op retries its system call each time it is polled. When the OS says
//! "not yet" the op parks the polling waker in the object's [`WaiterSlot`]
//! for that direction and returns `Pending`; the matching `notify_*` call
//! wakes it.

mod accept;
mod connect;
mod read;
mod write;

pub(crate) use accept::Accept;
pub(crate) use connect::Connect;
pub(crate) use read::Read;
pub(crate) use write::Write;

use std::task::{Context, Waker};

use crate::{error::Result, waiter::WaiterSlot};

/// The slot an op parks in, and the waker it parked there.
///
/// Dropping a suspended op releases the slot.
pub(crate) struct Parked<'a> {
  slot: &'a WaiterSlot,
  waker: Option<Waker>,
}

impl<'a> Parked<'a> {
  pub(crate) fn new(slot: &'a WaiterSlot) -> Parked<'a> {
    Parked { slot, waker: None }
  }

  pub(crate) fn park(&mut self, cx: &Context<'_>) -> Result<()> {
    self.slot.register(cx.waker())?;
    self.waker = Some(cx.waker().clone());
    Ok(())
  }

  pub(crate) fn unpark(&mut self) {
    if let Some(waker) = self.waker.take() {
      self.slot.release(&waker);
    }
  }
}

impl Drop for Parked<'_> {
  fn drop(&mut self) {
    self.unpark();
  }
}
