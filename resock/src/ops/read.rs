use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  connection::Connection,
  error::{Error, Result},
  ops::Parked,
  socket::Transfer,
};

/// Receives once into `buf`; resolves to the byte count, 0 at end of stream.
pub(crate) struct Read<'a> {
  conn: &'a Connection,
  buf: &'a mut [u8],
  parked: Parked<'a>,
}

impl<'a> Read<'a> {
  pub(crate) fn new(conn: &'a Connection, buf: &'a mut [u8]) -> Read<'a> {
    Read { conn, buf, parked: Parked::new(conn.reader()) }
  }
}

impl Future for Read<'_> {
  type Output = Result<usize>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    if this.conn.is_closed() {
      this.parked.unpark();
      return Poll::Ready(Err(Error::Usage("read on closed connection")));
    }

    let transfer = this.conn.socket().recv(this.buf);
    match transfer {
      Ok(Transfer::WouldBlock) => {
        this.parked.park(cx)?;
        log::trace!("resock: read suspended on {:?}", this.conn.raw());
        Poll::Pending
      }
      Ok(transfer) => {
        this.parked.unpark();
        Poll::Ready(Ok(transfer.bytes()))
      }
      Err(err) => {
        this.parked.unpark();
        Poll::Ready(Err(err))
      }
    }
  }
}
