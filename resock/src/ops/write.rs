use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  connection::Connection,
  error::{Error, Result},
  ops::Parked,
  socket::Transfer,
  sys,
};

/// Sends the whole of `buf`.
///
/// Whatever the OS does not take before it would block is moved into the
/// connection's backlog. From then on the op waits for the backlog to drain,
/// either by flushing it itself when polled or through
/// [`Connection::notify_writable`].
pub(crate) struct Write<'a> {
  conn: &'a Connection,
  buf: &'a [u8],
  written: usize,
  staged: bool,
  parked: Parked<'a>,
}

impl<'a> Write<'a> {
  pub(crate) fn new(conn: &'a Connection, buf: &'a [u8]) -> Write<'a> {
    Write {
      conn,
      buf,
      written: 0,
      staged: false,
      parked: Parked::new(conn.writer()),
    }
  }

  fn ready(&mut self, res: Result<()>) -> Poll<Result<()>> {
    self.parked.unpark();
    Poll::Ready(res)
  }

  /// Stages the rest of `buf` behind the backlog and waits for it to drain.
  fn stage(&mut self, cx: &Context<'_>) -> Result<()> {
    self.parked.park(cx)?;
    self.conn.stage(&self.buf[self.written..]);
    self.written = self.buf.len();
    self.staged = true;
    Ok(())
  }

  fn drain(&mut self, cx: &Context<'_>) -> Poll<Result<()>> {
    match self.conn.flush_backlog() {
      Ok(true) => self.ready(Ok(())),
      Ok(false) => {
        if let Err(err) = self.parked.park(cx) {
          return self.ready(Err(err));
        }
        log::trace!(
          "resock: write suspended on {:?} with {} bytes queued",
          self.conn.raw(),
          self.conn.pending_write_bytes()
        );
        Poll::Pending
      }
      Err(err) => self.ready(Err(err)),
    }
  }
}

impl Future for Write<'_> {
  type Output = Result<()>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    if this.staged {
      if let Some(err) = this.conn.take_write_failure() {
        return this.ready(Err(err));
      }
    }

    if this.conn.is_closed() {
      return this.ready(Err(Error::Usage("write on closed connection")));
    }

    if this.staged {
      return this.drain(cx);
    }

    // Bytes left behind by an earlier write go out first.
    if this.conn.pending_write_bytes() > 0 {
      if let Err(err) = this.stage(cx) {
        return this.ready(Err(err));
      }
      return this.drain(cx);
    }

    // Claim the writer slot before anything reaches the wire.
    if let Err(err) = this.parked.park(cx) {
      return this.ready(Err(err));
    }

    while this.written < this.buf.len() {
      let transfer = this.conn.socket().send(&this.buf[this.written..]);
      match transfer {
        Ok(Transfer::Progressed(n)) => this.written += n,
        Ok(Transfer::WouldBlock) => {
          if let Err(err) = this.stage(cx) {
            return this.ready(Err(err));
          }
          log::trace!(
            "resock: write suspended on {:?} with {} bytes queued",
            this.conn.raw(),
            this.conn.pending_write_bytes()
          );
          return Poll::Pending;
        }
        Ok(Transfer::Eof) => {
          return this.ready(Err(Error::system("send", sys::BROKEN_PIPE)));
        }
        Err(err) => return this.ready(Err(err)),
      }
    }

    this.ready(Ok(()))
  }
}
