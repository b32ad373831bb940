use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  connection::Connection,
  endpoint::Endpoint,
  error::{Error, Result},
  ops::Parked,
  tcp::ConnectStatus,
};

/// Non-blocking connect. While the handshake runs the op waits as the
/// connection's writer; each later poll checks the pending socket error and
/// asks the OS whether the handshake is done.
pub(crate) struct Connect<'a> {
  conn: &'a Connection,
  endpoint: Endpoint,
  started: bool,
  parked: Parked<'a>,
}

impl<'a> Connect<'a> {
  pub(crate) fn new(conn: &'a Connection, endpoint: Endpoint) -> Connect<'a> {
    Connect { conn, endpoint, started: false, parked: Parked::new(conn.writer()) }
  }

  /// The first poll starts the connect; later polls only follow up on it,
  /// so a socket that was already connected elsewhere is an error.
  fn step(&mut self) -> Result<ConnectStatus> {
    let socket = self.conn.socket();

    if self.started {
      return socket.finish_connect(&self.endpoint);
    }
    let status = socket.connect(&self.endpoint)?;
    self.started = true;
    Ok(status)
  }
}

impl Future for Connect<'_> {
  type Output = Result<()>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    if this.conn.is_closed() {
      this.parked.unpark();
      return Poll::Ready(Err(Error::Usage("connect on closed connection")));
    }

    match this.step() {
      Ok(ConnectStatus::Connected) => {
        this.parked.unpark();
        log::debug!("resock: connected {:?} to {}", this.conn.raw(), this.endpoint);
        Poll::Ready(this.conn.connected(this.endpoint))
      }
      Ok(ConnectStatus::InProgress) => {
        this.parked.park(cx)?;
        log::trace!("resock: connect in progress on {:?}", this.conn.raw());
        Poll::Pending
      }
      Err(err) => {
        this.parked.unpark();
        Poll::Ready(Err(err))
      }
    }
  }
}
