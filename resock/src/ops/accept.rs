use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  acceptor::Acceptor, connection::Connection, error::Result, ops::Parked,
};

/// Resolves to the next accepted connection.
pub(crate) struct Accept<'a> {
  acceptor: &'a Acceptor,
  parked: Parked<'a>,
}

impl<'a> Accept<'a> {
  pub(crate) fn new(acceptor: &'a Acceptor) -> Accept<'a> {
    Accept { acceptor, parked: Parked::new(acceptor.waiter()) }
  }
}

impl Future for Accept<'_> {
  type Output = Result<Connection>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    let accepted = this.acceptor.socket().accept();
    match accepted {
      Ok(Some((socket, peer))) => {
        this.parked.unpark();
        Poll::Ready(Connection::from_socket(socket, peer))
      }
      Ok(None) => {
        this.parked.park(cx)?;
        log::trace!("resock: accept suspended on {:?}", this.acceptor.raw());
        Poll::Pending
      }
      Err(err) => {
        this.parked.unpark();
        Poll::Ready(Err(err))
      }
    }
  }
}
