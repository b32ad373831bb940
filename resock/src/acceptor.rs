//! Asynchronous listener.
//!
//! An [`Acceptor`] owns a listening, non-blocking [`TcpSocket`].
//! [`Acceptor::async_accept`] yields [`Connection`]s; when nothing is pending
//! it parks until [`Acceptor::notify_readable`].

use std::{
  cell::{Ref, RefCell},
  fmt,
};

use crate::{
  config::{BlockingMode, Inheritance, SocketConfig},
  connection::Connection,
  endpoint::Endpoint,
  error::{Error, Result},
  ops,
  sys::RawSocket,
  task::Task,
  tcp::TcpSocket,
  waiter::WaiterSlot,
};

pub struct Acceptor {
  socket: RefCell<TcpSocket>,
  waiter: WaiterSlot,
}

impl Acceptor {
  /// Takes over a bound and listening socket, forcing it into non-blocking
  /// mode.
  pub fn new(mut socket: TcpSocket) -> Result<Acceptor> {
    socket.set_blocking(BlockingMode::NonBlocking)?;
    Ok(Acceptor { socket: RefCell::new(socket), waiter: WaiterSlot::new() })
  }

  /// Opens a non-inheritable listener on `endpoint`.
  pub fn bind(endpoint: Endpoint, backlog: i32) -> Result<Acceptor> {
    let family = endpoint
      .family()
      .ok_or(Error::Usage("bind needs an ip address endpoint"))?;
    let config = SocketConfig::tcp(family)
      .blocking(BlockingMode::NonBlocking)
      .inheritance(Inheritance::NonInheritable);

    let socket = TcpSocket::open(config)?;
    socket.bind(&endpoint)?;
    socket.listen(backlog)?;
    log::debug!("resock: listening on {endpoint}");

    Acceptor::new(socket)
  }

  pub fn async_accept(&self) -> Task<'_, Connection> {
    Task::new(ops::Accept::new(self))
  }

  /// Wakes the suspended accept, if any.
  pub fn notify_readable(&self) {
    if self.waiter.wake() {
      log::trace!("resock: woke acceptor on {:?}", self.raw());
    }
  }

  pub fn local_endpoint(&self) -> Result<Endpoint> {
    self.socket.borrow().local_endpoint()
  }

  /// Stops listening. A suspended accept is woken and fails.
  pub fn close(&self) {
    self.socket.borrow_mut().close();
    self.waiter.wake();
  }

  pub fn raw(&self) -> RawSocket {
    self.socket.borrow().raw()
  }

  pub(crate) fn socket(&self) -> Ref<'_, TcpSocket> {
    self.socket.borrow()
  }

  pub(crate) fn waiter(&self) -> &WaiterSlot {
    &self.waiter
  }
}

impl_raw_socket!(Acceptor);

impl fmt::Debug for Acceptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Acceptor")
      .field("socket", &self.socket.borrow())
      .field("waiter", &self.waiter)
      .finish()
  }
}
