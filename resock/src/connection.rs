//! Asynchronous stream connection.
//!
//! A [`Connection`] owns one connected, non-blocking [`TcpSocket`] and runs
//! reads, writes and connects as [`Task`]s. An operation that cannot finish
//! parks in the waiter slot for its direction; the readiness source calls
//! [`Connection::notify_readable`] or [`Connection::notify_writable`] when the
//! socket is ready, and the parked task resumes.
//!
//! Writes never lose bytes: what the OS does not accept is kept in a backlog
//! that the next `notify_writable` flushes before waking the writer.
//!
//! ```rust,no_run
//! use resock::{Acceptor, Endpoint, DEFAULT_BACKLOG};
//!
//! # fn main() -> resock::Result<()> {
//! let endpoint = Endpoint::parse("127.0.0.1", 8080).unwrap();
//! let acceptor = Acceptor::bind(endpoint, DEFAULT_BACKLOG)?;
//! let conn = acceptor.async_accept().get()?;
//!
//! let mut buf = [0u8; 1024];
//! let n = conn.async_read(&mut buf).get()?;
//! conn.async_write(&buf[..n]).get()?;
//! conn.close();
//! # Ok(())
//! # }
//! ```
//!
//! Connection is `!Sync`: every method, including the notifications, must be
//! called from the thread that owns it.

use std::{
  cell::{Cell, Ref, RefCell},
  fmt,
  net::Shutdown,
};

use bytes::{Buf, BytesMut};

use crate::{
  config::{AddressFamily, BlockingMode, Inheritance, SocketConfig},
  endpoint::Endpoint,
  error::{Error, Result},
  ops,
  socket::Transfer,
  sys::{self, RawSocket},
  task::Task,
  tcp::TcpSocket,
  waiter::WaiterSlot,
};

pub struct Connection {
  socket: RefCell<TcpSocket>,
  local: Cell<Option<Endpoint>>,
  remote: Cell<Option<Endpoint>>,
  reader: WaiterSlot,
  writer: WaiterSlot,
  backlog: RefCell<BytesMut>,
  write_failure: Cell<Option<Error>>,
  closed: Cell<bool>,
}

impl Connection {
  /// An unconnected, non-blocking, non-inheritable connection. Use
  /// [`Connection::async_connect`] to establish it.
  pub fn new(family: AddressFamily) -> Result<Connection> {
    let config = SocketConfig::tcp(family)
      .blocking(BlockingMode::NonBlocking)
      .inheritance(Inheritance::NonInheritable);

    Ok(Connection::with_endpoints(TcpSocket::open(config)?, None, None))
  }

  /// Wraps an already connected socket, forcing it into non-blocking mode.
  pub fn from_socket(
    mut socket: TcpSocket,
    remote: Endpoint,
  ) -> Result<Connection> {
    socket.set_blocking(BlockingMode::NonBlocking)?;
    let local = socket.local_endpoint()?;

    Ok(Connection::with_endpoints(socket, Some(local), Some(remote)))
  }

  fn with_endpoints(
    socket: TcpSocket,
    local: Option<Endpoint>,
    remote: Option<Endpoint>,
  ) -> Connection {
    Connection {
      socket: RefCell::new(socket),
      local: Cell::new(local),
      remote: Cell::new(remote),
      reader: WaiterSlot::new(),
      writer: WaiterSlot::new(),
      backlog: RefCell::new(BytesMut::new()),
      write_failure: Cell::new(None),
      closed: Cell::new(false),
    }
  }

  /// Reads once into `buf`. Resolves to the number of bytes read, or 0 once
  /// the peer has shut down its side.
  pub fn async_read<'a>(&'a self, buf: &'a mut [u8]) -> Task<'a, usize> {
    Task::new(ops::Read::new(self, buf))
  }

  /// Writes all of `buf`.
  pub fn async_write<'a>(&'a self, buf: &'a [u8]) -> Task<'a, ()> {
    Task::new(ops::Write::new(self, buf))
  }

  pub fn async_connect(&self, endpoint: Endpoint) -> Task<'_, ()> {
    Task::new(ops::Connect::new(self, endpoint))
  }

  /// Wakes the suspended read, if any.
  pub fn notify_readable(&self) {
    if self.reader.wake() {
      log::trace!("resock: woke reader on {:?}", self.raw());
    }
  }

  /// Flushes the write backlog and, once it is empty, wakes the suspended
  /// write or connect.
  ///
  /// If the flush fails the connection is closed and the failure is handed
  /// to the suspended write, which completes with it.
  pub fn notify_writable(&self) {
    let drained = if self.backlog.borrow().is_empty() {
      Ok(true)
    } else {
      self.flush_backlog()
    };

    match drained {
      Ok(true) => {
        if self.writer.wake() {
          log::trace!("resock: woke writer on {:?}", self.raw());
        }
      }
      Ok(false) => {}
      Err(err) => {
        log::warn!("resock: flushing backlog on {:?} failed: {err}", self.raw());
        self.write_failure.set(Some(err));
        self.close();
        self.writer.wake();
      }
    }
  }

  /// Sends as much of the backlog as the OS takes. `Ok(true)` once it is
  /// empty.
  pub(crate) fn flush_backlog(&self) -> Result<bool> {
    let mut backlog = self.backlog.borrow_mut();
    let socket = self.socket.borrow();

    while !backlog.is_empty() {
      match socket.send(&backlog)? {
        Transfer::Progressed(n) => backlog.advance(n),
        Transfer::WouldBlock => return Ok(false),
        Transfer::Eof => return Err(Error::system("send", sys::BROKEN_PIPE)),
      }
    }

    Ok(true)
  }

  /// Closes the socket and drops unsent bytes. Suspended operations are woken
  /// and fail. Calling it again does nothing.
  pub fn close(&self) {
    if self.closed.replace(true) {
      return;
    }

    let dropped = {
      let mut backlog = self.backlog.borrow_mut();
      let len = backlog.len();
      backlog.clear();
      len
    };
    if dropped > 0 {
      log::debug!("resock: dropped {dropped} unsent bytes on close");
    }

    self.socket.borrow_mut().close();
    self.reader.wake();
    self.writer.wake();
  }

  pub fn is_closed(&self) -> bool {
    self.closed.get()
  }

  pub fn shutdown(&self, how: Shutdown) -> Result<()> {
    self.socket.borrow().shutdown(how)
  }

  pub fn local_endpoint(&self) -> Result<Endpoint> {
    self.local.get().ok_or(Error::Usage("connection is not connected"))
  }

  pub fn remote_endpoint(&self) -> Result<Endpoint> {
    self.remote.get().ok_or(Error::Usage("connection is not connected"))
  }

  /// Bytes accepted by [`Connection::async_write`] but not yet taken by the
  /// OS.
  pub fn pending_write_bytes(&self) -> usize {
    self.backlog.borrow().len()
  }

  pub fn raw(&self) -> RawSocket {
    self.socket.borrow().raw()
  }

  pub(crate) fn socket(&self) -> Ref<'_, TcpSocket> {
    self.socket.borrow()
  }

  pub(crate) fn reader(&self) -> &WaiterSlot {
    &self.reader
  }

  pub(crate) fn writer(&self) -> &WaiterSlot {
    &self.writer
  }

  pub(crate) fn stage(&self, bytes: &[u8]) {
    self.backlog.borrow_mut().extend_from_slice(bytes);
  }

  pub(crate) fn take_write_failure(&self) -> Option<Error> {
    self.write_failure.take()
  }

  pub(crate) fn connected(&self, remote: Endpoint) -> Result<()> {
    let local = self.socket.borrow().local_endpoint()?;
    self.local.set(Some(local));
    self.remote.set(Some(remote));
    Ok(())
  }
}

impl_raw_socket!(Connection);

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection")
      .field("socket", &self.socket.borrow())
      .field("local", &self.local.get())
      .field("remote", &self.remote.get())
      .field("pending_write_bytes", &self.pending_write_bytes())
      .field("closed", &self.closed.get())
      .finish()
  }
}
