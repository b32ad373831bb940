//! Protocol-independent connection and listener interfaces.
//!
//! A readiness source usually tracks many sockets and only needs to know
//! which one became ready and whom to notify. [`AsyncConnection`] and
//! [`AsyncAcceptor`] capture exactly that surface, so an event loop can hold
//! `Box<dyn AsyncConnection>` values without knowing the transport behind
//! them.
//!
//! ```rust
//! use resock::transport::AsyncAcceptor;
//! use resock::{Acceptor, Endpoint};
//!
//! # fn main() -> resock::Result<()> {
//! let acceptor: Box<dyn AsyncAcceptor> =
//!   Box::new(Acceptor::bind(Endpoint::parse("127.0.0.1", 0).unwrap(), 16)?);
//! let listening = acceptor.raw_socket();
//!
//! // Once the readiness source reports `listening` readable:
//! acceptor.notify_readable();
//! # let _ = listening;
//! # Ok(())
//! # }
//! ```

use crate::{
  acceptor::Acceptor, connection::Connection, endpoint::Endpoint,
  error::Result, sys::RawSocket, task::Task,
};

/// An established, full-duplex stream connection.
pub trait AsyncConnection {
  /// Native descriptor, for registering with a readiness source.
  fn raw_socket(&self) -> RawSocket;

  /// Reads once into `buf`; 0 means the peer shut down its side.
  fn async_read<'a>(&'a self, buf: &'a mut [u8]) -> Task<'a, usize>;

  /// Writes all of `buf`.
  fn async_write<'a>(&'a self, buf: &'a [u8]) -> Task<'a, ()>;

  fn local_endpoint(&self) -> Result<Endpoint>;

  fn remote_endpoint(&self) -> Result<Endpoint>;

  fn notify_readable(&self);

  fn notify_writable(&self);

  fn close(&self);
}

/// A listening socket producing [`AsyncConnection`]s.
pub trait AsyncAcceptor {
  fn raw_socket(&self) -> RawSocket;

  fn async_accept(&self) -> Task<'_, Box<dyn AsyncConnection>>;

  fn local_endpoint(&self) -> Result<Endpoint>;

  fn notify_readable(&self);

  fn close(&self);
}

impl AsyncConnection for Connection {
  fn raw_socket(&self) -> RawSocket {
    self.raw()
  }

  fn async_read<'a>(&'a self, buf: &'a mut [u8]) -> Task<'a, usize> {
    Connection::async_read(self, buf)
  }

  fn async_write<'a>(&'a self, buf: &'a [u8]) -> Task<'a, ()> {
    Connection::async_write(self, buf)
  }

  fn local_endpoint(&self) -> Result<Endpoint> {
    Connection::local_endpoint(self)
  }

  fn remote_endpoint(&self) -> Result<Endpoint> {
    Connection::remote_endpoint(self)
  }

  fn notify_readable(&self) {
    Connection::notify_readable(self)
  }

  fn notify_writable(&self) {
    Connection::notify_writable(self)
  }

  fn close(&self) {
    Connection::close(self)
  }
}

impl AsyncAcceptor for Acceptor {
  fn raw_socket(&self) -> RawSocket {
    self.raw()
  }

  fn async_accept(&self) -> Task<'_, Box<dyn AsyncConnection>> {
    let accept = Acceptor::async_accept(self);
    Task::new(async move {
      let conn: Box<dyn AsyncConnection> = Box::new(accept.await?);
      Ok(conn)
    })
  }

  fn local_endpoint(&self) -> Result<Endpoint> {
    Acceptor::local_endpoint(self)
  }

  fn notify_readable(&self) {
    Acceptor::notify_readable(self)
  }

  fn close(&self) {
    Acceptor::close(self)
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::{config::AddressFamily, error::Error};

  fn listener() -> Box<dyn AsyncAcceptor> {
    let endpoint = Endpoint::parse("127.0.0.1", 0).unwrap();
    Box::new(Acceptor::bind(endpoint, 4).unwrap())
  }

  #[test]
  fn accepted_connection_works_through_the_trait() {
    let acceptor = listener();
    let addr = acceptor.local_endpoint().unwrap();

    let client = Connection::new(AddressFamily::Ipv4).unwrap();
    client.async_connect(addr).get().unwrap();

    let mut accept = acceptor.async_accept();
    if accept.resume().is_pending() {
      acceptor.notify_readable();
    }
    let server = accept.get().unwrap();
    assert_eq!(
      server.remote_endpoint().unwrap(),
      client.local_endpoint().unwrap()
    );
    assert_eq!(server.local_endpoint().unwrap(), addr);

    let client: &dyn AsyncConnection = &client;
    client.async_write(b"ping").get().unwrap();

    let mut buf = [0u8; 4];
    let mut read = server.async_read(&mut buf);
    while read.resume().is_pending() {
      server.notify_readable();
    }
    assert_eq!(read.get(), Ok(4));
    assert_eq!(&buf, b"ping");
  }

  #[test]
  fn close_through_the_trait() {
    let acceptor = listener();
    let raw = acceptor.raw_socket();
    assert!(raw >= 0);

    acceptor.close();
    assert_eq!(
      acceptor.async_accept().get().err(),
      Some(Error::Usage("accept on invalid socket"))
    );

    let conn: Box<dyn AsyncConnection> =
      Box::new(Connection::new(AddressFamily::Ipv4).unwrap());
    conn.notify_writable();
    conn.close();
    let mut buf = [0u8; 1];
    assert_eq!(
      conn.async_read(&mut buf).get(),
      Err(Error::Usage("read on closed connection"))
    );
  }
}
