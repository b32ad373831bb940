//! Stream sockets.
//!
//! [`TcpSocket`] adds connection establishment and listening to the
//! [`Socket`] primitive. It dereferences to [`Socket`] for transfers,
//! shutdown and configuration.

use std::ops::{Deref, DerefMut};

use crate::{
  config::{AddressFamily, Protocol, SocketConfig, SocketKind},
  endpoint::Endpoint,
  error::{Error, Result},
  handle::SocketHandle,
  socket::Socket,
  sys::{self, Condition},
};

/// Outcome of [`TcpSocket::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
  Connected,
  /// A non-blocking connect was started or is still running. Completion is
  /// signalled by writability; [`TcpSocket::take_error`] tells whether it
  /// failed.
  InProgress,
}

#[derive(Debug)]
pub struct TcpSocket(Socket);

impl TcpSocket {
  /// A blocking, inheritable TCP socket.
  pub fn new(family: AddressFamily) -> Result<TcpSocket> {
    TcpSocket::open(SocketConfig::tcp(family))
  }

  pub fn open(config: SocketConfig) -> Result<TcpSocket> {
    if config.socket_kind() != SocketKind::Stream
      || config.socket_protocol() != Protocol::Tcp
    {
      return Err(Error::Usage("tcp socket needs stream kind and tcp protocol"));
    }

    Socket::new(config).map(TcpSocket)
  }

  pub fn into_inner(self) -> Socket {
    self.0
  }

  fn ensure_valid(&self, msg: &'static str) -> Result<()> {
    if self.is_valid() { Ok(()) } else { Err(Error::Usage(msg)) }
  }

  /// Starts (non-blocking) or performs (blocking) a connect.
  ///
  /// A socket that is already connected fails with the OS "already
  /// connected" error. Use [`TcpSocket::finish_connect`] to follow up on an
  /// [`ConnectStatus::InProgress`] result.
  pub fn connect(&self, endpoint: &Endpoint) -> Result<ConnectStatus> {
    self.ensure_valid("connect on invalid socket")?;
    self.attempt_connect(endpoint, false)
  }

  /// Checks on a connect that previously reported
  /// [`ConnectStatus::InProgress`]. A failed handshake surfaces as a
  /// `connect` system error.
  pub fn finish_connect(&self, endpoint: &Endpoint) -> Result<ConnectStatus> {
    self.ensure_valid("connect on invalid socket")?;

    if let Some(err) = self.take_error()? {
      return Err(Error::system("connect", err.raw_os_error().unwrap_or(0)));
    }
    self.attempt_connect(endpoint, true)
  }

  fn attempt_connect(
    &self,
    endpoint: &Endpoint,
    resuming: bool,
  ) -> Result<ConnectStatus> {
    loop {
      let err = match sys::connect(self.raw(), endpoint) {
        Ok(()) => return Ok(ConnectStatus::Connected),
        Err(err) => err,
      };

      if resuming {
        if sys::is_already_connected(&err) {
          return Ok(ConnectStatus::Connected);
        }
        if sys::is_connect_pending(&err) {
          return Ok(ConnectStatus::InProgress);
        }
      }

      match sys::condition(&err) {
        Condition::Interrupted => continue,
        Condition::InProgress if self.config().is_nonblocking() => {
          return Ok(ConnectStatus::InProgress);
        }
        _ => return Err(Error::from_io("connect", &err)),
      }
    }
  }

  /// Enables address reuse, then binds.
  pub fn bind(&self, endpoint: &Endpoint) -> Result<()> {
    self.ensure_valid("bind on invalid socket")?;
    self.set_reuse_address(true)?;

    sys::bind(self.raw(), endpoint).map_err(|err| Error::from_io("bind", &err))
  }

  pub fn set_reuse_address(&self, on: bool) -> Result<()> {
    self.ensure_valid("set_reuse_address on invalid socket")?;

    sys::set_reuse_address(self.raw(), on)
      .map_err(|err| Error::from_io("setsockopt", &err))
  }

  pub fn listen(&self, backlog: i32) -> Result<()> {
    self.ensure_valid("listen on invalid socket")?;

    sys::listen(self.raw(), backlog)
      .map_err(|err| Error::from_io("listen", &err))
  }

  /// Accepts one pending connection.
  ///
  /// Returns `None` when nothing is pending on a non-blocking listener. The
  /// accepted socket takes its family from the peer address and its blocking
  /// and inheritance modes from this listener.
  pub fn accept(&self) -> Result<Option<(TcpSocket, Endpoint)>> {
    self.ensure_valid("accept on invalid socket")?;

    let config = *self.config();
    loop {
      let err = match sys::accept(
        self.raw(),
        config.is_nonblocking(),
        !config.is_inheritable(),
      ) {
        Ok((raw, peer)) => {
          log::debug!("resock: accepted socket {raw:?} from {peer}");

          let family = peer.family().unwrap_or(config.family());
          let accepted = SocketConfig::tcp(family)
            .blocking(config.blocking_mode())
            .inheritance(config.inheritance_mode());
          // SAFETY: accept just returned this descriptor to us.
          let handle = unsafe { SocketHandle::from_raw(raw) };
          let socket = TcpSocket(Socket::from_handle(handle, accepted));
          return Ok(Some((socket, peer)));
        }
        Err(err) => err,
      };

      match sys::condition(&err) {
        Condition::Interrupted => continue,
        Condition::WouldBlock => return Ok(None),
        _ => return Err(Error::from_io("accept", &err)),
      }
    }
  }

  /// Address the socket is bound to. Needed to learn the port after binding
  /// to port 0.
  pub fn local_endpoint(&self) -> Result<Endpoint> {
    self.ensure_valid("local_endpoint on invalid socket")?;

    sys::local_endpoint(self.raw())
      .map_err(|err| Error::from_io("getsockname", &err))
  }

  pub fn peer_endpoint(&self) -> Result<Endpoint> {
    self.ensure_valid("peer_endpoint on invalid socket")?;

    sys::peer_endpoint(self.raw())
      .map_err(|err| Error::from_io("getpeername", &err))
  }

  /// Reads and clears the pending socket error (`SO_ERROR`), such as the
  /// outcome of a non-blocking connect.
  pub fn take_error(&self) -> Result<Option<Error>> {
    self.ensure_valid("take_error on invalid socket")?;

    let code = sys::take_error(self.raw())
      .map_err(|err| Error::from_io("getsockopt", &err))?;
    Ok(code.map(|code| Error::system("so_error", code)))
  }
}

impl Deref for TcpSocket {
  type Target = Socket;

  fn deref(&self) -> &Socket {
    &self.0
  }
}

impl DerefMut for TcpSocket {
  fn deref_mut(&mut self) -> &mut Socket {
    &mut self.0
  }
}

impl_raw_socket!(TcpSocket);

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::config::BlockingMode;

  fn loopback() -> Endpoint {
    Endpoint::parse("127.0.0.1", 0).unwrap()
  }

  #[test]
  fn open_rejects_non_tcp_configs() {
    let config = SocketConfig::tcp(AddressFamily::Ipv4)
      .kind(SocketKind::Datagram)
      .protocol(Protocol::Udp);
    assert!(TcpSocket::open(config).unwrap_err().is_usage());
  }

  #[test]
  fn bind_to_port_zero_gets_a_port() {
    let socket = TcpSocket::new(AddressFamily::Ipv4).unwrap();
    socket.bind(&loopback()).unwrap();

    let local = socket.local_endpoint().unwrap();
    assert_ne!(local.port(), 0);
    assert_eq!(local.ip(), loopback().ip());
  }

  #[test]
  fn accept_without_pending_connection_returns_none() {
    let config =
      SocketConfig::tcp(AddressFamily::Ipv4).blocking(BlockingMode::NonBlocking);
    let listener = TcpSocket::open(config).unwrap();
    listener.bind(&loopback()).unwrap();
    listener.listen(8).unwrap();

    assert!(listener.accept().unwrap().is_none());
  }

  #[test]
  fn nonblocking_connect_reports_progress_then_connects() {
    let listener = TcpSocket::new(AddressFamily::Ipv4).unwrap();
    listener.bind(&loopback()).unwrap();
    listener.listen(8).unwrap();
    let target = listener.local_endpoint().unwrap();

    let config =
      SocketConfig::tcp(AddressFamily::Ipv4).blocking(BlockingMode::NonBlocking);
    let client = TcpSocket::open(config).unwrap();

    // Loopback connects may finish immediately; either way following up
    // must eventually report the established connection.
    let mut status = client.connect(&target).unwrap();
    while status == ConnectStatus::InProgress {
      std::thread::yield_now();
      status = client.finish_connect(&target).unwrap();
    }
    assert_eq!(client.take_error().unwrap(), None);

    let (accepted, peer) = listener.accept().unwrap().unwrap();
    assert_eq!(peer, client.local_endpoint().unwrap());
    assert!(!accepted.config().is_nonblocking());
    assert_eq!(client.peer_endpoint().unwrap(), target);
  }

  #[test]
  fn connect_on_connected_socket_fails() {
    let listener = TcpSocket::new(AddressFamily::Ipv4).unwrap();
    listener.bind(&loopback()).unwrap();
    listener.listen(8).unwrap();
    let target = listener.local_endpoint().unwrap();

    let client = TcpSocket::new(AddressFamily::Ipv4).unwrap();
    assert_eq!(client.connect(&target).unwrap(), ConnectStatus::Connected);

    let err = client.connect(&target).unwrap_err();
    assert_eq!(err, Error::system("connect", libc::EISCONN));
    assert_eq!(
      client.finish_connect(&target).unwrap(),
      ConnectStatus::Connected
    );
  }

  #[test]
  fn operations_on_closed_socket_are_usage_errors() {
    let mut socket = TcpSocket::new(AddressFamily::Ipv4).unwrap();
    socket.close();

    assert!(socket.bind(&loopback()).unwrap_err().is_usage());
    assert!(socket.listen(1).unwrap_err().is_usage());
    assert!(socket.connect(&loopback()).unwrap_err().is_usage());
    assert!(socket.finish_connect(&loopback()).unwrap_err().is_usage());
    assert!(socket.accept().unwrap_err().is_usage());
    assert!(socket.local_endpoint().unwrap_err().is_usage());
  }
}
