//! The socket primitive.
//!
//! A [`Socket`] owns one descriptor through a [`SocketHandle`] and caches the
//! [`SocketConfig`] it was created with. Transfers go straight to the OS and
//! report a [`Transfer`]:
//!
//! - interrupted calls are retried,
//! - "would block" on a non-blocking socket becomes [`Transfer::WouldBlock`]
//!   and on a blocking socket (a receive timeout, say) is retried,
//! - anything else is an [`Error::System`](crate::Error::System).

use std::net::Shutdown;

use crate::{
  config::{BlockingMode, Inheritance, SocketConfig},
  error::{Error, Result},
  handle::SocketHandle,
  sys::{self, Condition, RawSocket},
};

/// Outcome of a single [`Socket::send`] or [`Socket::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
  /// This many bytes moved. Zero only when the buffer was empty.
  Progressed(usize),
  /// Nothing moved and the socket is non-blocking; try again once the
  /// readiness source says so.
  WouldBlock,
  /// The OS accepted the call but moved nothing from a non-empty buffer.
  /// For a receive this is the peer's orderly shutdown.
  Eof,
}

impl Transfer {
  fn from_len(n: usize, requested: usize) -> Transfer {
    if n == 0 && requested > 0 { Transfer::Eof } else { Transfer::Progressed(n) }
  }

  /// Bytes moved; zero for [`Transfer::WouldBlock`] and [`Transfer::Eof`].
  pub fn bytes(&self) -> usize {
    match *self {
      Transfer::Progressed(n) => n,
      Transfer::WouldBlock | Transfer::Eof => 0,
    }
  }
}

#[derive(Debug)]
pub struct Socket {
  handle: SocketHandle,
  config: SocketConfig,
}

impl Socket {
  /// Opens a new descriptor.
  ///
  /// Non-blocking mode and close-on-exec are applied at creation where the
  /// platform supports it, and with follow-up calls elsewhere. Performs
  /// [`init`](crate::init) on first use.
  pub fn new(config: SocketConfig) -> Result<Socket> {
    crate::init()?;

    let raw = sys::retry(|| {
      sys::socket(
        config.family(),
        config.socket_kind(),
        config.socket_protocol(),
        config.is_nonblocking(),
        !config.is_inheritable(),
      )
    })
    .map_err(|err| Error::from_io("socket", &err))?;

    log::debug!("resock: opened socket {raw:?} ({config:?})");

    // SAFETY: freshly created and owned by nobody else.
    let handle = unsafe { SocketHandle::from_raw(raw) };
    Ok(Socket { handle, config })
  }

  /// Wraps a descriptor that already matches `config`.
  pub fn from_handle(handle: SocketHandle, config: SocketConfig) -> Socket {
    Socket { handle, config }
  }

  pub fn set_blocking(&mut self, mode: BlockingMode) -> Result<()> {
    if !self.is_valid() {
      return Err(Error::Usage("set_blocking on invalid socket"));
    }

    let nonblocking = mode == BlockingMode::NonBlocking;
    sys::set_nonblocking(self.raw(), nonblocking)
      .map_err(|err| Error::from_io("set_blocking", &err))?;
    self.config.set_blocking(mode);
    Ok(())
  }

  pub fn set_inheritable(&mut self, mode: Inheritance) -> Result<()> {
    if !self.is_valid() {
      return Err(Error::Usage("set_inheritable on invalid socket"));
    }

    let cloexec = mode == Inheritance::NonInheritable;
    sys::set_cloexec(self.raw(), cloexec)
      .map_err(|err| Error::from_io("set_inheritable", &err))?;
    self.config.set_inheritance(mode);
    Ok(())
  }

  pub fn send(&self, buf: &[u8]) -> Result<Transfer> {
    if !self.is_valid() {
      return Err(Error::Usage("send on invalid socket"));
    }

    self.transfer("send", buf.len(), || sys::send(self.raw(), buf))
  }

  pub fn recv(&self, buf: &mut [u8]) -> Result<Transfer> {
    if !self.is_valid() {
      return Err(Error::Usage("recv on invalid socket"));
    }

    let raw = self.raw();
    let requested = buf.len();
    self.transfer("recv", requested, || sys::recv(raw, buf))
  }

  fn transfer(
    &self,
    op: &'static str,
    requested: usize,
    mut call: impl FnMut() -> std::io::Result<usize>,
  ) -> Result<Transfer> {
    loop {
      let err = match call() {
        Ok(n) => return Ok(Transfer::from_len(n, requested)),
        Err(err) => err,
      };

      match sys::condition(&err) {
        Condition::Interrupted => continue,
        Condition::WouldBlock if self.config.is_nonblocking() => {
          return Ok(Transfer::WouldBlock);
        }
        Condition::WouldBlock => continue,
        _ => return Err(Error::from_io(op, &err)),
      }
    }
  }

  /// Disables one or both directions. Does nothing on an invalid socket.
  pub fn shutdown(&self, how: Shutdown) -> Result<()> {
    if !self.is_valid() {
      return Ok(());
    }

    sys::shutdown(self.raw(), how)
      .map_err(|err| Error::from_io("shutdown", &err))
  }

  /// Closes the descriptor; safe to call any number of times.
  pub fn close(&mut self) {
    self.handle.close();
  }

  /// Moves the descriptor and config into a new socket, leaving this one
  /// invalid.
  pub fn take(&mut self) -> Socket {
    Socket { handle: self.handle.take(), config: self.config }
  }

  pub fn is_valid(&self) -> bool {
    self.handle.is_valid()
  }

  pub fn raw(&self) -> RawSocket {
    self.handle.raw()
  }

  pub fn config(&self) -> &SocketConfig {
    &self.config
  }

  pub fn into_handle(mut self) -> SocketHandle {
    self.handle.take()
  }
}

impl_raw_socket!(Socket);

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::config::AddressFamily;

  fn nonblocking() -> SocketConfig {
    SocketConfig::new(AddressFamily::Ipv4).blocking(BlockingMode::NonBlocking)
  }

  #[test]
  fn new_socket_matches_its_config() {
    let socket = Socket::new(nonblocking()).unwrap();
    assert!(socket.is_valid());
    assert!(socket.config().is_nonblocking());

    let flags = unsafe { libc::fcntl(socket.raw(), libc::F_GETFL) };
    assert_ne!(flags & libc::O_NONBLOCK, 0);
  }

  #[test]
  fn set_blocking_updates_cached_mode() {
    let mut socket = Socket::new(SocketConfig::new(AddressFamily::Ipv4)).unwrap();
    assert!(!socket.config().is_nonblocking());

    socket.set_blocking(BlockingMode::NonBlocking).unwrap();
    assert!(socket.config().is_nonblocking());
    let flags = unsafe { libc::fcntl(socket.raw(), libc::F_GETFL) };
    assert_ne!(flags & libc::O_NONBLOCK, 0);

    socket.set_blocking(BlockingMode::Blocking).unwrap();
    assert!(!socket.config().is_nonblocking());
  }

  #[test]
  fn set_inheritable_toggles_cloexec() {
    let mut socket = Socket::new(SocketConfig::new(AddressFamily::Ipv4)).unwrap();

    socket.set_inheritable(Inheritance::NonInheritable).unwrap();
    assert!(!socket.config().is_inheritable());
    let flags = unsafe { libc::fcntl(socket.raw(), libc::F_GETFD) };
    assert_ne!(flags & libc::FD_CLOEXEC, 0);

    socket.set_inheritable(Inheritance::Inheritable).unwrap();
    let flags = unsafe { libc::fcntl(socket.raw(), libc::F_GETFD) };
    assert_eq!(flags & libc::FD_CLOEXEC, 0);
  }

  #[test]
  fn transfers_on_closed_socket_are_usage_errors() {
    let mut socket = Socket::new(nonblocking()).unwrap();
    socket.close();
    socket.close();

    assert_eq!(socket.send(b"x"), Err(Error::Usage("send on invalid socket")));
    assert_eq!(
      socket.recv(&mut [0; 4]),
      Err(Error::Usage("recv on invalid socket"))
    );
    assert_eq!(socket.shutdown(Shutdown::Both), Ok(()));
    assert!(socket.set_blocking(BlockingMode::Blocking).unwrap_err().is_usage());
  }

  #[test]
  fn recv_on_unconnected_socket_names_the_call() {
    let socket = Socket::new(nonblocking()).unwrap();
    let err = socket.recv(&mut [0; 4]).unwrap_err();
    assert_eq!(err.op(), Some("recv"));
    assert_eq!(err.raw_os_error(), Some(libc::ENOTCONN));
  }

  #[test]
  fn take_keeps_descriptor_and_config() {
    let mut source = Socket::new(nonblocking()).unwrap();
    let raw = source.raw();

    let target = source.take();
    assert!(!source.is_valid());
    assert_eq!(target.raw(), raw);
    assert_eq!(target.config(), &nonblocking());
  }

  #[test]
  fn transfer_length_distinguishes_eof() {
    assert_eq!(Transfer::from_len(0, 0), Transfer::Progressed(0));
    assert_eq!(Transfer::from_len(0, 8), Transfer::Eof);
    assert_eq!(Transfer::from_len(3, 8).bytes(), 3);
    assert_eq!(Transfer::WouldBlock.bytes(), 0);
  }
}
