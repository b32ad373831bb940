//! Exclusively owned native socket descriptor.
//!
//! A [`SocketHandle`] holds either one open descriptor or the platform's
//! invalid sentinel (`-1` on Unix, `INVALID_SOCKET` on Windows). It cannot be
//! cloned; ownership moves with [`SocketHandle::take`] or Rust moves, and the
//! descriptor is closed at most once, either by [`SocketHandle::close`] or on
//! drop.
//!
//! ```rust
//! # #[cfg(unix)] {
//! use std::os::fd::FromRawFd;
//! use resock::SocketHandle;
//!
//! let mut handle = unsafe { SocketHandle::from_raw_fd(-1) };
//! assert!(!handle.is_valid());
//! handle.close(); // closing an invalid handle does nothing
//! # }
//! ```

use std::{fmt, mem};

use crate::sys::{self, INVALID_SOCKET, RawSocket};

pub struct SocketHandle {
  raw: RawSocket,
}

impl SocketHandle {
  /// Takes ownership of `raw`.
  ///
  /// # Safety
  ///
  /// `raw` must be an open socket that nothing else closes, or the invalid
  /// sentinel.
  pub unsafe fn from_raw(raw: RawSocket) -> SocketHandle {
    SocketHandle { raw }
  }

  pub const fn invalid() -> SocketHandle {
    SocketHandle { raw: INVALID_SOCKET }
  }

  pub fn is_valid(&self) -> bool {
    self.raw != INVALID_SOCKET
  }

  /// Borrows the native descriptor. Ownership stays with the handle.
  pub fn raw(&self) -> RawSocket {
    self.raw
  }

  /// Moves the descriptor into a new handle and leaves this one invalid.
  pub fn take(&mut self) -> SocketHandle {
    mem::replace(self, SocketHandle::invalid())
  }

  /// Releases ownership without closing.
  pub fn into_raw(mut self) -> RawSocket {
    mem::replace(&mut self.raw, INVALID_SOCKET)
  }

  /// Closes the descriptor. A failing close is logged, never returned; the
  /// handle is invalid afterwards either way.
  pub fn close(&mut self) {
    if !self.is_valid() {
      return;
    }

    let raw = mem::replace(&mut self.raw, INVALID_SOCKET);
    match sys::close(raw) {
      Ok(()) => log::trace!("resock: closed socket {raw:?}"),
      Err(err) => log::warn!("resock: close of socket {raw:?} failed: {err}"),
    }
  }
}

impl Drop for SocketHandle {
  fn drop(&mut self) {
    self.close();
  }
}

impl Default for SocketHandle {
  fn default() -> SocketHandle {
    SocketHandle::invalid()
  }
}

impl fmt::Debug for SocketHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_valid() {
      f.debug_tuple("SocketHandle").field(&self.raw).finish()
    } else {
      f.write_str("SocketHandle(invalid)")
    }
  }
}

impl_raw_socket!(SocketHandle);

#[cfg(unix)]
impl std::os::fd::FromRawFd for SocketHandle {
  unsafe fn from_raw_fd(fd: std::os::fd::RawFd) -> SocketHandle {
    SocketHandle { raw: fd }
  }
}

#[cfg(unix)]
impl std::os::fd::IntoRawFd for SocketHandle {
  fn into_raw_fd(self) -> std::os::fd::RawFd {
    self.into_raw()
  }
}

#[cfg(windows)]
impl std::os::windows::io::FromRawSocket for SocketHandle {
  unsafe fn from_raw_socket(
    socket: std::os::windows::io::RawSocket,
  ) -> SocketHandle {
    SocketHandle { raw: socket as RawSocket }
  }
}

#[cfg(windows)]
impl std::os::windows::io::IntoRawSocket for SocketHandle {
  fn into_raw_socket(self) -> std::os::windows::io::RawSocket {
    self.into_raw() as std::os::windows::io::RawSocket
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;

  fn open() -> SocketHandle {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0, "socket: {}", std::io::Error::last_os_error());
    unsafe { SocketHandle::from_raw(fd) }
  }

  fn is_open(fd: RawSocket) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
  }

  #[test]
  fn take_moves_the_exact_descriptor() {
    let mut source = open();
    let raw = source.raw();

    let target = source.take();
    assert!(!source.is_valid());
    assert_eq!(target.raw(), raw);
    assert!(is_open(raw));
  }

  #[test]
  fn close_is_idempotent() {
    let mut handle = open();

    handle.close();
    assert!(!handle.is_valid());
    assert_eq!(handle.raw(), INVALID_SOCKET);

    handle.close();
    assert!(!handle.is_valid());
  }

  #[test]
  fn into_raw_leaves_descriptor_open() {
    let handle = open();
    let raw = handle.into_raw();
    assert!(is_open(raw));
    unsafe { libc::close(raw) };
  }
}
