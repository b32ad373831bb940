//! Socket configuration.
//!
//! A [`SocketConfig`] describes how a socket is created. Family, kind and
//! protocol are fixed for the life of the socket; blocking mode and
//! inheritance can be changed later through
//! [`Socket::set_blocking`](crate::Socket::set_blocking) and
//! [`Socket::set_inheritable`](crate::Socket::set_inheritable), which keep the
//! cached copy in sync with the OS.
//!
//! ```rust
//! use resock::{AddressFamily, BlockingMode, SocketConfig};
//!
//! let config = SocketConfig::tcp(AddressFamily::Ipv4)
//!   .blocking(BlockingMode::NonBlocking);
//! assert!(config.is_nonblocking());
//! ```

use std::net::{IpAddr, SocketAddr};

/// Backlog used by [`Acceptor::bind`](crate::Acceptor::bind) callers that
/// have no better value.
pub const DEFAULT_BACKLOG: i32 = 128;

/// IP version of a socket (`AF_INET` / `AF_INET6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
  Ipv4,
  Ipv6,
}

impl AddressFamily {
  pub fn of_ip(ip: &IpAddr) -> AddressFamily {
    match ip {
      IpAddr::V4(_) => AddressFamily::Ipv4,
      IpAddr::V6(_) => AddressFamily::Ipv6,
    }
  }

  pub fn of(addr: &SocketAddr) -> AddressFamily {
    AddressFamily::of_ip(&addr.ip())
  }
}

/// Communication semantics (`SOCK_STREAM` / `SOCK_DGRAM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
  Stream,
  Datagram,
}

/// Transport protocol (`IPPROTO_TCP` / `IPPROTO_UDP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
  Tcp,
  Udp,
}

/// Whether calls wait for completion or report "would block".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockingMode {
  Blocking,
  NonBlocking,
}

/// Whether child processes inherit the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inheritance {
  Inheritable,
  /// Close-on-exec on Unix, `WSA_FLAG_NO_HANDLE_INHERIT` on Windows.
  NonInheritable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketConfig {
  family: AddressFamily,
  kind: SocketKind,
  protocol: Protocol,
  blocking: BlockingMode,
  inheritance: Inheritance,
}

impl SocketConfig {
  /// A blocking, inheritable stream socket over TCP.
  pub const fn new(family: AddressFamily) -> SocketConfig {
    SocketConfig {
      family,
      kind: SocketKind::Stream,
      protocol: Protocol::Tcp,
      blocking: BlockingMode::Blocking,
      inheritance: Inheritance::Inheritable,
    }
  }

  /// Same as [`SocketConfig::new`]; reads better at call sites that build a
  /// [`TcpSocket`](crate::TcpSocket).
  pub const fn tcp(family: AddressFamily) -> SocketConfig {
    SocketConfig::new(family)
  }

  pub const fn kind(mut self, kind: SocketKind) -> SocketConfig {
    self.kind = kind;
    self
  }

  pub const fn protocol(mut self, protocol: Protocol) -> SocketConfig {
    self.protocol = protocol;
    self
  }

  pub const fn blocking(mut self, blocking: BlockingMode) -> SocketConfig {
    self.blocking = blocking;
    self
  }

  pub const fn inheritance(mut self, inheritance: Inheritance) -> SocketConfig {
    self.inheritance = inheritance;
    self
  }

  pub const fn family(&self) -> AddressFamily {
    self.family
  }

  pub const fn socket_kind(&self) -> SocketKind {
    self.kind
  }

  pub const fn socket_protocol(&self) -> Protocol {
    self.protocol
  }

  pub const fn blocking_mode(&self) -> BlockingMode {
    self.blocking
  }

  pub const fn inheritance_mode(&self) -> Inheritance {
    self.inheritance
  }

  pub const fn is_nonblocking(&self) -> bool {
    matches!(self.blocking, BlockingMode::NonBlocking)
  }

  pub const fn is_inheritable(&self) -> bool {
    matches!(self.inheritance, Inheritance::Inheritable)
  }

  pub(crate) fn set_blocking(&mut self, blocking: BlockingMode) {
    self.blocking = blocking;
  }

  pub(crate) fn set_inheritance(&mut self, inheritance: Inheritance) {
    self.inheritance = inheritance;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_to_blocking_inheritable_tcp() {
    let config = SocketConfig::new(AddressFamily::Ipv6);
    assert_eq!(config.family(), AddressFamily::Ipv6);
    assert_eq!(config.socket_kind(), SocketKind::Stream);
    assert_eq!(config.socket_protocol(), Protocol::Tcp);
    assert!(!config.is_nonblocking());
    assert!(config.is_inheritable());
  }

  #[test]
  fn family_follows_the_address() {
    let v4: SocketAddr = "127.0.0.1:80".parse().unwrap();
    let v6: SocketAddr = "[::1]:80".parse().unwrap();
    assert_eq!(AddressFamily::of(&v4), AddressFamily::Ipv4);
    assert_eq!(AddressFamily::of(&v6), AddressFamily::Ipv6);
  }
}
