//! IP address and port in the OS's own address representation.
//!
//! An [`Endpoint`] wraps a `sockaddr_storage` (`SOCKADDR_STORAGE` on Windows)
//! and the length the OS should use for it. System calls that read an address
//! (`bind`, `connect`) borrow [`Endpoint::as_ptr`] and [`Endpoint::addr_len`];
//! calls that write one (`accept`, `getsockname`) fill an
//! [`Endpoint::empty`] through [`Endpoint::as_mut_ptr`] and
//! [`Endpoint::addr_len_mut`].

use std::{
  fmt, mem,
  net::{AddrParseError, IpAddr, SocketAddr},
};

use crate::{
  config::AddressFamily,
  sys::{self, SockAddr, SockAddrStorage, SockLen},
};

#[derive(Clone, Copy)]
pub struct Endpoint {
  storage: SockAddrStorage,
  len: SockLen,
}

impl Endpoint {
  pub fn new(ip: IpAddr, port: u16) -> Endpoint {
    Endpoint::from(SocketAddr::new(ip, port))
  }

  /// Parses an IPv4 or IPv6 address in text form.
  ///
  /// ```rust
  /// let endpoint = resock::Endpoint::parse("::1", 8080).unwrap();
  /// assert_eq!(endpoint.to_string(), "[::1]:8080");
  /// assert!(resock::Endpoint::parse("localhost", 80).is_err());
  /// ```
  pub fn parse(address: &str, port: u16) -> Result<Endpoint, AddrParseError> {
    Ok(Endpoint::new(address.parse()?, port))
  }

  /// Zeroed storage whose length covers the whole buffer, ready to be filled
  /// in by the OS.
  pub fn empty() -> Endpoint {
    // SAFETY: the storage struct only holds integers; all zeroes is valid.
    let storage: SockAddrStorage = unsafe { mem::zeroed() };
    Endpoint { storage, len: Endpoint::capacity() }
  }

  /// Size of the underlying address buffer.
  pub fn capacity() -> SockLen {
    mem::size_of::<SockAddrStorage>() as SockLen
  }

  pub fn as_ptr(&self) -> *const SockAddr {
    &self.storage as *const SockAddrStorage as *const SockAddr
  }

  pub fn as_mut_ptr(&mut self) -> *mut SockAddr {
    &mut self.storage as *mut SockAddrStorage as *mut SockAddr
  }

  pub fn addr_len(&self) -> SockLen {
    self.len
  }

  pub fn addr_len_mut(&mut self) -> &mut SockLen {
    &mut self.len
  }

  pub fn set_addr_len(&mut self, len: SockLen) {
    self.len = len;
  }

  /// `None` when the storage holds no IPv4/IPv6 address, or the length is
  /// too short for the one it claims to hold.
  pub fn to_socket_addr(&self) -> Option<SocketAddr> {
    sys::storage_to_socket_addr(&self.storage, self.len)
  }

  pub fn ip(&self) -> Option<IpAddr> {
    self.to_socket_addr().map(|addr| addr.ip())
  }

  /// Port in host byte order, or 0 when no address is stored.
  pub fn port(&self) -> u16 {
    self.to_socket_addr().map_or(0, |addr| addr.port())
  }

  pub fn family(&self) -> Option<AddressFamily> {
    self.to_socket_addr().map(|addr| AddressFamily::of(&addr))
  }
}

impl From<SocketAddr> for Endpoint {
  fn from(addr: SocketAddr) -> Endpoint {
    let (storage, len) = sys::storage_from_socket_addr(addr);
    Endpoint { storage, len }
  }
}

impl PartialEq for Endpoint {
  fn eq(&self, other: &Endpoint) -> bool {
    self.to_socket_addr() == other.to_socket_addr()
  }
}

impl fmt::Debug for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.to_socket_addr() {
      Some(addr) => f.debug_tuple("Endpoint").field(&addr).finish(),
      None => f.debug_struct("Endpoint").field("len", &self.len).finish(),
    }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.to_socket_addr() {
      Some(addr) => addr.fmt(f),
      None => f.write_str("<unspecified>"),
    }
  }
}
