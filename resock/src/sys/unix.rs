use std::{
  io, mem,
  net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, SocketAddrV4, SocketAddrV6},
  ptr,
};

use super::Condition;
use crate::{
  config::{AddressFamily, Protocol, SocketKind},
  endpoint::Endpoint,
};

pub(crate) type RawSocket = libc::c_int;
pub(crate) type SockAddr = libc::sockaddr;
pub(crate) type SockAddrStorage = libc::sockaddr_storage;
pub(crate) type SockLen = libc::socklen_t;

pub(crate) const INVALID_SOCKET: RawSocket = -1;

/// Code reported when a send makes no progress without blocking.
pub(crate) const BROKEN_PIPE: i32 = libc::EPIPE;

#[cfg(not(apple))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(apple)]
const SEND_FLAGS: libc::c_int = 0;

pub(crate) fn classify(code: i32) -> Condition {
  match code {
    libc::EINTR => Condition::Interrupted,
    // EAGAIN and EWOULDBLOCK share a value on most, but not all, targets.
    #[allow(unreachable_patterns)]
    libc::EAGAIN | libc::EWOULDBLOCK => Condition::WouldBlock,
    libc::EINPROGRESS | libc::EALREADY => Condition::InProgress,
    code => Condition::Other(code),
  }
}

pub(crate) fn is_already_connected(err: &io::Error) -> bool {
  err.raw_os_error() == Some(libc::EISCONN)
}

/// Extra codes a repeated connect reports while the first one is still
/// running. EALREADY is already classified as in progress.
pub(crate) fn is_connect_pending(_err: &io::Error) -> bool {
  false
}

pub(crate) fn startup() -> io::Result<()> {
  Ok(())
}

pub(crate) fn cleanup() {}

fn domain(family: AddressFamily) -> libc::c_int {
  match family {
    AddressFamily::Ipv4 => libc::AF_INET,
    AddressFamily::Ipv6 => libc::AF_INET6,
  }
}

fn socket_type(kind: SocketKind) -> libc::c_int {
  match kind {
    SocketKind::Stream => libc::SOCK_STREAM,
    SocketKind::Datagram => libc::SOCK_DGRAM,
  }
}

fn protocol(proto: Protocol) -> libc::c_int {
  match proto {
    Protocol::Tcp => libc::IPPROTO_TCP,
    Protocol::Udp => libc::IPPROTO_UDP,
  }
}

fn shutdown_how(how: Shutdown) -> libc::c_int {
  match how {
    Shutdown::Read => libc::SHUT_RD,
    Shutdown::Write => libc::SHUT_WR,
    Shutdown::Both => libc::SHUT_RDWR,
  }
}

pub(crate) fn socket(
  family: AddressFamily,
  kind: SocketKind,
  proto: Protocol,
  nonblocking: bool,
  cloexec: bool,
) -> io::Result<RawSocket> {
  #[cfg(atomic_flags)]
  let fd = {
    let mut ty = socket_type(kind);
    if nonblocking {
      ty |= libc::SOCK_NONBLOCK;
    }
    if cloexec {
      ty |= libc::SOCK_CLOEXEC;
    }
    syscall!(socket(domain(family), ty, protocol(proto)))?
  };

  #[cfg(not(atomic_flags))]
  let fd = {
    let fd =
      syscall!(socket(domain(family), socket_type(kind), protocol(proto)))?;

    // Ensure the socket is closed if either of the `fcntl` calls error below
    if let Err(err) = configure(fd, nonblocking, cloexec) {
      let _ = close(fd);
      return Err(err);
    }
    fd
  };

  #[cfg(apple)]
  {
    let on: libc::c_int = 1;
    if let Err(err) = syscall!(setsockopt(
      fd,
      libc::SOL_SOCKET,
      libc::SO_NOSIGPIPE,
      &on as *const libc::c_int as *const libc::c_void,
      mem::size_of::<libc::c_int>() as libc::socklen_t,
    )) {
      let _ = close(fd);
      return Err(err);
    }
  }

  Ok(fd)
}

#[cfg(not(atomic_flags))]
fn configure(fd: RawSocket, nonblocking: bool, cloexec: bool) -> io::Result<()> {
  if nonblocking {
    set_nonblocking(fd, true)?;
  }
  if cloexec {
    set_cloexec(fd, true)?;
  }
  Ok(())
}

pub(crate) fn set_nonblocking(fd: RawSocket, on: bool) -> io::Result<()> {
  let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
  let new =
    if on { flags | libc::O_NONBLOCK } else { flags & !libc::O_NONBLOCK };
  if new != flags {
    syscall!(fcntl(fd, libc::F_SETFL, new))?;
  }
  Ok(())
}

pub(crate) fn set_cloexec(fd: RawSocket, on: bool) -> io::Result<()> {
  let flags = syscall!(fcntl(fd, libc::F_GETFD))?;
  let new = if on { flags | libc::FD_CLOEXEC } else { flags & !libc::FD_CLOEXEC };
  if new != flags {
    syscall!(fcntl(fd, libc::F_SETFD, new))?;
  }
  Ok(())
}

pub(crate) fn send(fd: RawSocket, buf: &[u8]) -> io::Result<usize> {
  let n = syscall!(send(fd, buf.as_ptr().cast(), buf.len(), SEND_FLAGS))?;
  Ok(n as usize)
}

pub(crate) fn recv(fd: RawSocket, buf: &mut [u8]) -> io::Result<usize> {
  let n = syscall!(recv(fd, buf.as_mut_ptr().cast(), buf.len(), 0))?;
  Ok(n as usize)
}

pub(crate) fn shutdown(fd: RawSocket, how: Shutdown) -> io::Result<()> {
  syscall!(shutdown(fd, shutdown_how(how))).map(drop)
}

pub(crate) fn close(fd: RawSocket) -> io::Result<()> {
  syscall!(close(fd)).map(drop)
}

pub(crate) fn connect(fd: RawSocket, endpoint: &Endpoint) -> io::Result<()> {
  syscall!(connect(fd, endpoint.as_ptr(), endpoint.addr_len())).map(drop)
}

pub(crate) fn bind(fd: RawSocket, endpoint: &Endpoint) -> io::Result<()> {
  syscall!(bind(fd, endpoint.as_ptr(), endpoint.addr_len())).map(drop)
}

pub(crate) fn listen(fd: RawSocket, backlog: i32) -> io::Result<()> {
  syscall!(listen(fd, backlog)).map(drop)
}

/// Accepts one pending connection. The new socket gets `nonblocking` and
/// `cloexec` regardless of what the platform would inherit from `fd`.
pub(crate) fn accept(
  fd: RawSocket,
  nonblocking: bool,
  cloexec: bool,
) -> io::Result<(RawSocket, Endpoint)> {
  let mut peer = Endpoint::empty();

  #[cfg(atomic_flags)]
  let socket = {
    let mut flags = 0;
    if nonblocking {
      flags |= libc::SOCK_NONBLOCK;
    }
    if cloexec {
      flags |= libc::SOCK_CLOEXEC;
    }
    syscall!(accept4(fd, peer.as_mut_ptr(), peer.addr_len_mut(), flags))?
  };

  // BSD-derived stacks copy O_NONBLOCK from the listener, so both flags are
  // set explicitly.
  #[cfg(not(atomic_flags))]
  let socket = {
    let socket = syscall!(accept(fd, peer.as_mut_ptr(), peer.addr_len_mut()))?;
    let configured = set_nonblocking(socket, nonblocking)
      .and_then(|()| if cloexec { set_cloexec(socket, true) } else { Ok(()) });
    if let Err(err) = configured {
      let _ = close(socket);
      return Err(err);
    }
    socket
  };

  Ok((socket, peer))
}

pub(crate) fn local_endpoint(fd: RawSocket) -> io::Result<Endpoint> {
  let mut endpoint = Endpoint::empty();
  syscall!(getsockname(fd, endpoint.as_mut_ptr(), endpoint.addr_len_mut()))?;
  Ok(endpoint)
}

pub(crate) fn peer_endpoint(fd: RawSocket) -> io::Result<Endpoint> {
  let mut endpoint = Endpoint::empty();
  syscall!(getpeername(fd, endpoint.as_mut_ptr(), endpoint.addr_len_mut()))?;
  Ok(endpoint)
}

pub(crate) fn set_reuse_address(fd: RawSocket, on: bool) -> io::Result<()> {
  let value: libc::c_int = on.into();
  syscall!(setsockopt(
    fd,
    libc::SOL_SOCKET,
    libc::SO_REUSEADDR,
    &value as *const libc::c_int as *const libc::c_void,
    mem::size_of::<libc::c_int>() as libc::socklen_t,
  ))
  .map(drop)
}

/// Reads and clears `SO_ERROR`.
pub(crate) fn take_error(fd: RawSocket) -> io::Result<Option<i32>> {
  let mut value: libc::c_int = 0;
  let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
  syscall!(getsockopt(
    fd,
    libc::SOL_SOCKET,
    libc::SO_ERROR,
    &mut value as *mut libc::c_int as *mut libc::c_void,
    &mut len,
  ))?;
  Ok(if value == 0 { None } else { Some(value) })
}

pub(crate) fn storage_from_socket_addr(
  addr: SocketAddr,
) -> (SockAddrStorage, SockLen) {
  // SAFETY: sockaddr_storage is a C struct designed to hold any socket address type.
  // Zero-initialization is valid - all fields are primitive types where zero is safe.
  let mut storage: SockAddrStorage = unsafe { mem::zeroed() };
  let len = match addr {
    // SAFETY: the source is a valid sockaddr_in on the stack, the destination
    // is at least as large by definition of sockaddr_storage, and the two
    // regions don't overlap.
    SocketAddr::V4(v4) => unsafe {
      ptr::copy_nonoverlapping(
        &into_addr(v4) as *const libc::sockaddr_in as *const u8,
        &mut storage as *mut SockAddrStorage as *mut u8,
        mem::size_of::<libc::sockaddr_in>(),
      );
      mem::size_of::<libc::sockaddr_in>()
    },
    // SAFETY: same as above, for sockaddr_in6.
    SocketAddr::V6(v6) => unsafe {
      ptr::copy_nonoverlapping(
        &into_addr6(v6) as *const libc::sockaddr_in6 as *const u8,
        &mut storage as *mut SockAddrStorage as *mut u8,
        mem::size_of::<libc::sockaddr_in6>(),
      );
      mem::size_of::<libc::sockaddr_in6>()
    },
  };

  (storage, len as SockLen)
}

pub(crate) fn storage_to_socket_addr(
  storage: &SockAddrStorage,
  len: SockLen,
) -> Option<SocketAddr> {
  let len = len as usize;

  if storage.ss_family == libc::AF_INET as libc::sa_family_t {
    if len < mem::size_of::<libc::sockaddr_in>() {
      return None;
    }
    // SAFETY: ss_family is AF_INET and the length covers a sockaddr_in, so
    // the storage holds one. sockaddr_storage is suitably aligned for it.
    let sin = unsafe {
      *(storage as *const SockAddrStorage as *const libc::sockaddr_in)
    };
    let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
    Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
  } else if storage.ss_family == libc::AF_INET6 as libc::sa_family_t {
    if len < mem::size_of::<libc::sockaddr_in6>() {
      return None;
    }
    // SAFETY: same as above, for sockaddr_in6.
    let sin6 = unsafe {
      *(storage as *const SockAddrStorage as *const libc::sockaddr_in6)
    };
    Some(SocketAddr::V6(SocketAddrV6::new(
      Ipv6Addr::from(sin6.sin6_addr.s6_addr),
      u16::from_be(sin6.sin6_port),
      sin6.sin6_flowinfo,
      sin6.sin6_scope_id,
    )))
  } else {
    None
  }
}

fn into_addr(addr: SocketAddrV4) -> libc::sockaddr_in {
  // SAFETY: sockaddr_in is a C struct with primitive integer fields.
  // Zero-initialization is safe - all fields accept zero as a valid value.
  let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };

  #[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
  ))]
  {
    sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
  }
  sin.sin_family = libc::AF_INET as libc::sa_family_t;
  sin.sin_port = addr.port().to_be();
  sin.sin_addr = libc::in_addr { s_addr: u32::from(*addr.ip()).to_be() };

  sin
}

fn into_addr6(addr: SocketAddrV6) -> libc::sockaddr_in6 {
  // SAFETY: sockaddr_in6 is a C struct with primitive integer/array fields.
  // Zero-initialization is safe - all fields accept zero as a valid value.
  let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };

  #[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
  ))]
  {
    sin6.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
  }
  sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
  sin6.sin6_port = addr.port().to_be();
  sin6.sin6_flowinfo = addr.flowinfo();
  sin6.sin6_scope_id = addr.scope_id();
  sin6.sin6_addr = libc::in6_addr { s6_addr: addr.ip().octets() };

  sin6
}
