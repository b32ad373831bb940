use std::{
  io, mem,
  net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, SocketAddrV4, SocketAddrV6},
  ptr,
};

use windows_sys::Win32::{
  Foundation::{HANDLE, HANDLE_FLAG_INHERIT, SetHandleInformation},
  Networking::WinSock::{
    self as ws, AF_INET, AF_INET6, FIONBIO, IN_ADDR, IN_ADDR_0, IN6_ADDR,
    IN6_ADDR_0, IPPROTO_TCP, IPPROTO_UDP, SD_BOTH, SD_RECEIVE, SD_SEND,
    SO_ERROR, SO_REUSEADDR, SOCK_DGRAM, SOCK_STREAM, SOCKADDR,
    SOCKADDR_IN, SOCKADDR_IN6, SOCKADDR_IN6_0, SOCKADDR_STORAGE, SOCKET,
    SOCKET_ERROR, SOL_SOCKET, WSA_FLAG_NO_HANDLE_INHERIT,
    WSA_FLAG_OVERLAPPED, WSADATA, WSAEALREADY, WSAECONNRESET, WSAEINPROGRESS,
    WSAEINVAL, WSAEISCONN, WSAEWOULDBLOCK,
  },
};

use super::Condition;
use crate::{
  config::{AddressFamily, Protocol, SocketKind},
  endpoint::Endpoint,
};

pub(crate) type RawSocket = SOCKET;
pub(crate) type SockAddr = SOCKADDR;
pub(crate) type SockAddrStorage = SOCKADDR_STORAGE;
pub(crate) type SockLen = i32;

pub(crate) const INVALID_SOCKET: RawSocket = ws::INVALID_SOCKET;

/// Code reported when a send makes no progress without blocking.
pub(crate) const BROKEN_PIPE: i32 = WSAECONNRESET;

// Winsock never reports EINTR-style interruptions.
pub(crate) fn classify(code: i32) -> Condition {
  match code {
    WSAEWOULDBLOCK => Condition::WouldBlock,
    WSAEINPROGRESS | WSAEALREADY => Condition::InProgress,
    code => Condition::Other(code),
  }
}

pub(crate) fn is_already_connected(err: &io::Error) -> bool {
  err.raw_os_error() == Some(WSAEISCONN)
}

/// Winsock answers a connect repeated during the handshake with WSAEINVAL
/// (or WSAEALREADY / WSAEWOULDBLOCK, classified already).
pub(crate) fn is_connect_pending(err: &io::Error) -> bool {
  err.raw_os_error() == Some(WSAEINVAL)
}

fn last_error() -> io::Error {
  io::Error::from_raw_os_error(unsafe { ws::WSAGetLastError() })
}

fn cvt(res: i32) -> io::Result<i32> {
  if res == SOCKET_ERROR { Err(last_error()) } else { Ok(res) }
}

fn cvt_socket(socket: SOCKET) -> io::Result<SOCKET> {
  if socket == ws::INVALID_SOCKET { Err(last_error()) } else { Ok(socket) }
}

pub(crate) fn startup() -> io::Result<()> {
  // SAFETY: WSADATA is plain old data; WSAStartup fills it in.
  let mut data: WSADATA = unsafe { mem::zeroed() };
  match unsafe { ws::WSAStartup(0x202, &mut data) } {
    0 => Ok(()),
    code => Err(io::Error::from_raw_os_error(code)),
  }
}

pub(crate) fn cleanup() {
  unsafe { ws::WSACleanup() };
}

fn domain(family: AddressFamily) -> i32 {
  match family {
    AddressFamily::Ipv4 => AF_INET as i32,
    AddressFamily::Ipv6 => AF_INET6 as i32,
  }
}

fn socket_type(kind: SocketKind) -> i32 {
  match kind {
    SocketKind::Stream => SOCK_STREAM,
    SocketKind::Datagram => SOCK_DGRAM,
  }
}

fn protocol(proto: Protocol) -> i32 {
  match proto {
    Protocol::Tcp => IPPROTO_TCP,
    Protocol::Udp => IPPROTO_UDP,
  }
}

pub(crate) fn socket(
  family: AddressFamily,
  kind: SocketKind,
  proto: Protocol,
  nonblocking: bool,
  cloexec: bool,
) -> io::Result<RawSocket> {
  let mut flags = WSA_FLAG_OVERLAPPED;
  if cloexec {
    flags |= WSA_FLAG_NO_HANDLE_INHERIT;
  }

  let socket = cvt_socket(unsafe {
    ws::WSASocketW(
      domain(family),
      socket_type(kind),
      protocol(proto),
      ptr::null(),
      0,
      flags,
    )
  })?;

  if nonblocking {
    if let Err(err) = set_nonblocking(socket, true) {
      let _ = close(socket);
      return Err(err);
    }
  }

  Ok(socket)
}

pub(crate) fn set_nonblocking(socket: RawSocket, on: bool) -> io::Result<()> {
  let mut enable: u32 = on.into();
  cvt(unsafe { ws::ioctlsocket(socket, FIONBIO, &mut enable) }).map(drop)
}

pub(crate) fn set_cloexec(socket: RawSocket, on: bool) -> io::Result<()> {
  let flags = if on { 0 } else { HANDLE_FLAG_INHERIT };
  let ok = unsafe {
    SetHandleInformation(socket as HANDLE, HANDLE_FLAG_INHERIT, flags)
  };
  if ok == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

pub(crate) fn send(socket: RawSocket, buf: &[u8]) -> io::Result<usize> {
  let len = buf.len().min(i32::MAX as usize) as i32;
  let n = cvt(unsafe { ws::send(socket, buf.as_ptr(), len, 0) })?;
  Ok(n as usize)
}

pub(crate) fn recv(socket: RawSocket, buf: &mut [u8]) -> io::Result<usize> {
  let len = buf.len().min(i32::MAX as usize) as i32;
  let n = cvt(unsafe { ws::recv(socket, buf.as_mut_ptr(), len, 0) })?;
  Ok(n as usize)
}

pub(crate) fn shutdown(socket: RawSocket, how: Shutdown) -> io::Result<()> {
  let how = match how {
    Shutdown::Read => SD_RECEIVE,
    Shutdown::Write => SD_SEND,
    Shutdown::Both => SD_BOTH,
  };
  cvt(unsafe { ws::shutdown(socket, how) }).map(drop)
}

pub(crate) fn close(socket: RawSocket) -> io::Result<()> {
  cvt(unsafe { ws::closesocket(socket) }).map(drop)
}

/// A non-blocking connect reports `WSAEWOULDBLOCK`; it is rewritten to
/// `WSAEINPROGRESS` so the caller sees the same condition as on Unix.
pub(crate) fn connect(socket: RawSocket, endpoint: &Endpoint) -> io::Result<()> {
  match cvt(unsafe {
    ws::connect(socket, endpoint.as_ptr(), endpoint.addr_len())
  }) {
    Ok(_) => Ok(()),
    Err(err) if err.raw_os_error() == Some(WSAEWOULDBLOCK) => {
      Err(io::Error::from_raw_os_error(WSAEINPROGRESS))
    }
    Err(err) => Err(err),
  }
}

pub(crate) fn bind(socket: RawSocket, endpoint: &Endpoint) -> io::Result<()> {
  cvt(unsafe { ws::bind(socket, endpoint.as_ptr(), endpoint.addr_len()) })
    .map(drop)
}

pub(crate) fn listen(socket: RawSocket, backlog: i32) -> io::Result<()> {
  cvt(unsafe { ws::listen(socket, backlog) }).map(drop)
}

/// Accepted sockets inherit the listener's non-blocking mode, so it is set
/// explicitly.
pub(crate) fn accept(
  socket: RawSocket,
  nonblocking: bool,
  cloexec: bool,
) -> io::Result<(RawSocket, Endpoint)> {
  let mut peer = Endpoint::empty();
  let accepted = cvt_socket(unsafe {
    ws::accept(socket, peer.as_mut_ptr(), peer.addr_len_mut())
  })?;

  let configured = set_nonblocking(accepted, nonblocking)
    .and_then(|()| if cloexec { set_cloexec(accepted, true) } else { Ok(()) });
  if let Err(err) = configured {
    let _ = close(accepted);
    return Err(err);
  }

  Ok((accepted, peer))
}

pub(crate) fn local_endpoint(socket: RawSocket) -> io::Result<Endpoint> {
  let mut endpoint = Endpoint::empty();
  cvt(unsafe {
    ws::getsockname(socket, endpoint.as_mut_ptr(), endpoint.addr_len_mut())
  })?;
  Ok(endpoint)
}

pub(crate) fn peer_endpoint(socket: RawSocket) -> io::Result<Endpoint> {
  let mut endpoint = Endpoint::empty();
  cvt(unsafe {
    ws::getpeername(socket, endpoint.as_mut_ptr(), endpoint.addr_len_mut())
  })?;
  Ok(endpoint)
}

pub(crate) fn set_reuse_address(socket: RawSocket, on: bool) -> io::Result<()> {
  let value: i32 = on.into();
  cvt(unsafe {
    ws::setsockopt(
      socket,
      SOL_SOCKET,
      SO_REUSEADDR,
      &value as *const i32 as *const u8,
      mem::size_of::<i32>() as i32,
    )
  })
  .map(drop)
}

pub(crate) fn take_error(socket: RawSocket) -> io::Result<Option<i32>> {
  let mut value: i32 = 0;
  let mut len = mem::size_of::<i32>() as i32;
  cvt(unsafe {
    ws::getsockopt(
      socket,
      SOL_SOCKET,
      SO_ERROR,
      &mut value as *mut i32 as *mut u8,
      &mut len,
    )
  })?;
  Ok(if value == 0 { None } else { Some(value) })
}

pub(crate) fn storage_from_socket_addr(
  addr: SocketAddr,
) -> (SockAddrStorage, SockLen) {
  // SAFETY: SOCKADDR_STORAGE only holds integers; all zeroes is valid.
  let mut storage: SockAddrStorage = unsafe { mem::zeroed() };
  let len = match addr {
    SocketAddr::V4(v4) => {
      let sin = SOCKADDR_IN {
        sin_family: AF_INET,
        sin_port: v4.port().to_be(),
        sin_addr: IN_ADDR {
          S_un: IN_ADDR_0 { S_addr: u32::from(*v4.ip()).to_be() },
        },
        sin_zero: [0; 8],
      };
      // SAFETY: SOCKADDR_STORAGE is large and aligned enough for SOCKADDR_IN.
      unsafe {
        ptr::write(&mut storage as *mut SockAddrStorage as *mut SOCKADDR_IN, sin)
      };
      mem::size_of::<SOCKADDR_IN>()
    }
    SocketAddr::V6(v6) => {
      let sin6 = SOCKADDR_IN6 {
        sin6_family: AF_INET6,
        sin6_port: v6.port().to_be(),
        sin6_flowinfo: v6.flowinfo(),
        sin6_addr: IN6_ADDR { u: IN6_ADDR_0 { Byte: v6.ip().octets() } },
        Anonymous: SOCKADDR_IN6_0 { sin6_scope_id: v6.scope_id() },
      };
      // SAFETY: SOCKADDR_STORAGE is large and aligned enough for SOCKADDR_IN6.
      unsafe {
        ptr::write(
          &mut storage as *mut SockAddrStorage as *mut SOCKADDR_IN6,
          sin6,
        )
      };
      mem::size_of::<SOCKADDR_IN6>()
    }
  };

  (storage, len as SockLen)
}

pub(crate) fn storage_to_socket_addr(
  storage: &SockAddrStorage,
  len: SockLen,
) -> Option<SocketAddr> {
  let len = len as usize;

  match storage.ss_family {
    AF_INET if len >= mem::size_of::<SOCKADDR_IN>() => {
      // SAFETY: family and length say the storage holds a SOCKADDR_IN.
      let sin =
        unsafe { *(storage as *const SockAddrStorage as *const SOCKADDR_IN) };
      // SAFETY: every variant of the IN_ADDR union is plain integers.
      let ip = Ipv4Addr::from(u32::from_be(unsafe { sin.sin_addr.S_un.S_addr }));
      Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
    }
    AF_INET6 if len >= mem::size_of::<SOCKADDR_IN6>() => {
      // SAFETY: family and length say the storage holds a SOCKADDR_IN6.
      let sin6 =
        unsafe { *(storage as *const SockAddrStorage as *const SOCKADDR_IN6) };
      // SAFETY: every variant of both unions is plain integers.
      let (ip, scope_id) =
        unsafe { (sin6.sin6_addr.u.Byte, sin6.Anonymous.sin6_scope_id) };
      Some(SocketAddr::V6(SocketAddrV6::new(
        Ipv6Addr::from(ip),
        u16::from_be(sin6.sin6_port),
        sin6.sin6_flowinfo,
        scope_id,
      )))
    }
    _ => None,
  }
}
