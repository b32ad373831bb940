//! # resock
//!
//! Owned OS sockets with suspend/resume stream connections.
//!
//! resock creates and owns socket descriptors, papers over the differences
//! between the Unix and Windows socket APIs, and builds asynchronous
//! connections and listeners on top of non-blocking stream sockets. It has no
//! event loop of its own: an operation that cannot finish suspends, and the
//! integrator's readiness source (epoll, kqueue, IOCP, a plain `poll`) resumes
//! it by calling `notify_readable` / `notify_writable`.
//!
//! ## Layers
//!
//! | Type                    | Role                                             |
//! |-------------------------|--------------------------------------------------|
//! | [`Task`]                | lazy single-result computation                   |
//! | [`Socket`]              | one owned descriptor; raw send/recv              |
//! | [`TcpSocket`]           | connect, bind, listen, accept                    |
//! | [`Connection`]          | `async_read` / `async_write` / `async_connect`   |
//! | [`Acceptor`]            | `async_accept`                                   |
//! | [`AsyncConnection`] / [`AsyncAcceptor`] | transport-independent interfaces |
//!
//! ## Quick Start
//!
//! ```rust
//! use resock::{Acceptor, AddressFamily, Connection, Endpoint};
//!
//! # fn main() -> resock::Result<()> {
//! let acceptor = Acceptor::bind(Endpoint::parse("127.0.0.1", 0).unwrap(), 16)?;
//! let server = acceptor.local_endpoint()?;
//!
//! let client = Connection::new(AddressFamily::Ipv4)?;
//! client.async_connect(server).get()?;
//! let conn = acceptor.async_accept().get()?;
//!
//! client.async_write(b"hello").get()?;
//! let mut buf = [0u8; 5];
//! let n = conn.async_read(&mut buf).get()?;
//! assert_eq!(&buf[..n], b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Everything is single-threaded and cooperative. [`Connection`] and
//! [`Acceptor`] are `!Sync`; notifications coming from another thread must be
//! marshalled by the integrator.
//!
//! ## Error Handling
//!
//! Interrupted system calls and "would block" before a suspension point are
//! handled internally. Everything else is an [`Error`]: either
//! [`Error::System`] naming the failing call, or [`Error::Usage`]. Failures of
//! asynchronous operations are stored in the [`Task`] and returned when its
//! outcome is retrieved.

#[macro_use]
mod macros;

mod sync;
mod sys;

pub mod acceptor;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod handle;
mod ops;
pub mod socket;
pub mod task;
pub mod tcp;
pub mod transport;
pub mod waiter;

use std::sync::atomic::{AtomicBool, Ordering};

pub use acceptor::Acceptor;
pub use config::{
  AddressFamily, BlockingMode, DEFAULT_BACKLOG, Inheritance, Protocol,
  SocketConfig, SocketKind,
};
pub use connection::Connection;
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use handle::SocketHandle;
pub use socket::{Socket, Transfer};
pub use task::{Status, Task};
pub use tcp::{ConnectStatus, TcpSocket};
pub use transport::{AsyncAcceptor, AsyncConnection};
pub use waiter::WaiterSlot;

static INITIALISED: AtomicBool = AtomicBool::new(false);

/// Brings up the platform socket library (`WSAStartup` on Windows).
///
/// [`Socket::new`] calls this on first use, so calling it directly is only
/// needed to surface a startup failure early. Calling it again is a no-op.
pub fn init() -> Result<()> {
  if INITIALISED.load(Ordering::Acquire) {
    return Ok(());
  }

  sys::startup().map_err(|err| Error::from_io("startup", &err))?;

  // Lost a race with another thread; give back the extra reference.
  if INITIALISED.swap(true, Ordering::AcqRel) {
    sys::cleanup();
  } else {
    log::debug!("resock: socket library initialised");
  }
  Ok(())
}

/// Releases what [`init`] acquired. Sockets created afterwards bring the
/// library up again.
pub fn exit() {
  if INITIALISED.swap(false, Ordering::AcqRel) {
    sys::cleanup();
    log::debug!("resock: socket library released");
  }
}

pub fn is_initialised() -> bool {
  INITIALISED.load(Ordering::Acquire)
}
