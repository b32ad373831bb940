//! Error type shared by every socket, connection and task operation.
//!
//! Transient conditions (interrupted system calls, and "would block" before a
//! suspension point) are absorbed by the operations themselves and never show
//! up here. What remains is one of two classes:
//!
//! - [`Error::System`]: the OS rejected an operation. Carries the name of the
//!   failing call and the raw OS error code.
//! - [`Error::Usage`]: the caller misused an object, for example sending on a
//!   socket that was closed or moved from.

use std::{fmt, io, result};

/// A convenience wrapper around `Result` for [`resock::Error`](Error).
pub type Result<T> = result::Result<T, Error>;

/// Failure raised by a socket, connection, acceptor or task.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
  /// An OS call failed.
  System {
    /// Name of the failing OS call, e.g. `"connect"`.
    op: &'static str,
    /// Raw OS error code (`errno` on Unix, `WSAGetLastError()` on Windows).
    code: i32,
  },
  /// The object was used in a state that does not allow the operation.
  Usage(&'static str),
}

impl Error {
  pub(crate) fn system(op: &'static str, code: i32) -> Error {
    Error::System { op, code }
  }

  pub(crate) fn from_io(op: &'static str, err: &io::Error) -> Error {
    Error::System { op, code: err.raw_os_error().unwrap_or(0) }
  }

  /// Returns the raw OS error code for system failures.
  pub fn raw_os_error(&self) -> Option<i32> {
    match *self {
      Error::System { code, .. } => Some(code),
      Error::Usage(_) => None,
    }
  }

  /// Returns the name of the OS call that failed, if any.
  pub fn op(&self) -> Option<&'static str> {
    match *self {
      Error::System { op, .. } => Some(op),
      Error::Usage(_) => None,
    }
  }

  /// Maps this error onto the portable [`io::ErrorKind`] taxonomy.
  pub fn kind(&self) -> io::ErrorKind {
    match *self {
      Error::System { code, .. } => io::Error::from_raw_os_error(code).kind(),
      Error::Usage(_) => io::ErrorKind::InvalidInput,
    }
  }

  pub fn is_usage(&self) -> bool {
    matches!(self, Error::Usage(_))
  }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self {
      Error::System { op, code } => {
        write!(f, "{op} failed: {}", io::Error::from_raw_os_error(code))
      }
      Error::Usage(msg) => write!(f, "invalid use: {msg}"),
    }
  }
}

impl From<Error> for io::Error {
  fn from(err: Error) -> io::Error {
    match err {
      Error::System { code, .. } => io::Error::from_raw_os_error(code),
      Error::Usage(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
    }
  }
}
