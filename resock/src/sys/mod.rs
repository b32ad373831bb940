//! Platform boundary.
//!
//! Everything that differs between Unix and Windows lives below this module:
//! native descriptor types, the invalid sentinel, address storage, the raw
//! system calls and, most importantly, [`classify`], which collapses the
//! platform's error codes into one closed set of [`Condition`]s. Code above
//! this module never inspects an error code directly.

use std::io;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::*;

/// How an OS error code should be treated by the socket layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Condition {
  /// The call was interrupted by a signal and should simply be retried.
  Interrupted,
  /// A non-blocking call could not complete immediately.
  WouldBlock,
  /// A non-blocking connect was started (or is still running).
  InProgress,
  /// Anything else. Fatal for the operation that produced it.
  Other(i32),
}

/// Classifies an [`io::Error`] produced by one of this module's calls.
pub(crate) fn condition(err: &io::Error) -> Condition {
  match err.raw_os_error() {
    Some(code) => classify(code),
    None => Condition::Other(0),
  }
}

/// Runs `f` until it finishes with anything other than an interrupted call.
pub(crate) fn retry<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
  loop {
    match f() {
      Err(err) if condition(&err) == Condition::Interrupted => continue,
      res => return res,
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn classify_collapses_posix_codes() {
    assert_eq!(classify(libc::EINTR), Condition::Interrupted);
    assert_eq!(classify(libc::EAGAIN), Condition::WouldBlock);
    assert_eq!(classify(libc::EWOULDBLOCK), Condition::WouldBlock);
    assert_eq!(classify(libc::EINPROGRESS), Condition::InProgress);
    assert_eq!(classify(libc::EALREADY), Condition::InProgress);
    assert_eq!(
      classify(libc::ECONNREFUSED),
      Condition::Other(libc::ECONNREFUSED)
    );
  }

  #[test]
  fn retry_absorbs_interrupts_only() {
    let calls = Cell::new(0);
    let res = retry(|| {
      calls.set(calls.get() + 1);
      if calls.get() < 3 {
        Err(io::Error::from_raw_os_error(libc::EINTR))
      } else {
        Ok(calls.get())
      }
    });
    assert_eq!(res.unwrap(), 3);

    let calls = Cell::new(0);
    let res: io::Result<()> = retry(|| {
      calls.set(calls.get() + 1);
      Err(io::Error::from_raw_os_error(libc::EAGAIN))
    });
    assert_eq!(calls.get(), 1);
    assert_eq!(condition(&res.unwrap_err()), Condition::WouldBlock);
  }
}
