/// Calls a `libc` function and turns the `-1` sentinel into
/// [`io::Error::last_os_error`](std::io::Error::last_os_error).
#[cfg(unix)]
macro_rules! syscall {
  ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
    #[allow(unused_unsafe)]
    let res = unsafe { libc::$fn($($arg, )*) };
    if res == -1 {
      Err(std::io::Error::last_os_error())
    } else {
      Ok(res)
    }
  }};
}

/// Exposes the native socket of a type whose `raw()` returns it.
macro_rules! impl_raw_socket {
  ($ty:ty) => {
    #[cfg(unix)]
    impl std::os::fd::AsRawFd for $ty {
      fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.raw()
      }
    }

    #[cfg(windows)]
    impl std::os::windows::io::AsRawSocket for $ty {
      fn as_raw_socket(&self) -> std::os::windows::io::RawSocket {
        self.raw() as std::os::windows::io::RawSocket
      }
    }
  };
}
