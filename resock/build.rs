fn main() {
  cfg_aliases::cfg_aliases! {
      apple: { target_vendor = "apple" },
      // Platforms whose socket(2) accepts SOCK_NONBLOCK | SOCK_CLOEXEC and
      // which provide accept4(2).
      atomic_flags: { any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "hurd",
        target_os = "netbsd",
        target_os = "openbsd"
      ) },
  }
}
