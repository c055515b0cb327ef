use std::fmt;

use super::os::Os;

/// CPU architecture variants the host detector knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86,
  X86_64,
  Aarch64,
  Other(&'static str),
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Self {
    Self::from_rust_name(std::env::consts::ARCH)
  }

  /// Map a `std::env::consts::ARCH` value to an `Arch`
  pub fn from_rust_name(name: &'static str) -> Self {
    match name {
      "x86" => Self::X86,
      "x86_64" => Self::X86_64,
      "aarch64" => Self::Aarch64,
      other => Self::Other(other),
    }
  }

  /// Returns the machine name as printed by `uname -m` on the given OS
  pub fn machine_name(&self, os: Os) -> &'static str {
    match (self, os) {
      (Self::X86, Os::MacOs) => "i386",
      (Self::X86, _) => "i686",
      (Self::X86_64, _) => "x86_64",
      (Self::Aarch64, Os::MacOs) => "arm64",
      (Self::Aarch64, _) => "aarch64",
      (Self::Other(name), _) => name,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.machine_name(Os::current()))
  }
}
