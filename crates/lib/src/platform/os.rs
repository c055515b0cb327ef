use std::fmt;

/// Operating system families the host detector knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  Other(&'static str),
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Self {
    Self::from_rust_name(std::env::consts::OS)
  }

  /// Map a `std::env::consts::OS` value to an `Os`
  pub fn from_rust_name(name: &'static str) -> Self {
    match name {
      "linux" => Self::Linux,
      "macos" => Self::MacOs,
      "windows" => Self::Windows,
      other => Self::Other(other),
    }
  }

  /// Returns the kernel name as printed by `uname -s`
  pub fn kernel_name(&self) -> &'static str {
    match self {
      Self::Linux => "Linux",
      Self::MacOs => "Darwin",
      Self::Windows => "Windows_NT",
      Self::Other(name) => name,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.kernel_name())
  }
}
