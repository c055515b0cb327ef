//! Host platform resolution.
//!
//! A raw host string in `uname -sm` form (e.g. `"Linux x86_64"`) is mapped to a
//! canonical [`PlatformTag`] through [`PLATFORM_TABLE`]. Everything that varies
//! per platform (file suffixes, runtime search path convention, extra flags)
//! lives in the table row, so supporting a new host means adding one row.

pub mod arch;
pub mod os;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::HOST_ENV;
use arch::Arch;
use os::Os;

/// Canonical identifier for a supported OS/CPU combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTag {
  Maci,
  Maci64,
  Maca64,
  Glnx86,
  Glnxa64,
  Glnxarm64,
}

/// How dependents locate the shared library at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimePathFamily {
  /// The library embeds a self-relative install name (`@loader_path`).
  LoaderPath,
  /// Each dependent carries an explicit `$ORIGIN` runtime search path.
  Origin,
}

/// One row of the platform table.
#[derive(Debug)]
pub struct PlatformRow {
  /// Raw host strings (`uname -sm`) that resolve to this row.
  pub hosts: &'static [&'static str],
  pub tag: PlatformTag,
  pub family: RuntimePathFamily,
  pub lib_suffix: &'static str,
  pub module_suffix: &'static str,
  /// Compile flags appended for every artifact kind.
  pub cflags: &'static [&'static str],
  /// Link flags appended for every artifact kind.
  pub ldflags: &'static [&'static str],
}

pub const PLATFORM_TABLE: &[PlatformRow] = &[
  PlatformRow {
    hosts: &["Darwin i386"],
    tag: PlatformTag::Maci,
    family: RuntimePathFamily::LoaderPath,
    lib_suffix: "dylib",
    module_suffix: "mexmaci",
    cflags: &["-m32"],
    ldflags: &["-m32"],
  },
  PlatformRow {
    hosts: &["Darwin x86_64"],
    tag: PlatformTag::Maci64,
    family: RuntimePathFamily::LoaderPath,
    lib_suffix: "dylib",
    module_suffix: "mexmaci64",
    cflags: &["-m64"],
    ldflags: &["-m64"],
  },
  PlatformRow {
    hosts: &["Darwin arm64"],
    tag: PlatformTag::Maca64,
    family: RuntimePathFamily::LoaderPath,
    lib_suffix: "dylib",
    module_suffix: "mexmaca64",
    cflags: &[],
    ldflags: &[],
  },
  PlatformRow {
    hosts: &["Linux i386", "Linux i486", "Linux i586", "Linux i686"],
    tag: PlatformTag::Glnx86,
    family: RuntimePathFamily::Origin,
    lib_suffix: "so",
    module_suffix: "mexglx",
    cflags: &["-m32", "-march=i686"],
    ldflags: &["-m32", "-lm", "-lpthread"],
  },
  PlatformRow {
    hosts: &["Linux x86_64"],
    tag: PlatformTag::Glnxa64,
    family: RuntimePathFamily::Origin,
    lib_suffix: "so",
    module_suffix: "mexa64",
    cflags: &["-m64"],
    ldflags: &["-m64", "-lm", "-lpthread"],
  },
  PlatformRow {
    hosts: &["Linux aarch64", "Linux arm64"],
    tag: PlatformTag::Glnxarm64,
    family: RuntimePathFamily::Origin,
    lib_suffix: "so",
    module_suffix: "mexarm64",
    cflags: &[],
    ldflags: &["-lm", "-lpthread"],
  },
];

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error(
    "unsupported host platform '{raw}'\n\
     Add a row for it to PLATFORM_TABLE in crates/lib/src/platform/mod.rs, \
     or pass --host with one of: {known}"
  )]
  UnresolvedPlatform { raw: String, known: String },
}

impl PlatformTag {
  /// Returns the lowercase tag name used for output directories
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Maci => "maci",
      Self::Maci64 => "maci64",
      Self::Maca64 => "maca64",
      Self::Glnx86 => "glnx86",
      Self::Glnxa64 => "glnxa64",
      Self::Glnxarm64 => "glnxarm64",
    }
  }

  /// The table row describing this platform.
  pub fn row(&self) -> &'static PlatformRow {
    PLATFORM_TABLE
      .iter()
      .find(|row| row.tag == *self)
      .expect("every PlatformTag has a PLATFORM_TABLE row")
  }

  pub fn family(&self) -> RuntimePathFamily {
    self.row().family
  }

  pub fn lib_suffix(&self) -> &'static str {
    self.row().lib_suffix
  }

  pub fn module_suffix(&self) -> &'static str {
    self.row().module_suffix
  }
}

impl fmt::Display for PlatformTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Resolve a raw host string to its platform tag.
///
/// Runs of whitespace are collapsed before matching, so `uname -sm` output
/// with a trailing newline is accepted as is.
pub fn resolve(raw: &str) -> Result<PlatformTag, PlatformError> {
  let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

  let tag = PLATFORM_TABLE
    .iter()
    .find(|row| row.hosts.contains(&normalized.as_str()))
    .map(|row| row.tag)
    .ok_or_else(|| PlatformError::UnresolvedPlatform {
      raw: raw.to_string(),
      known: known_hosts().join(", "),
    })?;

  debug!(host = %normalized, tag = %tag, "resolved platform");
  Ok(tag)
}

/// Every raw host string present in the table.
pub fn known_hosts() -> Vec<&'static str> {
  PLATFORM_TABLE.iter().flat_map(|row| row.hosts.iter().copied()).collect()
}

/// Describe the running host in `uname -sm` form
pub fn detect_host() -> String {
  let os = Os::current();
  format!("{} {}", os.kernel_name(), Arch::current().machine_name(os))
}

/// Pick the raw host string: explicit override, then `CFORGE_HOST`, then detection.
pub fn raw_host(explicit: Option<&str>) -> String {
  if let Some(raw) = explicit {
    return raw.to_string();
  }
  match std::env::var(HOST_ENV) {
    Ok(raw) if !raw.trim().is_empty() => raw,
    _ => detect_host(),
  }
}
