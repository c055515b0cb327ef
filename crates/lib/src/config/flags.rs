//! Flag composition.
//!
//! Each artifact kind gets its own [`FlagSet`], composed in a fixed order:
//!
//! 1. base flags (language level, warnings, include directories, project extras)
//! 2. profile flags (debug or release)
//! 3. the platform row's override fragment
//! 4. the artifact kind's fragment, which also carries the runtime search path
//!    convention of the platform family
//!
//! Stages only append. Conflicting tokens are left for the toolchain to settle.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::project::Layout;
use crate::platform::{PlatformTag, RuntimePathFamily};

const BASE_CFLAGS: &[&str] = &[
  "-std=c99",
  "-Wall",
  "-Wextra",
  "-Wno-unused-function",
  "-Wno-long-long",
  "-Wno-variadic-macros",
];

const DEBUG_CFLAGS: &[&str] = &["-O0", "-g", "-DDEBUG"];
const RELEASE_CFLAGS: &[&str] = &["-O3", "-DNDEBUG"];

/// The three kinds of artifact the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Library,
  Executable,
  Module,
}

impl ArtifactKind {
  pub const ALL: [ArtifactKind; 3] = [Self::Library, Self::Executable, Self::Module];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Library => "library",
      Self::Executable => "executable",
      Self::Module => "module",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
  Debug,
  #[default]
  Release,
}

impl Profile {
  fn cflags(&self) -> &'static [&'static str] {
    match self {
      Self::Debug => DEBUG_CFLAGS,
      Self::Release => RELEASE_CFLAGS,
    }
  }
}

/// Ordered compile and link tokens for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSet {
  pub kind: ArtifactKind,
  pub compile: Vec<String>,
  pub link: Vec<String>,
}

impl FlagSet {
  fn new(kind: ArtifactKind) -> Self {
    Self {
      kind,
      compile: Vec::new(),
      link: Vec::new(),
    }
  }

  fn compile<I, S>(mut self, tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.compile.extend(tokens.into_iter().map(Into::into));
    self
  }

  fn link<I, S>(mut self, tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.link.extend(tokens.into_iter().map(Into::into));
    self
  }

  /// Include directories named by `-I` tokens, in order.
  pub fn include_dirs(&self) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut tokens = self.compile.iter();
    while let Some(token) = tokens.next() {
      if token == "-I" {
        if let Some(dir) = tokens.next() {
          dirs.push(PathBuf::from(dir));
        }
      } else if let Some(dir) = token.strip_prefix("-I") {
        dirs.push(PathBuf::from(dir));
      }
    }
    dirs
  }

  /// SHA-256 over the compile tokens; changes whenever compilation would.
  pub fn digest(&self) -> String {
    let mut hasher = Sha256::new();
    for token in &self.compile {
      hasher.update(token.as_bytes());
      hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
  }
}

/// One flag set per artifact kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedFlags {
  pub library: FlagSet,
  pub executable: FlagSet,
  pub module: FlagSet,
}

impl ComposedFlags {
  pub fn get(&self, kind: ArtifactKind) -> &FlagSet {
    match kind {
      ArtifactKind::Library => &self.library,
      ArtifactKind::Executable => &self.executable,
      ArtifactKind::Module => &self.module,
    }
  }
}

/// Compose the flag sets for every artifact kind.
pub fn compose(tag: PlatformTag, profile: Profile, layout: &Layout, extra_cflags: &[String]) -> ComposedFlags {
  let row = tag.row();
  let layered = |kind: ArtifactKind| {
    FlagSet::new(kind)
      .compile(BASE_CFLAGS.iter().copied())
      .compile(layout.include_dirs.iter().map(|dir| include_flag(dir)))
      .compile(extra_cflags.iter().cloned())
      .compile(profile.cflags().iter().copied())
      .compile(row.cflags.iter().copied())
      .link(row.ldflags.iter().copied())
  };

  ComposedFlags {
    library: library_fragment(layered(ArtifactKind::Library), layout, row.family),
    executable: executable_fragment(layered(ArtifactKind::Executable), layout, row.family),
    module: module_fragment(layered(ArtifactKind::Module), layout, row.family),
  }
}

fn include_flag(dir: &Path) -> String {
  format!("-I{}", dir.display())
}

fn library_fragment(flags: FlagSet, layout: &Layout, family: RuntimePathFamily) -> FlagSet {
  let define = format!("-D{}_BUILD_DLL", layout.name.to_uppercase());
  let flags = flags.compile(["-fPIC".to_string(), "-fvisibility=hidden".to_string(), define]);
  match family {
    RuntimePathFamily::LoaderPath => flags.link([
      "-dynamiclib".to_string(),
      "-install_name".to_string(),
      format!("@loader_path/{}", layout.library_file_name()),
    ]),
    RuntimePathFamily::Origin => flags.link(["-shared"]),
  }
}

fn dependent_link(layout: &Layout) -> [String; 2] {
  [format!("-L{}", layout.bin_dir().display()), format!("-l{}", layout.name)]
}

fn runtime_path(family: RuntimePathFamily) -> &'static [&'static str] {
  match family {
    RuntimePathFamily::LoaderPath => &[],
    RuntimePathFamily::Origin => &["-Wl,-rpath,$ORIGIN"],
  }
}

fn executable_fragment(flags: FlagSet, layout: &Layout, family: RuntimePathFamily) -> FlagSet {
  flags
    .link(dependent_link(layout))
    .link(runtime_path(family).iter().copied())
}

fn module_fragment(flags: FlagSet, layout: &Layout, family: RuntimePathFamily) -> FlagSet {
  let shared: &[&str] = match family {
    RuntimePathFamily::LoaderPath => &["-bundle", "-undefined", "dynamic_lookup"],
    RuntimePathFamily::Origin => &["-shared"],
  };
  flags
    .compile(["-fPIC"])
    .link(shared.iter().copied())
    .link(dependent_link(layout))
    .link(runtime_path(family).iter().copied())
}
