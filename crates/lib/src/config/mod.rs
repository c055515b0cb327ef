//! Build configuration.
//!
//! Everything a build needs to know is resolved once into an immutable
//! [`BuildConfig`] and handed to every builder. Nothing downstream reads the
//! environment or the project file again.
//!
//! # Submodules
//!
//! - [`flags`] - per-artifact flag composition
//! - [`project`] - `cforge.toml` and the output layout
//! - [`tools`] - external tools and their environment overrides

pub mod flags;
pub mod project;
pub mod tools;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::execute::command::Verbosity;
use crate::platform::{self, PlatformError, PlatformTag};

pub use flags::{ArtifactKind, ComposedFlags, FlagSet, Profile, compose};
pub use project::{Layout, LinkMode, ProjectFile};
pub use tools::{Tool, ToolKind, Toolchain};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

/// What to do with the rest of the graph once a target fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
  /// Start nothing new after the first failure.
  #[default]
  FailFast,
  /// Keep building every branch that does not depend on a failure.
  KeepGoing,
}

/// When dependency records are regenerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicy {
  /// Rescan only when the source or a previously recorded header changed.
  #[default]
  Conservative,
  /// Rescan every source on every invocation.
  Strict,
}

/// How headers are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
  /// Follow `#include` directives in-process.
  #[default]
  Builtin,
  /// Ask the compiler (`-MM`).
  Compiler,
}

/// Caller-chosen knobs, typically from the command line.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Raw host string; `None` means `CFORGE_HOST` or detection.
  pub host: Option<String>,
  pub profile: Profile,
  pub jobs: usize,
  pub failure_policy: FailurePolicy,
  pub scan_strategy: ScanStrategy,
  pub scan_policy: ScanPolicy,
  pub verbosity: Verbosity,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      host: None,
      profile: Profile::default(),
      jobs: 1,
      failure_policy: FailurePolicy::default(),
      scan_strategy: ScanStrategy::default(),
      scan_policy: ScanPolicy::default(),
      verbosity: Verbosity::default(),
    }
  }
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
  pub host: String,
  pub platform: PlatformTag,
  pub profile: Profile,
  pub flags: ComposedFlags,
  pub tools: Toolchain,
  pub layout: Layout,
  pub jobs: usize,
  pub failure_policy: FailurePolicy,
  pub scan_strategy: ScanStrategy,
  pub scan_policy: ScanPolicy,
  #[serde(skip)]
  pub verbosity: Verbosity,
}

impl BuildConfig {
  /// Resolve the platform, load the project file and compose every flag set.
  ///
  /// Fails with `UnresolvedPlatform` before touching the filesystem.
  pub fn resolve(project_root: &Path, options: BuildOptions) -> Result<Self, ConfigError> {
    let host = platform::raw_host(options.host.as_deref());
    let tag = platform::resolve(&host)?;

    if options.jobs == 0 {
      return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
    }

    let project = ProjectFile::load(project_root)?;
    let layout = Layout::new(project_root, &project, tag);
    let flags = compose(tag, options.profile, &layout, &project.cflags);

    info!(
      host = %host,
      platform = %tag,
      profile = ?options.profile,
      jobs = options.jobs,
      "resolved build configuration"
    );

    Ok(Self {
      host,
      platform: tag,
      profile: options.profile,
      flags,
      tools: Toolchain::from_env(),
      layout,
      jobs: options.jobs,
      failure_policy: options.failure_policy,
      scan_strategy: options.scan_strategy,
      scan_policy: options.scan_policy,
      verbosity: options.verbosity,
    })
  }
}
