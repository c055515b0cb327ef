mod build;
mod clean;
mod info;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use cforge_lib::config::{BuildConfig, BuildOptions, ConfigError};
use cforge_lib::execute::BuildError;

use crate::output::OutputFormat;

pub use build::cmd_build;
pub use clean::{cmd_clean, cmd_distclean};
pub use info::cmd_info;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
  pub project: PathBuf,
  pub output: OutputFormat,
  pub options: BuildOptions,
}

/// Resolve the project directory and the build configuration.
///
/// Errors carry a [`BuildError::Config`] so they map to the configuration exit code.
pub fn resolve_config(opts: &GlobalOpts) -> Result<BuildConfig> {
  let root = dunce::canonicalize(&opts.project)
    .map_err(|source| {
      BuildError::from(ConfigError::Read {
        path: opts.project.clone(),
        source,
      })
    })
    .context("Project directory not found")?;
  debug!(root = %root.display(), "project directory");

  BuildConfig::resolve(&root, opts.options.clone())
    .map_err(BuildError::from)
    .context("Failed to resolve build configuration")
}

/// Process exit code for an error that ended a command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
  err
    .downcast_ref::<BuildError>()
    .map_or(1, |e| u8::try_from(e.severity()).unwrap_or(1))
}
