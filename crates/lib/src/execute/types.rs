//! Types for build graph execution.
//!
//! This module defines the error taxonomy and the per-graph result type.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, ToolKind};
use crate::deps::DepsError;
use crate::execute::command::CommandError;

/// Errors that can occur while planning or executing a build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Configuration could not be resolved (includes an unresolved platform).
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// A tool could not be started because it does not exist.
  #[error("{tool} '{program}' not found (set {env} to override)")]
  MissingTool {
    tool: ToolKind,
    program: String,
    env: &'static str,
  },

  /// Header discovery failed for a source.
  #[error("dependency scan failed for {path}: {message}")]
  DependencyScanFailure { path: PathBuf, message: String },

  /// The compiler rejected a source.
  #[error("failed to compile {target} (exit code {code:?})\n{diagnostics}")]
  CompileFailure {
    target: PathBuf,
    code: Option<i32>,
    diagnostics: String,
  },

  /// The link step failed.
  #[error("failed to link {target} (exit code {code:?})\n{diagnostics}")]
  LinkFailure {
    target: PathBuf,
    code: Option<i32>,
    diagnostics: String,
  },

  /// A leaf file (source or header) does not exist and nothing produces it.
  #[error("no rule to make {path}")]
  MissingPrerequisite { path: PathBuf },

  /// Two rules claim the same output.
  #[error("more than one rule produces {path}")]
  ConflictingRules { path: PathBuf },

  /// Cycle detected in the build graph.
  #[error("dependency cycle detected involving {path}")]
  CycleDetected { path: PathBuf },

  /// A tool exists but could not be run.
  #[error(transparent)]
  Command(CommandError),

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<CommandError> for BuildError {
  fn from(err: CommandError) -> Self {
    match err {
      CommandError::NotFound { tool, program, env } => BuildError::MissingTool { tool, program, env },
      other => BuildError::Command(other),
    }
  }
}

impl From<DepsError> for BuildError {
  fn from(err: DepsError) -> Self {
    BuildError::DependencyScanFailure {
      path: err.path().to_path_buf(),
      message: err.to_string(),
    }
  }
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }

  /// Rank used to pick the worst failure of an invocation; also the exit code.
  pub fn severity(&self) -> i32 {
    match self {
      BuildError::CompileFailure { .. }
      | BuildError::LinkFailure { .. }
      | BuildError::MissingPrerequisite { .. }
      | BuildError::Command(_)
      | BuildError::Io { .. } => 1,
      BuildError::DependencyScanFailure { .. } => 2,
      BuildError::MissingTool { .. } => 3,
      BuildError::Config(_) | BuildError::ConflictingRules { .. } | BuildError::CycleDetected { .. } => 4,
    }
  }
}

/// Result of executing one build graph.
#[derive(Debug, Default)]
pub struct GraphResult {
  /// Targets whose rule ran successfully, in completion order.
  pub rebuilt: Vec<PathBuf>,

  /// Targets with a rule that were already up to date.
  pub up_to_date: Vec<PathBuf>,

  /// Targets that failed, with their error.
  pub failed: Vec<(PathBuf, BuildError)>,

  /// Targets not attempted because a prerequisite was not built.
  /// Maps skipped target -> the prerequisite that was not built.
  pub skipped: HashMap<PathBuf, PathBuf>,

  /// Targets not started because fail-fast stopped the invocation.
  pub cancelled: Vec<PathBuf>,
}

impl GraphResult {
  /// Returns true if every target is current.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty() && self.cancelled.is_empty()
  }

  /// The most severe failure, if any.
  pub fn worst_failure(&self) -> Option<&BuildError> {
    self.failed.iter().map(|(_, e)| e).max_by_key(|e| e.severity())
  }

  pub fn was_rebuilt(&self, path: &std::path::Path) -> bool {
    self.rebuilt.iter().any(|p| p == path)
  }

  /// Returns the total number of targets with a rule that were processed.
  pub fn total(&self) -> usize {
    self.rebuilt.len() + self.up_to_date.len() + self.failed.len() + self.skipped.len() + self.cancelled.len()
  }
}
