//! Rule execution.
//!
//! Each [`Rule`] becomes at most one external command. Outputs are written to a
//! partial path and renamed into place only when the command succeeds, so an
//! interrupted or failed step never leaves a complete-looking artifact.

pub mod cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::build::link::ensure_library_link;
use crate::config::{ArtifactKind, BuildConfig, ScanStrategy, Tool};
use crate::deps::DepRecord;
use crate::deps::scan::{scan_includes, scan_with_compiler};
use crate::execute::command::{CommandExecutor, CommandOutput, CommandRunner, Invocation, Step};
use crate::execute::dag::Rule;
use crate::execute::types::BuildError;
use crate::materialize::ensure_dir;
use crate::util::path::partial_path;

pub use cmd::ProcessRunner;

/// Everything a rule needs: the configuration and the command seam.
#[derive(Debug)]
pub struct ActionContext<R> {
  pub config: Arc<BuildConfig>,
  pub executor: CommandExecutor<R>,
}

impl<R: CommandRunner> ActionContext<R> {
  pub fn new(config: Arc<BuildConfig>, runner: R) -> Self {
    let executor = CommandExecutor::new(runner, config.verbosity);
    Self { config, executor }
  }
}

/// What running a rule did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
  /// The target was written; dependents must rebuild.
  Rebuilt,
  /// The target already had the right content and was left alone.
  Unchanged,
}

/// Produce `target` by running `rule`.
pub async fn execute_rule<R: CommandRunner>(
  ctx: &ActionContext<R>,
  target: &Path,
  rule: &Rule,
) -> Result<RuleOutcome, BuildError> {
  let config = &ctx.config;
  let flags = &config.flags;

  match rule {
    Rule::Materialize { dir } => {
      ensure_dir(dir).map_err(|e| BuildError::io(dir, e))?;
      Ok(RuleOutcome::Rebuilt)
    }

    Rule::Scan { kind, source, artifact } => {
      let headers = match config.scan_strategy {
        ScanStrategy::Builtin => scan_includes(source, &flags.get(*kind).include_dirs())?,
        ScanStrategy::Compiler => scan_with_compiler(&ctx.executor, config, *kind, source, artifact).await?,
      };
      let record = DepRecord::new(source.clone(), artifact.clone(), headers, flags.get(*kind).digest());
      if record.save_if_changed(target)? {
        Ok(RuleOutcome::Rebuilt)
      } else {
        debug!(record = %target.display(), "headers unchanged");
        Ok(RuleOutcome::Unchanged)
      }
    }

    Rule::Compile { source } => {
      let set = flags.get(ArtifactKind::Library);
      let inv = invocation(ctx, &config.tools.cc, Step::Compile, target)
        .arg("-c")
        .args(set.compile.iter().cloned())
        .arg(path_arg(source));
      produce(ctx, inv, target, Failure::Compile).await
    }

    Rule::LinkLibrary { objects } => {
      let set = flags.get(ArtifactKind::Library);
      let inv = invocation(ctx, &config.tools.ld, Step::LinkLibrary, target)
        .args(objects.iter().map(|o| path_arg(o)))
        .args(set.link.iter().cloned());
      produce(ctx, inv, target, Failure::Link).await
    }

    Rule::LinkExecutable { source } => {
      let set = flags.get(ArtifactKind::Executable);
      let inv = invocation(ctx, &config.tools.cc, Step::LinkExecutable, target)
        .args(set.compile.iter().cloned())
        .arg(path_arg(source))
        .args(set.link.iter().cloned());
      produce(ctx, inv, target, Failure::Classify).await
    }

    Rule::BuildModule { source } => {
      let set = flags.get(ArtifactKind::Module);
      let inv = invocation(ctx, &config.tools.modcc, Step::BuildModule, target)
        .args(set.compile.iter().cloned())
        .arg(path_arg(source))
        .args(set.link.iter().cloned());
      produce(ctx, inv, target, Failure::Classify).await
    }

    Rule::PlaceLibrary { dir } => match ensure_library_link(&config.layout, dir) {
      Ok(true) => Ok(RuleOutcome::Rebuilt),
      Ok(false) => Ok(RuleOutcome::Unchanged),
      Err(e) => Err(BuildError::io(target, e)),
    },
  }
}

/// How a non-zero exit is reported.
#[derive(Debug, Clone, Copy)]
enum Failure {
  Compile,
  Link,
  /// Single-step compile-and-link; decided from the diagnostics.
  Classify,
}

fn invocation<R>(ctx: &ActionContext<R>, tool: &Tool, step: Step, target: &Path) -> Invocation {
  let layout = &ctx.config.layout;
  Invocation::new(tool, step, layout.project_root.clone(), layout.display_path(target))
}

fn path_arg(path: &Path) -> String {
  path.display().to_string()
}

/// Run `inv` with `-o <partial>` and move the partial onto `target` on success.
async fn produce<R: CommandRunner>(
  ctx: &ActionContext<R>,
  inv: Invocation,
  target: &Path,
  failure: Failure,
) -> Result<RuleOutcome, BuildError> {
  let partial = partial_path(target);
  let inv = inv.arg("-o").arg(path_arg(&partial));

  let output = match ctx.executor.execute(&inv).await {
    Ok(output) => output,
    Err(e) => {
      discard(&partial);
      return Err(e.into());
    }
  };

  if !output.success() {
    discard(&partial);
    return Err(failure_error(failure, target.to_path_buf(), &output));
  }

  std::fs::rename(&partial, target).map_err(|e| {
    discard(&partial);
    BuildError::io(target, e)
  })?;
  debug!(target = %target.display(), "produced");
  Ok(RuleOutcome::Rebuilt)
}

fn failure_error(failure: Failure, target: PathBuf, output: &CommandOutput) -> BuildError {
  let diagnostics = output.diagnostics();
  let link = match failure {
    Failure::Compile => false,
    Failure::Link => true,
    Failure::Classify => looks_like_link_error(&diagnostics),
  };
  if link {
    BuildError::LinkFailure {
      target,
      code: output.code,
      diagnostics,
    }
  } else {
    BuildError::CompileFailure {
      target,
      code: output.code,
      diagnostics,
    }
  }
}

fn looks_like_link_error(diagnostics: &str) -> bool {
  const NEEDLES: [&str; 4] = [
    "undefined reference",
    "linker command failed",
    "cannot find -l",
    "ld returned",
  ];
  diagnostics
    .lines()
    .any(|line| NEEDLES.iter().any(|needle| line.contains(needle)) || is_linker_line(line))
}

/// A diagnostic line emitted by the linker itself, e.g. `/usr/bin/ld: ...`
/// or `x86_64-linux-gnu-ld.bfd: ...`.
fn is_linker_line(line: &str) -> bool {
  let Some((program, _)) = line.trim_start().split_once(':') else {
    return false;
  };
  let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
  name == "ld"
    || name.starts_with("ld.")
    || name.starts_with("ld64")
    || name.ends_with("-ld")
    || name.contains("-ld.")
}

fn discard(partial: &Path) {
  match std::fs::remove_file(partial) {
    Ok(()) => debug!(path = %partial.display(), "removed partial output"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => warn!(path = %partial.display(), error = %e, "failed to remove partial output"),
  }
}
