//! Command execution seam.
//!
//! Every compiler and linker call goes through a [`CommandExecutor`], which
//! prints the progress line for the configured [`Verbosity`] and delegates the
//! actual process handling to a [`CommandRunner`]. The runner is a trait so the
//! engine can be driven without a real toolchain.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::config::{Tool, ToolKind};

/// How much the executor prints per command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
  /// Nothing.
  Quiet,
  /// One `LABEL target` line per command.
  #[default]
  Normal,
  /// The full command line.
  Verbose,
}

/// Short progress label for each kind of step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Scan,
  Compile,
  LinkLibrary,
  LinkExecutable,
  BuildModule,
}

impl Step {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Scan => "DEP",
      Self::Compile => "CC",
      Self::LinkLibrary => "LD",
      Self::LinkExecutable => "CCLD",
      Self::BuildModule => "MODCC",
    }
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub tool: ToolKind,
  pub step: Step,
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  /// Project-relative name of what the command produces.
  pub target: String,
}

impl Invocation {
  /// Start an invocation of `tool`, including the tool's own leading arguments.
  pub fn new(tool: &Tool, step: Step, cwd: PathBuf, target: String) -> Self {
    Self {
      tool: tool.kind,
      step,
      program: tool.program.clone(),
      args: tool.args.clone(),
      cwd,
      target,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Value following the last `-o`, if any.
  pub fn output(&self) -> Option<&str> {
    self
      .args
      .iter()
      .rposition(|a| a == "-o")
      .and_then(|i| self.args.get(i + 1))
      .map(String::as_str)
  }

  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// The uniform progress line, e.g. `    CC vl/sift.o`.
  pub fn progress_line(&self) -> String {
    format!("{:>6} {}", self.step.label(), self.target)
  }
}

/// Uniform result of running a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code; `None` if the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Captured diagnostic text: stderr, then stdout, trimmed.
  pub fn diagnostics(&self) -> String {
    [self.stderr.trim(), self.stdout.trim()]
      .into_iter()
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join("\n")
  }
}

#[derive(Debug, Error)]
pub enum CommandError {
  /// The program could not be found.
  #[error("{tool} '{program}' not found (set {env} to override)")]
  NotFound {
    tool: ToolKind,
    program: String,
    env: &'static str,
  },

  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

/// Runs one invocation to completion.
pub trait CommandRunner: Send + Sync + 'static {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput, CommandError>> + Send;
}

/// Wraps a runner with progress output and an invocation count.
#[derive(Debug)]
pub struct CommandExecutor<R> {
  runner: R,
  verbosity: Verbosity,
  invocations: AtomicUsize,
}

impl<R: CommandRunner> CommandExecutor<R> {
  pub fn new(runner: R, verbosity: Verbosity) -> Self {
    Self {
      runner,
      verbosity,
      invocations: AtomicUsize::new(0),
    }
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Number of commands started so far.
  pub fn invocations(&self) -> usize {
    self.invocations.load(Ordering::SeqCst)
  }

  pub async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
    match self.verbosity {
      Verbosity::Quiet => {}
      Verbosity::Normal => println!("{}", invocation.progress_line()),
      Verbosity::Verbose => println!("{}", invocation.command_line()),
    }
    debug!(cmd = %invocation.command_line(), cwd = %invocation.cwd.display(), "executing command");

    self.invocations.fetch_add(1, Ordering::SeqCst);
    let output = self.runner.run(invocation).await?;

    if !output.success() {
      debug!(code = ?output.code, stderr = %output.stderr, "command failed");
    } else if self.verbosity == Verbosity::Verbose && !output.stderr.trim().is_empty() {
      // Warnings from a successful compile.
      eprintln!("{}", output.stderr.trim_end());
    }

    Ok(output)
  }
}
