//! Process-backed command runner.

use std::io;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::execute::command::{CommandError, CommandOutput, CommandRunner, Invocation};

/// Runs invocations as child processes, inheriting the caller's environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
    debug!(program = %invocation.program, cwd = ?invocation.cwd, "spawning process");

    let output = Command::new(&invocation.program)
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
          CommandError::NotFound {
            tool: invocation.tool,
            program: invocation.program.clone(),
            env: invocation.tool.env_var(),
          }
        } else {
          CommandError::Spawn {
            program: invocation.program.clone(),
            source,
          }
        }
      })?;

    Ok(CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }
}
