//! External tools and their environment overrides.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Role an external program plays in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
  Compiler,
  Linker,
  ModuleCompiler,
  Interpreter,
}

impl ToolKind {
  /// Environment variable that overrides this tool.
  pub fn env_var(&self) -> &'static str {
    match self {
      Self::Compiler => "CC",
      Self::Linker => "LDSHARED",
      Self::ModuleCompiler => "MODCC",
      Self::Interpreter => "PYTHON",
    }
  }
}

impl fmt::Display for ToolKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Compiler => "compiler",
      Self::Linker => "linker",
      Self::ModuleCompiler => "module compiler",
      Self::Interpreter => "interpreter",
    };
    write!(f, "{}", name)
  }
}

/// A program plus any leading arguments (`CC="ccache cc"` is allowed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
  pub kind: ToolKind,
  pub program: String,
  pub args: Vec<String>,
  /// True when the value came from the environment.
  pub overridden: bool,
}

impl Tool {
  fn from_value(kind: ToolKind, value: &str, overridden: bool) -> Self {
    let mut words = value.split_whitespace().map(str::to_string);
    let program = words.next().unwrap_or_default();
    Self {
      kind,
      program,
      args: words.collect(),
      overridden,
    }
  }

  /// Read `kind`'s environment variable, falling back to `default`.
  fn from_env_or(kind: ToolKind, default: &str) -> Self {
    match std::env::var(kind.env_var()) {
      Ok(value) if !value.trim().is_empty() => Self::from_value(kind, &value, true),
      _ => Self::from_value(kind, default, false),
    }
  }

  /// Resolve the program against `PATH`.
  pub fn locate(&self) -> Option<PathBuf> {
    which::which(&self.program).ok()
  }

  /// The full command prefix as one string, for display.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Every external tool the engine may invoke or report.
#[derive(Debug, Clone, Serialize)]
pub struct Toolchain {
  pub cc: Tool,
  pub ld: Tool,
  pub modcc: Tool,
  pub python: Tool,
}

impl Toolchain {
  /// Build the toolchain from `CC`, `LDSHARED`, `MODCC` and `PYTHON`.
  ///
  /// The linker and module compiler default to whatever the compiler resolved to.
  pub fn from_env() -> Self {
    let cc = Tool::from_env_or(ToolKind::Compiler, "cc");
    let cc_line = cc.command_line();
    Self {
      ld: Tool::from_env_or(ToolKind::Linker, &cc_line),
      modcc: Tool::from_env_or(ToolKind::ModuleCompiler, &cc_line),
      python: Tool::from_env_or(ToolKind::Interpreter, "python3"),
      cc,
    }
  }

  pub fn all(&self) -> [&Tool; 4] {
    [&self.cc, &self.ld, &self.modcc, &self.python]
  }
}
