//! Header discovery.
//!
//! Two strategies produce the same answer shape, a list of header paths:
//! an in-process `#include` scanner, and the compiler's own `-MM` output.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::DepsError;
use crate::config::{ArtifactKind, BuildConfig};
use crate::execute::command::{CommandExecutor, CommandRunner, Invocation, Step};
use crate::execute::types::BuildError;
use crate::util::path::normalize;

/// An include directive as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
  /// `#include "name"`
  Quoted(String),
  /// `#include <name>`
  Angle(String),
}

/// Extract include directives from C source text.
pub fn include_directives(text: &str) -> Vec<Include> {
  text.lines().filter_map(parse_directive).collect()
}

fn parse_directive(line: &str) -> Option<Include> {
  let rest = line.trim_start().strip_prefix('#')?;
  let rest = rest.trim_start().strip_prefix("include")?.trim_start();
  let mut chars = rest.chars();
  let close = match chars.next()? {
    '"' => '"',
    '<' => '>',
    _ => return None,
  };
  let body = chars.as_str();
  let name = &body[..body.find(close)?];
  Some(if close == '"' {
    Include::Quoted(name.to_string())
  } else {
    Include::Angle(name.to_string())
  })
}

/// Resolve one directive. Quoted names look beside the including file first.
fn resolve(including: &Path, include: &Include, include_dirs: &[PathBuf]) -> Option<PathBuf> {
  let (name, local) = match include {
    Include::Quoted(name) => (name, including.parent()),
    Include::Angle(name) => (name, None),
  };
  local
    .into_iter()
    .chain(include_dirs.iter().map(PathBuf::as_path))
    .map(|dir| normalize(&dir.join(name)))
    .find(|candidate| candidate.is_file())
}

/// Transitively collect the headers `source` includes.
///
/// Includes that resolve nowhere (system headers) are ignored. The result is
/// sorted and never contains `source`.
pub fn scan_includes(source: &Path, include_dirs: &[PathBuf]) -> Result<Vec<PathBuf>, DepsError> {
  let source = normalize(source);
  let mut seen = BTreeSet::new();
  let mut queue = VecDeque::from([source.clone()]);

  while let Some(file) = queue.pop_front() {
    let bytes = std::fs::read(&file).map_err(|e| DepsError::Read {
      path: file.clone(),
      source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);

    for include in include_directives(&text) {
      match resolve(&file, &include, include_dirs) {
        Some(found) if found != source => {
          if seen.insert(found.clone()) {
            queue.push_back(found);
          }
        }
        Some(_) => {}
        None => trace!(file = %file.display(), include = ?include, "unresolved include"),
      }
    }
  }

  Ok(seen.into_iter().collect())
}

/// Prerequisites named by make-syntax dependency output such as
/// `obj/a.o: src/a.c vl/a.h \` (continuation lines allowed).
pub fn parse_make_rule(text: &str) -> Vec<PathBuf> {
  let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
  let Some((_, prerequisites)) = joined.split_once(": ") else {
    return Vec::new();
  };
  make_words(prerequisites)
    .into_iter()
    .filter(|word| !word.ends_with(':'))
    .map(PathBuf::from)
    .collect()
}

/// Split on unescaped whitespace. `\ ` is a literal space and `$$` a dollar.
fn make_words(text: &str) -> Vec<String> {
  let mut words = Vec::new();
  let mut word = String::new();
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '\\' if chars.peek() == Some(&' ') => {
        chars.next();
        word.push(' ');
      }
      '$' if chars.peek() == Some(&'$') => {
        chars.next();
        word.push('$');
      }
      c if c.is_whitespace() => {
        if !word.is_empty() {
          words.push(std::mem::take(&mut word));
        }
      }
      c => word.push(c),
    }
  }
  if !word.is_empty() {
    words.push(word);
  }
  words
}

/// Ask the configured compiler for the headers of `source`.
pub async fn scan_with_compiler<R: CommandRunner>(
  executor: &CommandExecutor<R>,
  config: &BuildConfig,
  kind: ArtifactKind,
  source: &Path,
  artifact: &Path,
) -> Result<Vec<PathBuf>, BuildError> {
  let layout = &config.layout;
  let tool = match kind {
    ArtifactKind::Module => &config.tools.modcc,
    _ => &config.tools.cc,
  };

  let invocation = Invocation::new(tool, Step::Scan, layout.project_root.clone(), layout.display_path(source))
    .args(["-MM", "-MT"])
    .arg(artifact.display().to_string())
    .args(config.flags.get(kind).compile.iter().cloned())
    .arg(source.display().to_string());

  let output = executor.execute(&invocation).await?;
  if !output.success() {
    return Err(
      DepsError::Compiler {
        path: source.to_path_buf(),
        message: output.diagnostics(),
      }
      .into(),
    );
  }

  let source = normalize(source);
  let headers: Vec<PathBuf> = parse_make_rule(&output.stdout)
    .into_iter()
    .map(|p| normalize(&layout.project_root.join(p)))
    .filter(|p| p != &source)
    .collect();
  debug!(source = %source.display(), headers = headers.len(), "compiler scan complete");
  Ok(headers)
}
