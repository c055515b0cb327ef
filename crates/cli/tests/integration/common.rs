//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Compiler stand-in: logs its arguments, creates whatever `-o` names and
/// fails when any argument contains `$FAKE_CC_FAIL`.
const FAKE_CC: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  if [ -n "$FAKE_CC_FAIL" ]; then
    case "$arg" in
      *"$FAKE_CC_FAIL"*) echo "$arg:1: error: forced failure" >&2; exit 1 ;;
    esac
  fi
  prev="$arg"
done
echo "$*" >> "$FAKE_CC_LOG"
if [ -n "$out" ]; then : > "$out"; fi
exit 0
"#;

/// Isolated project directory plus a fake toolchain.
pub struct TestEnv {
  pub temp: TempDir,
  pub project: PathBuf,
  fail_on: Option<String>,
}

impl TestEnv {
  /// An empty project with the fake compiler installed next to it.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    std::fs::create_dir_all(&project).unwrap();

    let cc = temp.path().join("fake-cc");
    std::fs::write(&cc, FAKE_CC).unwrap();
    std::fs::set_permissions(&cc, std::fs::Permissions::from_mode(0o755)).unwrap();

    let project = dunce::canonicalize(&project).unwrap_or(project);
    Self {
      temp,
      project,
      fail_on: None,
    }
  }

  /// Library of two sources sharing a header, one driver and one module.
  pub fn sample() -> Self {
    let env = Self::empty();
    env.write_file("vl/generic.h", "#define VL_GENERIC 1\n");
    env.write_file("vl/sift.c", "#include \"generic.h\"\n");
    env.write_file("vl/random.c", "int vl_random;\n");
    env.write_file("src/sift.c", "#include \"vl/generic.h\"\nint main(void) { return 0; }\n");
    env.write_file("toolbox/vl_sift.c", "#include \"vl/generic.h\"\n");
    env
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.project.join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Make `relative_path` newer than anything a build just produced.
  pub fn touch(&self, relative_path: &str) {
    let ahead = SystemTime::now() + Duration::from_secs(60);
    let file = std::fs::File::options().write(true).open(self.project.join(relative_path)).unwrap();
    file.set_modified(ahead).unwrap();
  }

  pub fn fail_on(&mut self, fragment: &str) {
    self.fail_on = Some(fragment.to_string());
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.path().join("cc.log")
  }

  /// Compiler invocations logged so far.
  pub fn invocations(&self) -> Vec<String> {
    std::fs::read_to_string(self.log_path())
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  pub fn clear_log(&self) {
    let _ = std::fs::remove_file(self.log_path());
  }

  pub fn output(&self, relative_path: &str) -> PathBuf {
    self.project.join("build").join("glnxa64").join(relative_path)
  }

  /// A `cforge` command aimed at this project with the fake toolchain.
  pub fn cforge_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("cforge");
    cmd
      .arg("-C")
      .arg(&self.project)
      .env("CFORGE_HOST", "Linux x86_64")
      .env("CC", self.temp.path().join("fake-cc"))
      .env("FAKE_CC_LOG", self.log_path())
      .env_remove("LDSHARED")
      .env_remove("MODCC")
      .env_remove("RUST_LOG");
    match &self.fail_on {
      Some(fragment) => cmd.env("FAKE_CC_FAIL", fragment),
      None => cmd.env_remove("FAKE_CC_FAIL"),
    };
    cmd
  }

  pub fn root(&self) -> &Path {
    &self.project
  }
}
