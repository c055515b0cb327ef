use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_all_then_nothing_to_do() {
  let env = TestEnv::sample();

  env
    .cforge_cmd()
    .arg("build-all")
    .assert()
    .success()
    .stdout(predicate::str::contains("CC build/glnxa64/obj/sift.o"))
    .stdout(predicate::str::contains("Built everything"));

  // two objects, the library, one driver, one module
  assert_eq!(env.invocations().len(), 5);
  assert!(env.output("bin/libvl.so").is_file());
  assert!(env.output("bin/sift").is_file());
  assert!(env.output("mod/vl_sift.mexa64").is_file());
  assert!(env.output("mod/libvl.so").exists());
  assert!(env.output("dep/library/sift.c.json").is_file());

  env.clear_log();
  env
    .cforge_cmd()
    .arg("build-all")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to do"));
  assert!(env.invocations().is_empty());
}

#[test]
fn header_change_rebuilds_only_its_dependents() {
  let env = TestEnv::sample();
  env.cforge_cmd().arg("build-all").assert().success();
  env.clear_log();

  env.touch("vl/generic.h");
  env.cforge_cmd().arg("build-all").assert().success();

  let calls = env.invocations();
  assert_eq!(calls.len(), 4, "{calls:#?}");
  assert!(calls.iter().all(|c| !c.contains("random.c")));
}

#[test]
fn build_library_ignores_drivers_and_modules() {
  let env = TestEnv::sample();

  env.cforge_cmd().arg("build-library").assert().success();

  assert_eq!(env.invocations().len(), 3);
  assert!(env.output("bin/libvl.so").is_file());
  assert!(!env.output("bin/sift").exists());
  assert!(!env.output("mod").exists());
}

#[test]
fn compile_failure_exits_with_build_code() {
  let mut env = TestEnv::sample();
  env.fail_on("random.c");

  env
    .cforge_cmd()
    .arg("build-all")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("forced failure"));

  assert!(!env.output("obj/random.o").exists());
  assert!(!env.output("obj/.random.o.partial").exists());
  assert!(!env.output("bin/libvl.so").exists());
}

#[test]
fn keep_going_builds_unaffected_targets() {
  let mut env = TestEnv::sample();
  env.fail_on("src/sift.c");

  env
    .cforge_cmd()
    .args(["-k", "-j", "4", "build-all"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Build of everything failed"));

  assert!(!env.output("bin/sift").exists());
  assert!(env.output("bin/libvl.so").is_file());
  assert!(env.output("mod/vl_sift.mexa64").is_file());
}

#[test]
fn missing_compiler_exits_with_tool_code() {
  let env = TestEnv::sample();

  env
    .cforge_cmd()
    .env("CC", env.temp.path().join("no-such-cc"))
    .arg("build-library")
    .assert()
    .code(3)
    .stderr(predicate::str::contains("CC"));
}

#[test]
fn verbose_prints_command_lines() {
  let env = TestEnv::sample();

  env
    .cforge_cmd()
    .args(["-v", "build-library"])
    .assert()
    .success()
    .stdout(predicate::str::contains("fake-cc -c"));
}

#[test]
fn quiet_prints_nothing_on_success() {
  let env = TestEnv::sample();

  env
    .cforge_cmd()
    .args(["-q", "build-library"])
    .assert()
    .success()
    .stdout(predicate::str::is_empty());
}

#[test]
fn json_summary_lists_rebuilt_targets() {
  let env = TestEnv::sample();

  let output = env.cforge_cmd().args(["-o", "json", "build-library"]).output().unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["success"], true);
  assert_eq!(json["goal"], "library");
  assert_eq!(json["invocations"], 3);
  let rebuilt = json["rebuilt"].as_array().unwrap();
  assert!(rebuilt.iter().any(|p| p.as_str().is_some_and(|s| s.ends_with("libvl.so"))));
}

#[test]
fn empty_library_is_a_configuration_error() {
  let env = TestEnv::empty();
  env.write_file("src/sift.c", "int main(void) { return 0; }\n");

  env
    .cforge_cmd()
    .arg("build-all")
    .assert()
    .code(4)
    .stderr(predicate::str::contains("no library sources"));
}
