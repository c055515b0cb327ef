use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn clean_keeps_directories_and_forces_full_rebuild() {
  let env = TestEnv::sample();
  env.cforge_cmd().arg("build-all").assert().success();

  env
    .cforge_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete"));

  assert!(!env.output("bin/libvl.so").exists());
  assert!(!env.output("obj/sift.o").exists());
  assert!(env.output("bin").is_dir());
  assert!(env.root().join("vl/sift.c").is_file());

  env.clear_log();
  env.cforge_cmd().arg("build-all").assert().success();
  assert_eq!(env.invocations().len(), 5);
}

#[test]
fn clean_dry_run_removes_nothing() {
  let env = TestEnv::sample();
  env.cforge_cmd().arg("build-library").assert().success();

  env
    .cforge_cmd()
    .args(["clean", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"))
    .stdout(predicate::str::contains("libvl.so"));

  assert!(env.output("bin/libvl.so").is_file());
}

#[test]
fn distclean_removes_output_tree() {
  let env = TestEnv::sample();
  env.cforge_cmd().arg("build-all").assert().success();

  env.cforge_cmd().arg("distclean").assert().success();

  assert!(!env.root().join("build").exists());
  assert!(env.root().join("vl/generic.h").is_file());
}

#[test]
fn clean_json_output_is_valid() {
  let env = TestEnv::sample();
  env.cforge_cmd().arg("build-library").assert().success();

  env
    .cforge_cmd()
    .args(["-o", "json", "clean"])
    .assert()
    .success()
    .stdout(predicate::str::contains("files_removed"))
    .stdout(predicate::str::contains("bytes_freed"));
}

#[test]
fn clean_without_outputs_succeeds() {
  let env = TestEnv::sample();

  env.cforge_cmd().arg("clean").assert().success();
  env.cforge_cmd().arg("distclean").assert().success();
}
