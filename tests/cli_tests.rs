use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn compiles_file_and_dumps_module() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("input.ml");
    fs::write(&input_path, "def add(a b) a + b;\nadd(1, 2);\n").expect("write input");

    Command::cargo_bin("my-lang")
        .expect("binary exists")
        .arg(&input_path)
        .arg("--module-name")
        .arg("demo")
        .assert()
        .success()
        .stderr(predicate::str::contains("Read function definition:"))
        .stderr(predicate::str::contains("; ModuleID = 'demo'"))
        .stderr(predicate::str::contains("ready>").not());
}

#[test]
fn errors_do_not_change_exit_status() {
    Command::cargo_bin("my-lang")
        .expect("binary exists")
        .arg("--no-prompt")
        .write_stdin("def f(x) y;\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("LogError: unknown variable name y"));
}

#[test]
fn prompts_on_stdin() {
    Command::cargo_bin("my-lang")
        .expect("binary exists")
        .write_stdin("4+5;\n")
        .assert()
        .success()
        .stderr(predicate::str::starts_with("ready> "))
        .stderr(predicate::str::contains("ret double 9.000000e+00"));
}

#[test]
fn parse_stage() {
    Command::cargo_bin("my-lang")
        .expect("binary exists")
        .args(&["--stage", "parse", "--no-prompt"])
        .write_stdin("8-4-2\n")
        .assert()
        .success()
        .stderr(predicate::str::diff("Parsed: ((8 - 4) - 2)\n"));
}

#[test]
fn missing_input_file_fails() {
    Command::cargo_bin("my-lang")
        .expect("binary exists")
        .arg("does/not/exist.ml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open input file"));
}
