//! CLI integration tests for Gantry.
//!
//! The full demo builds need a working C compiler, so those are marked
//! ignored; everything else runs anywhere.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the gantry binary command.
fn gantry() -> Command {
    Command::cargo_bin("gantry").unwrap()
}

/// The repository root, where the demo sources live.
fn demo_root() -> &'static str {
    env!("CARGO_MANIFEST_DIR")
}

#[test]
fn test_help_lists_commands() {
    gantry()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("package"));
}

#[test]
fn test_unknown_platform_fails_fast() {
    gantry()
        .args(["build", "--root", demo_root(), "--platform", "amiga"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown platform"));
}

#[test]
fn test_unknown_config_fails_fast() {
    gantry()
        .args(["build", "--root", demo_root(), "--config", "profile"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown build configuration"));
}

#[test]
#[ignore = "requires a C compiler on PATH"]
fn test_build_demo_project() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    gantry()
        .args(["build", "--root", demo_root()])
        .args(["--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Finished"));

    assert!(out.join("debug/app/app").exists());
    assert!(out.join("debug/libcore/libcore.a").exists());
    assert!(out.join("debug/backend/libbackend.a").exists());
    assert!(out.join("debug/gen/version.h").exists());

    // A rebuild is fully cached.
    gantry()
        .args(["build", "--root", demo_root()])
        .args(["--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("0 step(s) run"));
}

#[test]
#[ignore = "requires a C compiler on PATH"]
fn test_package_demo_project() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    gantry()
        .args(["package", "--root", demo_root()])
        .args(["--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("package staged"));

    let pkg = out.join("debug/package");
    assert!(pkg.join("app").exists());
    assert!(pkg.join("libcore.a").exists());
    assert!(pkg.join("include/libcore/core.h").exists());
    assert!(pkg.join(".app.stamp").exists());
}
