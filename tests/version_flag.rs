use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn version_flag_prints_version() {
    let mut cmd = Command::cargo_bin("yt-tui").expect("binary builds");
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_flag_mentions_update_check() {
    let mut cmd = Command::cargo_bin("yt-tui").expect("binary builds");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--check-updates"));
}
