//! Binary sanity checks: the daemon parses its CLI and can dump the
//! command catalog without an object file.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_mentions_the_command_file() {
    Command::cargo_bin("vigild")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--command-file"))
        .stdout(predicate::str::contains("--objects"));
}

#[test]
fn list_commands_dumps_the_catalog() {
    Command::cargo_bin("vigild")
        .unwrap()
        .arg("--list-commands")
        .assert()
        .success()
        .stdout(predicate::str::contains("ADD_HOST_COMMENT"))
        .stdout(predicate::str::contains("host=host_name;bool=persistent;str=author;str=comment"))
        .stdout(predicate::str::contains("SCHEDULE_HOST_DOWNTIME"))
        .stdout(predicate::str::contains("DEL_DOWNTIME_BY_START_TIME_COMMENT"));
}

#[test]
fn rejects_an_unreadable_object_file() {
    Command::cargo_bin("vigild")
        .unwrap()
        .args(["--objects", "/nonexistent/objects.json", "--list-commands"])
        .assert()
        .failure();
}
