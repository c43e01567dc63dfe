//! CLI help output specs

use crate::prelude::*;

#[test]
fn jobline_no_args_shows_usage_and_fails() {
    cli().fails().code(2).stderr_has("Usage:");
}

#[test]
fn jobline_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("consume")
        .stdout_has("enqueue")
        .stdout_has("--url");
}

#[test]
fn jobline_enqueue_help_shows_options() {
    cli()
        .args(&["enqueue", "--help"])
        .passes()
        .stdout_has("--data")
        .stdout_has("--header");
}

#[test]
fn jobline_consume_help_shows_usage() {
    cli().args(&["consume", "--help"]).passes().stdout_has("Usage:");
}

#[test]
fn jobline_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.1");
}

#[test]
fn jobline_binary_is_found_in_the_target_dir() {
    let path = jobline_binary();
    assert!(path.exists(), "no jobline binary at {}", path.display());
}
