//! Specs for commands that reach the broker
//!
//! The broker address is unreachable, so these cover how connection
//! failures surface rather than successful publishing.

use crate::prelude::*;

#[test]
fn enqueue_reports_an_unreachable_broker() {
    cli()
        .args(&["--url", UNREACHABLE_URL, "enqueue", "jobs", "--data", "{\"n\":1}"])
        .fails()
        .code(1)
        .stderr_has("connect failed")
        .stdout_empty();
}

#[test]
fn workflow_enqueue_reports_an_unreachable_broker() {
    cli()
        .args(&["--url", UNREACHABLE_URL, "enqueue", "resize", "upload"])
        .fails()
        .stderr_has("connect failed")
        .stdout_empty();
}

#[test]
fn consume_exits_when_the_broker_is_unreachable() {
    cli()
        .args(&["--url", UNREACHABLE_URL, "consume", "jobs"])
        .fails()
        .code(1)
        .stderr_has("connect failed");
}
