//! CLI error handling specs
//!
//! Verify error messages for invalid arguments and configuration. None
//! of these need a running broker.

use crate::prelude::*;

#[test]
fn enqueue_without_a_queue_is_a_usage_error() {
    cli()
        .args(&["enqueue"])
        .fails()
        .code(2)
        .stderr_has("<QUEUE>");
}

#[test]
fn enqueue_rejects_a_header_without_a_value() {
    cli()
        .args(&["enqueue", "jobs", "--header", "priority"])
        .fails()
        .code(2)
        .stderr_has("expected KEY=VALUE");
}

#[test]
fn enqueue_rejects_invalid_json_data() {
    cli()
        .args(&["enqueue", "jobs", "--data", "{oops"])
        .fails()
        .code(1)
        .stderr_has("Error: --data is not valid JSON: {oops")
        .stdout_empty();
}

#[test]
fn unsupported_url_scheme_is_rejected() {
    cli()
        .args(&["--url", "http://localhost/", "enqueue", "jobs"])
        .fails()
        .code(1)
        .stderr_has("invalid AMQP URL: http://localhost/")
        .stderr_has("unsupported scheme 'http'");
}

#[test]
fn broker_url_is_read_from_the_environment() {
    cli()
        .args(&["consume"])
        .env("AMQP_URL", "ftp://localhost/")
        .fails()
        .code(1)
        .stderr_has("invalid AMQP URL: ftp://localhost/");
}

#[test]
fn url_flag_overrides_the_environment() {
    cli()
        .args(&["--url", "http://flag/", "enqueue", "jobs"])
        .env("AMQP_URL", "ftp://env/")
        .fails()
        .stderr_has("http://flag/")
        .stderr_lacks("ftp://env/");
}

#[test]
fn zero_prefetch_is_rejected() {
    cli()
        .args(&["consume"])
        .env("JOBLINE_PREFETCH", "0")
        .fails()
        .code(1)
        .stderr_has("invalid JOBLINE_PREFETCH: must be at least 1");
}

#[test]
fn malformed_auto_recovery_flag_is_rejected() {
    cli()
        .args(&["consume"])
        .env("JOBLINE_AUTO_RECOVERY", "maybe")
        .fails()
        .stderr_has("invalid JOBLINE_AUTO_RECOVERY: 'maybe' is not a boolean");
}
