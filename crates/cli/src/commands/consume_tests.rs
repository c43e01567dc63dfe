// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[yare::parameterized(
    object = { Payload::Json(json!({"for": "me"})), r#"consumed {"for":"me"}"# },
    string = { Payload::Json(json!("hi")), r#"consumed "hi""# },
    raw    = { Payload::Raw(b"plain text".to_vec()), "consumed plain text" },
)]
fn consumed_line_shows_the_payload(payload: Payload, expected: &str) {
    assert_eq!(consumed_line(&payload), expected);
}
