// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job payloads, headers, and the outgoing envelope

use std::fmt;

use serde_json::Value;

use crate::id::QueueName;

/// Content type stamped on every published job.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Side-channel metadata carried next to the payload.
pub type Headers = serde_json::Map<String, Value>;

/// A decoded delivery body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body declared as `application/json`
    Json(Value),
    /// Any other content type, passed through untouched
    Raw(Vec<u8>),
}

impl Payload {
    /// Decode a body according to its declared content type.
    ///
    /// Only `application/json` (parameters such as `charset` ignored) is
    /// parsed; everything else is handed over as raw bytes.
    pub fn decode(body: &[u8], content_type: Option<&str>) -> Result<Self, serde_json::Error> {
        if content_type.is_some_and(is_json) {
            Ok(Self::Json(serde_json::from_slice(body)?))
        } else {
            Ok(Self::Raw(body.to_vec()))
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Look up a top-level field of a JSON object payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_json().and_then(|v| v.get(key))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{}", value),
            Self::Raw(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

/// A job ready to be published: target queue, JSON data, headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub queue: QueueName,
    pub data: Value,
    pub headers: Headers,
}

impl Envelope {
    pub fn new(queue: QueueName, data: Value, headers: Headers) -> Self {
        Self {
            queue,
            data,
            headers,
        }
    }

    /// Serialized message body.
    pub fn body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.data)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
