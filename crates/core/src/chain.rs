// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow chaining through the reserved `next_job` payload field.
//!
//! A workflow is an ordered list of queues. The job is published to the
//! first queue with the remaining queues stored under `next_job`; each
//! handler that finishes a job carrying `next_job` forwards its result to
//! the next queue, consuming one hop at a time.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::id::QueueName;
use crate::payload::Payload;

/// Reserved payload field naming the queue(s) a result is forwarded to.
pub const NEXT_JOB_FIELD: &str = "next_job";

/// Key a non-object handler result is stored under when forwarded.
const RESULT_FIELD: &str = "result";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    #[error("queue name must not be empty")]
    EmptyQueue,
    #[error("'next_job' must be a queue name or a list of queue names, got {0}")]
    InvalidNextJob(Value),
    #[error("workflow data must be a JSON object, got {0}")]
    NotAnObject(Value),
}

/// Destination of a published job: one queue, or several visited in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route(Vec<String>);

impl Route {
    pub fn queue(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn workflow<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn hops(&self) -> &[String] {
        &self.0
    }

    /// First queue plus whatever remains of the workflow.
    pub fn split(self) -> Result<(QueueName, Option<NextJob>), ChainError> {
        let mut hops = self
            .0
            .into_iter()
            .map(|name| QueueName::new(name).ok_or(ChainError::EmptyQueue))
            .collect::<Result<Vec<_>, _>>()?;
        if hops.is_empty() {
            return Err(ChainError::EmptyQueue);
        }
        let head = hops.remove(0);
        Ok((head, NextJob::from_tail(hops)))
    }

    /// Target queue and body for the first hop, with the continuation
    /// embedded as `next_job`.
    pub fn prepare(self, data: Value) -> Result<(QueueName, Value), ChainError> {
        let (queue, next) = self.split()?;
        let Some(next) = next else {
            return Ok((queue, data));
        };
        let mut object = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(ChainError::NotAnObject(other)),
        };
        object.insert(NEXT_JOB_FIELD.to_string(), next.to_value());
        Ok((queue, Value::Object(object)))
    }
}

impl From<&str> for Route {
    fn from(name: &str) -> Self {
        Self::queue(name)
    }
}

impl From<String> for Route {
    fn from(name: String) -> Self {
        Self::queue(name)
    }
}

impl From<&QueueName> for Route {
    fn from(name: &QueueName) -> Self {
        Self::queue(name.as_str())
    }
}

impl From<QueueName> for Route {
    fn from(name: QueueName) -> Self {
        Self::queue(name.into_string())
    }
}

impl From<Vec<String>> for Route {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for Route {
    fn from(names: Vec<&str>) -> Self {
        Self::workflow(names)
    }
}

impl<const N: usize> From<[&str; N]> for Route {
    fn from(names: [&str; N]) -> Self {
        Self::workflow(names)
    }
}

/// Remaining queues of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextJob {
    One(QueueName),
    /// Two or more queues, in visiting order
    Many(Vec<QueueName>),
}

impl NextJob {
    /// `None` once the workflow is exhausted.
    pub fn from_tail(mut tail: Vec<QueueName>) -> Option<Self> {
        match tail.len() {
            0 => None,
            1 => tail.pop().map(Self::One),
            _ => Some(Self::Many(tail)),
        }
    }

    /// Read a `next_job` value. Null, `""` and `[]` mean "no continuation".
    pub fn parse(value: &Value) -> Result<Option<Self>, ChainError> {
        match value {
            Value::Null => Ok(None),
            Value::String(name) if name.is_empty() => Ok(None),
            Value::String(name) => Ok(QueueName::new(name.as_str()).map(Self::One)),
            Value::Array(items) => {
                let names = items
                    .iter()
                    .map(|item| match item {
                        Value::String(name) => {
                            QueueName::new(name.as_str()).ok_or(ChainError::EmptyQueue)
                        }
                        other => Err(ChainError::InvalidNextJob(other.clone())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::from_tail(names))
            }
            other => Err(ChainError::InvalidNextJob(other.clone())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::One(name) => Value::String(name.to_string()),
            Self::Many(names) => Value::Array(
                names
                    .iter()
                    .map(|n| Value::String(n.to_string()))
                    .collect(),
            ),
        }
    }

    /// Queue for this hop plus the continuation after it.
    pub fn split(self) -> (QueueName, Option<NextJob>) {
        match self {
            Self::One(name) => (name, None),
            Self::Many(mut names) => {
                let head = names.remove(0);
                (head, Self::from_tail(names))
            }
        }
    }
}

/// A forwarded job produced when a chained job completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub queue: QueueName,
    pub data: Value,
}

impl Hop {
    /// Work out where a finished job's result goes next.
    ///
    /// The original payload (minus `next_job`) is merged with `result`:
    /// object keys from the result win, `null` adds nothing, and any other
    /// value is stored under `"result"`. Returns `None` when the payload
    /// carries no continuation.
    pub fn after(payload: &Payload, result: Value) -> Result<Option<Self>, ChainError> {
        let Some(Value::Object(fields)) = payload.as_json() else {
            return Ok(None);
        };
        let Some(raw_next) = fields.get(NEXT_JOB_FIELD) else {
            return Ok(None);
        };
        let Some(next) = NextJob::parse(raw_next)? else {
            return Ok(None);
        };

        let mut data = fields.clone();
        data.remove(NEXT_JOB_FIELD);
        merge_result(&mut data, result);

        let (queue, rest) = next.split();
        if let Some(rest) = rest {
            data.insert(NEXT_JOB_FIELD.to_string(), rest.to_value());
        }

        Ok(Some(Self {
            queue,
            data: Value::Object(data),
        }))
    }
}

fn merge_result(data: &mut Map<String, Value>, result: Value) {
    match result {
        Value::Null => {}
        Value::Object(fields) => data.extend(fields),
        other => {
            data.insert(RESULT_FIELD.to_string(), other);
        }
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
