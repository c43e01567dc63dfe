// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AMQP 0-9-1 broker adapter backed by lapin

use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use jl_core::{AmqpConfig, ConsumerTag, Headers, QueueName, QueueOptions};
use lapin::acker::Acker as LapinAcker;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::protocol::{AMQPErrorKind, AMQPHardError};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldArray, FieldTable, LongString, ShortString};
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde_json::{Number, Value};

use super::{
    Acker, BrokerAdapter, BrokerChannel, BrokerConnection, BrokerError, BrokerEvent, Delivery,
    DeliveryStream, EventSink, OutgoingMessage, PublishConfirm,
};

const REPLY_SUCCESS: u16 = 200;

/// Connects to a real broker through lapin.
#[derive(Clone, Debug, Default)]
pub struct AmqpBroker {
    connection_name: Option<String>,
}

impl AmqpBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown for this client in the broker's management UI.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }
}

#[async_trait]
impl BrokerAdapter for AmqpBroker {
    type Connection = AmqpConnection;

    async fn connect(
        &self,
        config: &AmqpConfig,
        events: EventSink,
    ) -> Result<AmqpConnection, BrokerError> {
        let mut properties = ConnectionProperties::default();
        if let Some(name) = &self.connection_name {
            properties = properties.with_connection_name(name.clone().into());
        }

        let connection = Connection::connect_uri(broker_uri(config), properties)
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        let sink = events.clone();
        connection.on_error(move |err| {
            let _ = sink.send(classify(&err));
        });

        Ok(AmqpConnection {
            inner: Arc::new(connection),
            events,
        })
    }
}

/// The URI lapin connects with, built from the parsed settings. Query
/// options written on the URL (`heartbeat`, `frame_max`, ...) are kept.
pub(crate) fn broker_uri(config: &AmqpConfig) -> AMQPUri {
    let query = config
        .url
        .parse::<AMQPUri>()
        .map(|uri| uri.query)
        .unwrap_or_default();
    AMQPUri {
        scheme: if config.tls {
            AMQPScheme::AMQPS
        } else {
            AMQPScheme::AMQP
        },
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.user.clone(),
                password: config.pass.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost_name(),
        query,
    }
}

/// A broker restart or failover closes connections with a hard error too,
/// so only errors a reconnect with the same settings cannot fix are fatal.
fn classify(err: &lapin::Error) -> BrokerEvent {
    match err {
        lapin::Error::ProtocolError(e) if is_terminal(e.kind()) => {
            BrokerEvent::Fatal(e.to_string())
        }
        other => BrokerEvent::TransportLost(other.to_string()),
    }
}

fn is_terminal(kind: &AMQPErrorKind) -> bool {
    !matches!(
        kind,
        AMQPErrorKind::Hard(
            AMQPHardError::CONNECTIONFORCED
                | AMQPHardError::INTERNALERROR
                | AMQPHardError::RESOURCEERROR
        )
    )
}

#[derive(Clone)]
pub struct AmqpConnection {
    inner: Arc<Connection>,
    events: EventSink,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    type Channel = AmqpChannel;

    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn open_channel(&self, prefetch: u16) -> Result<AmqpChannel, BrokerError> {
        let channel_err = |e: lapin::Error| BrokerError::Channel(e.to_string());

        let channel = self.inner.create_channel().await.map_err(channel_err)?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(channel_err)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(channel_err)?;

        let sink = self.events.clone();
        channel.on_error(move |err| {
            let _ = sink.send(BrokerEvent::ChannelError(err.to_string()));
        });

        Ok(AmqpChannel { inner: channel })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

#[derive(Clone)]
pub struct AmqpChannel {
    inner: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn declare_queue(
        &self,
        queue: &QueueName,
        options: QueueOptions,
    ) -> Result<(), BrokerError> {
        let declare = QueueDeclareOptions {
            durable: options.durable,
            auto_delete: options.auto_delete,
            ..QueueDeclareOptions::default()
        };
        self.inner
            .queue_declare(queue.as_str(), declare, FieldTable::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })
    }

    async fn consume(
        &self,
        queue: &QueueName,
        tag: &ConsumerTag,
    ) -> Result<DeliveryStream, BrokerError> {
        let consumer = self
            .inner
            .basic_consume(
                queue.as_str(),
                tag.as_str(),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(consumer
            .map(|item| {
                item.map(into_delivery)
                    .map_err(|e| BrokerError::Consume(e.to_string()))
            })
            .boxed())
    }

    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError> {
        self.inner
            .basic_cancel(tag.as_str(), BasicCancelOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }

    async fn publish(
        &self,
        queue: &QueueName,
        message: OutgoingMessage,
    ) -> Result<PublishConfirm, BrokerError> {
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(message.content_type))
            .with_headers(headers_to_table(&message.headers));
        let options = BasicPublishOptions {
            mandatory: message.mandatory,
            ..BasicPublishOptions::default()
        };

        let confirm = self
            .inner
            .basic_publish("", queue.as_str(), options, &message.body, properties)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        let queue = queue.to_string();
        Ok(async move {
            match confirm
                .await
                .map_err(|e| BrokerError::Publish(e.to_string()))?
            {
                Confirmation::Nack(_) => Err(BrokerError::Nacked(queue)),
                Confirmation::Ack(Some(_returned)) => Err(BrokerError::Unroutable(queue)),
                Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
            }
        }
        .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

struct AmqpAcker(LapinAcker);

#[async_trait]
impl Acker for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        let options = BasicNackOptions {
            requeue,
            ..BasicNackOptions::default()
        };
        self.0
            .nack(options)
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let content_type = delivery
        .properties
        .content_type()
        .as_ref()
        .map(|ct| ct.as_str().to_string());
    let headers = delivery
        .properties
        .headers()
        .as_ref()
        .map(table_to_headers)
        .unwrap_or_default();

    Delivery::new(
        delivery.delivery_tag,
        delivery.routing_key.as_str(),
        delivery.data,
        content_type,
        headers,
        Box::new(AmqpAcker(delivery.acker)),
    )
    .redelivered(delivery.redelivered)
}

pub(crate) fn headers_to_table(headers: &Headers) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(ShortString::from(key.clone()), json_to_amqp(value));
    }
    table
}

pub(crate) fn table_to_headers(table: &FieldTable) -> Headers {
    table
        .inner()
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), amqp_to_json(value)))
        .collect()
}

fn json_to_amqp(value: &Value) -> AMQPValue {
    match value {
        Value::Null => AMQPValue::Void,
        Value::Bool(b) => AMQPValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AMQPValue::LongLongInt(i),
            None => AMQPValue::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => AMQPValue::LongString(LongString::from(s.clone())),
        Value::Array(items) => AMQPValue::FieldArray(FieldArray::from(
            items.iter().map(json_to_amqp).collect::<Vec<_>>(),
        )),
        Value::Object(map) => AMQPValue::FieldTable(headers_to_table(map)),
    }
}

fn amqp_to_json(value: &AMQPValue) -> Value {
    match value {
        AMQPValue::Boolean(b) => Value::Bool(*b),
        AMQPValue::ShortShortInt(i) => Value::from(*i),
        AMQPValue::ShortShortUInt(i) => Value::from(*i),
        AMQPValue::ShortInt(i) => Value::from(*i),
        AMQPValue::ShortUInt(i) => Value::from(*i),
        AMQPValue::LongInt(i) => Value::from(*i),
        AMQPValue::LongUInt(i) => Value::from(*i),
        AMQPValue::LongLongInt(i) => Value::from(*i),
        AMQPValue::Timestamp(t) => Value::from(*t),
        AMQPValue::Float(f) => float(f64::from(*f)),
        AMQPValue::Double(f) => float(*f),
        AMQPValue::ShortString(s) => Value::String(s.as_str().to_string()),
        AMQPValue::LongString(s) => Value::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::FieldArray(items) => {
            Value::Array(items.as_slice().iter().map(amqp_to_json).collect())
        }
        AMQPValue::FieldTable(table) => Value::Object(table_to_headers(table)),
        _ => Value::Null,
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
#[path = "amqp_tests.rs"]
mod tests;
