use crate::channel::Channel;
use crate::message::Message;
use anyhow::{anyhow, Result};
use burrow_codec::frame::{AMQPFieldValue, FieldTable};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Routing algorithm of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeType {
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl ExchangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Topic => "topic",
            ExchangeType::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(ExchangeType::Direct),
            "fanout" => Ok(ExchangeType::Fanout),
            "topic" => Ok(ExchangeType::Topic),
            "headers" => Ok(ExchangeType::Headers),
            _ => Err(anyhow!("Unknown exchange type {}", s)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExchangeDeclareOpts {
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    /// Only checks if the exchange exists.
    pub passive: bool,
    pub arguments: Option<FieldTable>,
}

impl ExchangeDeclareOpts {
    pub fn durable(mut self, value: bool) -> Self {
        self.durable = value;
        self
    }

    pub fn auto_delete(mut self, value: bool) -> Self {
        self.auto_delete = value;
        self
    }

    pub fn internal(mut self, value: bool) -> Self {
        self.internal = value;
        self
    }

    pub fn passive(mut self, value: bool) -> Self {
        self.passive = value;
        self
    }

    /// Sets the exchange where the unroutable messages go.
    pub fn alternate_exchange(self, exchange: &str) -> Self {
        self.argument("alternate-exchange", exchange)
    }

    pub fn argument(mut self, key: &str, value: impl Into<AMQPFieldValue>) -> Self {
        self.arguments
            .get_or_insert_with(FieldTable::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// Handle of a declared exchange on a channel.
#[derive(Clone, Debug)]
pub struct Exchange {
    channel: Channel,
    pub name: String,
    pub exchange_type: ExchangeType,
}

impl AsRef<str> for Exchange {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl Exchange {
    pub(crate) fn new(channel: Channel, name: &str, exchange_type: ExchangeType) -> Self {
        Self {
            channel,
            name: name.to_string(),
            exchange_type,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn with_timeout(&self, timeout: Duration) -> Exchange {
        Exchange {
            channel: self.channel.with_timeout(timeout),
            ..self.clone()
        }
    }

    pub async fn publish(&self, message: &Message, routing_key: &str) -> Result<()> {
        self.channel.publish(message, &self.name, routing_key, false).await
    }

    /// Publishes a message which is returned if the exchange cannot route it to any queue.
    pub async fn publish_mandatory(&self, message: &Message, routing_key: &str) -> Result<()> {
        self.channel.publish(message, &self.name, routing_key, true).await
    }

    pub async fn delete(&self, if_unused: bool) -> Result<()> {
        self.channel.exchange_delete(&self.name, if_unused).await
    }
}
