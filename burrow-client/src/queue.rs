use crate::channel::{Channel, ConsumeOpts};
use crate::consumer::ConsumerHandler;
use crate::message::IncomingMessage;
use anyhow::Result;
use burrow_codec::frame::{AMQPFieldValue, FieldTable};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct QueueDeclareOpts {
    pub durable: bool,
    /// The queue belongs to the connection and it is deleted when the connection closes.
    pub exclusive: bool,
    pub auto_delete: bool,
    /// Only checks if the queue exists.
    pub passive: bool,
    pub arguments: Option<FieldTable>,
}

impl QueueDeclareOpts {
    pub fn durable(mut self, value: bool) -> Self {
        self.durable = value;
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.exclusive = value;
        self
    }

    pub fn auto_delete(mut self, value: bool) -> Self {
        self.auto_delete = value;
        self
    }

    pub fn passive(mut self, value: bool) -> Self {
        self.passive = value;
        self
    }

    /// Messages expire in the queue after `ttl`. Longer than `i64::MAX` milliseconds is capped.
    pub fn message_ttl(self, ttl: Duration) -> Self {
        self.argument("x-message-ttl", i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    /// Rejected and expired messages are sent to this exchange.
    pub fn dead_letter_exchange(self, exchange: &str) -> Self {
        self.argument("x-dead-letter-exchange", exchange)
    }

    pub fn dead_letter_routing_key(self, routing_key: &str) -> Self {
        self.argument("x-dead-letter-routing-key", routing_key)
    }

    pub fn argument(mut self, key: &str, value: impl Into<AMQPFieldValue>) -> Self {
        self.arguments
            .get_or_insert_with(FieldTable::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// Handle of a declared queue on a channel. The counters are the values of the declare.
#[derive(Clone, Debug)]
pub struct Queue {
    channel: Channel,
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl Queue {
    pub(crate) fn new(channel: Channel, name: &str, message_count: u32, consumer_count: u32) -> Self {
        Self {
            channel,
            name: name.to_string(),
            message_count,
            consumer_count,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The same queue with a deadline on its commands, see [`Channel::with_timeout`].
    pub fn with_timeout(&self, timeout: Duration) -> Queue {
        Queue {
            channel: self.channel.with_timeout(timeout),
            ..self.clone()
        }
    }

    /// Binds the queue to an exchange, the exchange is a name or an [`crate::Exchange`].
    pub async fn bind(&self, exchange: impl AsRef<str>, routing_key: &str) -> Result<()> {
        self.channel
            .queue_bind(&self.name, exchange.as_ref(), routing_key, None)
            .await
    }

    pub async fn bind_with_arguments(
        &self,
        exchange: impl AsRef<str>,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<()> {
        self.channel
            .queue_bind(&self.name, exchange.as_ref(), routing_key, Some(arguments))
            .await
    }

    pub async fn unbind(&self, exchange: impl AsRef<str>, routing_key: &str) -> Result<()> {
        self.channel
            .queue_unbind(&self.name, exchange.as_ref(), routing_key, None)
            .await
    }

    /// Fetches one message, see [`Channel::get`].
    pub async fn get(&self, no_ack: bool, timeout: Option<Duration>) -> Result<IncomingMessage> {
        self.channel.get(&self.name, no_ack, timeout).await
    }

    pub async fn consume(&self, handler: Arc<dyn ConsumerHandler>, opts: ConsumeOpts) -> Result<String> {
        self.channel.consume(&self.name, handler, opts).await
    }

    pub async fn cancel(&self, consumer_tag: &str) -> Result<()> {
        self.channel.cancel(consumer_tag).await
    }

    pub async fn purge(&self) -> Result<u32> {
        self.channel.queue_purge(&self.name).await
    }

    pub async fn delete(&self, if_unused: bool, if_empty: bool) -> Result<u32> {
        self.channel.queue_delete(&self.name, if_unused, if_empty).await
    }
}
