use crate::channel::Channel;
use crate::error::ErrorKind;
use crate::model::ChannelNumber;
use anyhow::Result;
use burrow_codec::frame::{self, AMQPFieldValue, ContentHeaderFrame, FieldTable};
use futures::FutureExt;
use log::{info, warn};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delivery mode of a message which can be lost when the broker restarts.
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;
/// Delivery mode of a message which is written to disk by the broker.
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// The basic content properties of a message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    /// Per message TTL in milliseconds, as the broker expects it.
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    /// Seconds since the epoch.
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
}

impl MessageProperties {
    pub(crate) fn from_header(header: ContentHeaderFrame) -> (Self, Option<String>) {
        let properties = Self {
            content_type: header.content_type,
            content_encoding: header.content_encoding,
            headers: header.headers,
            delivery_mode: header.delivery_mode,
            priority: header.priority,
            correlation_id: header.correlation_id,
            reply_to: header.reply_to,
            expiration: header.expiration,
            message_id: header.message_id,
            timestamp: header.timestamp,
            message_type: header.message_type,
            user_id: header.user_id,
            app_id: header.app_id,
        };

        (properties, header.cluster_id)
    }

    pub(crate) fn to_header(&self, channel: ChannelNumber, body_size: u64) -> ContentHeaderFrame {
        ContentHeaderFrame {
            content_type: self.content_type.clone(),
            content_encoding: self.content_encoding.clone(),
            headers: self.headers.clone(),
            delivery_mode: self.delivery_mode,
            priority: self.priority,
            correlation_id: self.correlation_id.clone(),
            reply_to: self.reply_to.clone(),
            expiration: self.expiration.clone(),
            message_id: self.message_id.clone(),
            timestamp: self.timestamp,
            message_type: self.message_type.clone(),
            user_id: self.user_id.clone(),
            app_id: self.app_id.clone(),
            ..ContentHeaderFrame::new(channel, body_size)
        }
    }
}

/// Summary of the properties of a message, mainly for logging and diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageInfo {
    pub body_size: usize,
    pub headers: Option<FieldTable>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
}

impl MessageInfo {
    fn new(body_size: usize, properties: &MessageProperties) -> Self {
        let p = properties.clone();

        Self {
            body_size,
            headers: p.headers,
            content_type: p.content_type,
            content_encoding: p.content_encoding,
            delivery_mode: p.delivery_mode,
            priority: p.priority,
            correlation_id: p.correlation_id,
            reply_to: p.reply_to,
            expiration: p.expiration,
            message_id: p.message_id,
            timestamp: p.timestamp,
            message_type: p.message_type,
            user_id: p.user_id,
            app_id: p.app_id,
        }
    }
}

/// The message info extended with the delivery details.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncomingMessageInfo {
    pub message: MessageInfo,
    pub consumer_tag: Option<String>,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub synchronous: bool,
    pub cluster_id: Option<String>,
}

/// A message to be published.
///
/// ```
/// use burrow_client::Message;
/// use std::time::Duration;
///
/// let message = Message::new("hello")
///     .content_type("text/plain")
///     .header("attempt", 1)
///     .expiration(Duration::from_millis(1500))
///     .persistent();
///
/// assert_eq!(message.properties.expiration.as_deref(), Some("1500"));
/// ```
#[derive(Debug, Default)]
pub struct Message {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    locked: AtomicBool,
}

/// A copy of a message is never locked.
impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
            properties: self.properties.clone(),
            locked: AtomicBool::new(false),
        }
    }
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_properties(body: impl Into<Vec<u8>>, properties: MessageProperties) -> Self {
        Self {
            body: body.into(),
            properties,
            locked: AtomicBool::new(false),
        }
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.properties.content_type = Some(value.into());
        self
    }

    pub fn content_encoding(mut self, value: impl Into<String>) -> Self {
        self.properties.content_encoding = Some(value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<AMQPFieldValue>) -> Self {
        self.properties
            .headers
            .get_or_insert_with(FieldTable::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: FieldTable) -> Self {
        self.properties.headers = Some(headers);
        self
    }

    pub fn delivery_mode(mut self, mode: u8) -> Self {
        self.properties.delivery_mode = Some(mode);
        self
    }

    pub fn persistent(self) -> Self {
        self.delivery_mode(DELIVERY_MODE_PERSISTENT)
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.properties.priority = Some(priority);
        self
    }

    pub fn correlation_id(mut self, value: impl Into<String>) -> Self {
        self.properties.correlation_id = Some(value.into());
        self
    }

    pub fn reply_to(mut self, value: impl Into<String>) -> Self {
        self.properties.reply_to = Some(value.into());
        self
    }

    /// The message expires in the queue after `ttl`, with millisecond precision.
    pub fn expiration(mut self, ttl: Duration) -> Self {
        self.properties.expiration = Some(ttl.as_millis().to_string());
        self
    }

    pub fn message_id(mut self, value: impl Into<String>) -> Self {
        self.properties.message_id = Some(value.into());
        self
    }

    pub fn timestamp(mut self, seconds: u64) -> Self {
        self.properties.timestamp = Some(seconds);
        self
    }

    pub fn message_type(mut self, value: impl Into<String>) -> Self {
        self.properties.message_type = Some(value.into());
        self
    }

    pub fn user_id(mut self, value: impl Into<String>) -> Self {
        self.properties.user_id = Some(value.into());
        self
    }

    pub fn app_id(mut self, value: impl Into<String>) -> Self {
        self.properties.app_id = Some(value.into());
        self
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn info(&self) -> MessageInfo {
        MessageInfo::new(self.body.len(), &self.properties)
    }
}

/// Delivery details of a message coming from the broker.
pub(crate) struct Envelope {
    pub(crate) exchange: String,
    pub(crate) routing_key: String,
    pub(crate) delivery_tag: u64,
    pub(crate) redelivered: bool,
    pub(crate) consumer_tag: Option<String>,
    pub(crate) message_count: Option<u32>,
    pub(crate) synchronous: bool,
}

/// A message delivered to a consumer or fetched by a get.
///
/// Unless it was received in no-ack mode it needs to be acked, rejected or nacked exactly once.
/// The first disposition locks the message, every later attempt fails with
/// [`ErrorKind::MessageProcess`].
pub struct IncomingMessage {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    pub exchange: String,
    pub routing_key: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    /// The tag of the consumer, `None` if the message is the result of a get.
    pub consumer_tag: Option<String>,
    pub cluster_id: Option<String>,
    /// Number of messages left in the queue, set only by a get.
    pub message_count: Option<u32>,
    /// The message is the result of a synchronous get.
    pub synchronous: bool,
    pub(crate) no_ack: bool,
    locked: AtomicBool,
    channel: Channel,
}

impl fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("channel", &self.channel.number())
            .field("delivery_tag", &self.delivery_tag)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("redelivered", &self.redelivered)
            .field("consumer_tag", &self.consumer_tag)
            .field("body_size", &self.body.len())
            .field("locked", &self.locked())
            .finish()
    }
}

impl IncomingMessage {
    pub(crate) fn new(
        channel: Channel,
        envelope: Envelope,
        header: ContentHeaderFrame,
        body: Vec<u8>,
        no_ack: bool,
    ) -> Self {
        let (properties, cluster_id) = MessageProperties::from_header(header);

        Self {
            body,
            properties,
            exchange: envelope.exchange,
            routing_key: envelope.routing_key,
            delivery_tag: envelope.delivery_tag,
            redelivered: envelope.redelivered,
            consumer_tag: envelope.consumer_tag,
            cluster_id,
            message_count: envelope.message_count,
            synchronous: envelope.synchronous,
            no_ack,
            locked: AtomicBool::new(false),
            channel,
        }
    }

    /// The message doesn't need to be acked, the broker forgot it when it was sent.
    pub fn no_ack(&self) -> bool {
        self.no_ack
    }

    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn info(&self) -> IncomingMessageInfo {
        IncomingMessageInfo {
            message: MessageInfo::new(self.body.len(), &self.properties),
            consumer_tag: self.consumer_tag.clone(),
            delivery_tag: self.delivery_tag,
            redelivered: self.redelivered,
            exchange: self.exchange.clone(),
            routing_key: self.routing_key.clone(),
            synchronous: self.synchronous,
            cluster_id: self.cluster_id.clone(),
        }
    }

    /// Copy of body and properties which can be published again.
    pub fn to_message(&self) -> Message {
        Message::with_properties(self.body.clone(), self.properties.clone())
    }

    fn lock(&self) -> Result<()> {
        if self.locked.swap(true, Ordering::SeqCst) {
            return client_error!(
                ErrorKind::MessageProcess,
                Some(self.channel.number()),
                0,
                format!("Message {} is already processed", self.delivery_tag),
                0
            );
        }

        Ok(())
    }

    fn ensure_ackable(&self, class_method: u32) -> Result<()> {
        if self.no_ack {
            return client_error!(
                ErrorKind::NotAckable,
                Some(self.channel.number()),
                0,
                "Message was received in no-ack mode",
                class_method
            );
        }

        Ok(())
    }

    /// Acknowledges the message. It returns `false` without talking to the broker if the message
    /// was received in no-ack mode.
    pub async fn ack(&self) -> Result<bool> {
        if self.no_ack {
            return Ok(false);
        }

        self.lock()?;
        self.channel.basic_ack(self.delivery_tag, false).await?;

        Ok(true)
    }

    /// Rejects the message, with `requeue` the broker delivers it again later.
    pub async fn reject(&self, requeue: bool) -> Result<()> {
        self.ensure_ackable(frame::BASIC_REJECT)?;
        self.lock()?;
        self.channel.basic_reject(self.delivery_tag, requeue).await
    }

    /// Negative acknowledgement of this message only.
    pub async fn nack(&self, requeue: bool) -> Result<()> {
        self.ensure_ackable(frame::BASIC_NACK)?;
        self.lock()?;
        self.channel.basic_nack(self.delivery_tag, false, requeue).await
    }

    /// Runs `work` and disposes the message according to its outcome. Success acks the message,
    /// failure (error or panic) rejects it, and the failure is passed on to the caller in both
    /// cases.
    ///
    /// A redelivered message which fails again is not rejected if `reject_on_redelivered` is set,
    /// it is left to the dead-letter or TTL policy of the queue.
    pub async fn process<F, T>(&self, options: ProcessOptions, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = AssertUnwindSafe(work).catch_unwind().await;

        let skip = self.no_ack || (options.ignore_processed && self.locked());

        match outcome {
            Ok(Ok(value)) => {
                if !skip {
                    self.ack().await?;
                }

                Ok(value)
            }
            Ok(Err(err)) => {
                if !skip {
                    self.dispose_failed(&options, &err.to_string()).await;
                }

                Err(err)
            }
            Err(panic) => {
                if !skip {
                    self.dispose_failed(&options, "processing panicked").await;
                }

                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn dispose_failed(&self, options: &ProcessOptions, reason: &str) {
        if options.reject_on_redelivered && self.redelivered {
            info!(
                "Message {:?} failed after redelivery ({}), leaving it to the broker",
                self, reason
            );

            return;
        }

        if let Err(e) = self.reject(options.requeue).await {
            warn!("Cannot reject message {}: {:?}", self.delivery_tag, e);
        }
    }
}

/// Options of [`IncomingMessage::process`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// A failed message is requeued instead of being dropped or dead-lettered.
    pub requeue: bool,
    /// A redelivered message which fails again is not rejected.
    pub reject_on_redelivered: bool,
    /// Nothing happens at the end if the work already acked or rejected the message.
    pub ignore_processed: bool,
}

impl ProcessOptions {
    pub fn requeue(mut self, value: bool) -> Self {
        self.requeue = value;
        self
    }

    pub fn reject_on_redelivered(mut self, value: bool) -> Self {
        self.reject_on_redelivered = value;
        self
    }

    pub fn ignore_processed(mut self, value: bool) -> Self {
        self.ignore_processed = value;
        self
    }
}

/// A mandatory message which the broker couldn't route to any queue.
#[derive(Clone, Debug)]
pub struct ReturnedMessage {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
    pub message: Message,
}
