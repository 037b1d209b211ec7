//! Channel is the place where the AMQP commands are sent and the messages are delivered.
//!
//! Every channel has a dispatcher task which gets the frames of the channel from the connection
//! reader. It assembles the content frames into messages, hands them to the consumers or to the
//! waiting `get`, settles the publisher confirms and passes the replies to the correlator.
use crate::connection::ConnectionInner;
use crate::consumer::ConsumerHandler;
use crate::error::{ClientError, ErrorKind};
use crate::exchange::{Exchange, ExchangeDeclareOpts, ExchangeType};
use crate::message::{Envelope, IncomingMessage, Message, MessageProperties, ReturnedMessage};
use crate::model::{ChannelError, ChannelNumber, ClassMethod, ConnectionError};
use crate::queue::{Queue, QueueDeclareOpts};
use crate::rpc::{Correlator, Reply, Resolution};
use crate::ClientConfig;
use anyhow::Result;
use burrow_codec::codec::Frame;
use burrow_codec::frame::{
    self, AMQPFieldValue, AMQPFrame, BasicAckArgs, BasicCancelArgs, BasicConsumeArgs, BasicDeliverArgs,
    BasicGetArgs, BasicGetOkArgs, BasicNackArgs, BasicPublishArgs, BasicQosArgs, BasicRecoverArgs,
    BasicRejectArgs, BasicReturnArgs, ContentBodyFrame, ContentHeaderFrame, ExchangeDeclareArgs,
    ExchangeDeleteArgs, FieldTable, MethodFrameArgs, QueueBindArgs, QueueDeclareArgs, QueueDeleteArgs,
    QueuePurgeArgs, QueueUnbindArgs,
};
use log::{debug, error, info, trace, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Lifecycle of a channel. A closed channel never opens again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Initializing,
    Open,
    Closing,
    Closed,
}

/// Options of starting a consumer.
#[derive(Clone, Debug, Default)]
pub struct ConsumeOpts {
    /// The broker forgets the messages as soon as they are sent, they cannot be acked.
    pub no_ack: bool,
    /// No other consumer can consume the queue.
    pub exclusive: bool,
    pub arguments: Option<FieldTable>,
}

impl ConsumeOpts {
    pub fn no_ack(mut self, value: bool) -> Self {
        self.no_ack = value;
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.exclusive = value;
        self
    }

    pub fn argument(mut self, key: &str, value: impl Into<AMQPFieldValue>) -> Self {
        self.arguments
            .get_or_insert_with(FieldTable::new)
            .insert(key.to_string(), value.into());
        self
    }
}

type CloseCallback = Box<dyn FnOnce(&ClientError) + Send>;
type ReturnCallback = Arc<dyn Fn(&ReturnedMessage) + Send + Sync>;

struct ConsumerEntry {
    queue: String,
    no_ack: bool,
    handler: Arc<dyn ConsumerHandler>,
}

type ConfirmSender = oneshot::Sender<Result<(), ClientError>>;

#[derive(Default)]
struct Confirms {
    enabled: bool,
    next_tag: u64,
    pending: BTreeMap<u64, ConfirmSender>,
}

impl Confirms {
    /// Takes out the confirms settled by an ack or nack.
    fn settle(&mut self, delivery_tag: u64, multiple: bool) -> Vec<ConfirmSender> {
        if multiple {
            let rest = if delivery_tag == 0 {
                BTreeMap::new()
            } else {
                self.pending.split_off(&(delivery_tag + 1))
            };

            std::mem::replace(&mut self.pending, rest).into_values().collect()
        } else {
            self.pending.remove(&delivery_tag).into_iter().collect()
        }
    }
}

struct ChannelShared {
    state: ChannelState,
    close_reason: Option<ClientError>,
    consumers: HashMap<String, ConsumerEntry>,
    confirms: Confirms,
    close_callbacks: Vec<CloseCallback>,
    return_callbacks: Vec<ReturnCallback>,
}

pub(crate) struct ChannelInner {
    number: ChannelNumber,
    connection: Weak<ConnectionInner>,
    outgoing: mpsc::Sender<Frame>,
    rpc: Correlator,
    config: Arc<ClientConfig>,
    frame_max: u32,
    publish_order: tokio::sync::Mutex<()>,
    shared: Mutex<ChannelShared>,
}

/// A channel of a connection. It is cheap to clone, all the clones use the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
    /// Deadline of the synchronous commands sent through this handle, it overrides
    /// `rpc_timeout` of the config.
    timeout: Option<Duration>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("number", &self.inner.number)
            .field("state", &self.state())
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(
        number: ChannelNumber,
        connection: Weak<ConnectionInner>,
        outgoing: mpsc::Sender<Frame>,
        config: Arc<ClientConfig>,
        frame_max: u32,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                number,
                connection,
                outgoing,
                rpc: Correlator::new(number),
                config,
                frame_max,
                publish_order: tokio::sync::Mutex::new(()),
                shared: Mutex::new(ChannelShared {
                    state: ChannelState::Initializing,
                    close_reason: None,
                    consumers: HashMap::new(),
                    confirms: Confirms::default(),
                    close_callbacks: vec![],
                    return_callbacks: vec![],
                }),
            }),
            timeout: None,
        }
    }

    /// A handle to the same channel whose synchronous commands, publish confirms and gets wait
    /// at most `timeout`. A command without a reply in time fails with [`ErrorKind::Timeout`],
    /// the channel stays open and the late reply is discarded.
    ///
    /// Queues and exchanges declared through the handle keep using the deadline.
    ///
    /// ```no_run
    /// # async fn declare(channel: burrow_client::Channel) -> anyhow::Result<()> {
    /// use burrow_client::QueueDeclareOpts;
    /// use std::time::Duration;
    ///
    /// let queue = channel
    ///     .with_timeout(Duration::from_secs(2))
    ///     .declare_queue("jobs", QueueDeclareOpts::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_timeout(&self, timeout: Duration) -> Channel {
        Channel {
            inner: self.inner.clone(),
            timeout: Some(timeout),
        }
    }

    fn command_timeout(&self) -> Option<Duration> {
        self.timeout.or_else(|| self.inner.config.rpc_timeout())
    }

    fn shared(&self) -> MutexGuard<'_, ChannelShared> {
        self.inner.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn number(&self) -> ChannelNumber {
        self.inner.number
    }

    pub fn state(&self) -> ChannelState {
        self.shared().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// The error which closed the channel.
    pub fn close_reason(&self) -> Option<ClientError> {
        self.shared().close_reason.clone()
    }

    /// Opens the channel on the server side and turns on the publisher confirms if they are
    /// configured.
    pub(crate) async fn open(&self, frames: mpsc::UnboundedReceiver<AMQPFrame>) -> Result<()> {
        let dispatcher = Dispatcher {
            channel: self.clone(),
            assembly: None,
        };

        tokio::spawn(dispatcher.run(frames));

        let result = self.open_handshake().await;

        match result {
            Ok(()) => {
                let mut shared = self.shared();

                if shared.state == ChannelState::Initializing {
                    shared.state = ChannelState::Open;
                }

                debug!("Channel {} is open", self.inner.number);

                Ok(())
            }
            Err(e) => {
                let reason = match e.downcast_ref::<ClientError>() {
                    Some(client_err) => client_err.clone(),
                    None => self.closed_error(0, "Channel open failed", frame::CHANNEL_OPEN),
                };

                self.terminate(reason);

                Err(e)
            }
        }
    }

    async fn open_handshake(&self) -> Result<()> {
        let timeout = self.inner.config.rpc_timeout();
        let number = self.inner.number;

        self.inner
            .rpc
            .call(
                &self.inner.outgoing,
                frame::channel_open(number).into(),
                &[frame::CHANNEL_OPEN_OK],
                frame::CHANNEL_OPEN,
                false,
                timeout,
            )
            .await?;

        if self.inner.config.publisher_confirms {
            self.inner
                .rpc
                .call(
                    &self.inner.outgoing,
                    frame::confirm_select(number).into(),
                    &[frame::CONFIRM_SELECT_OK],
                    frame::CONFIRM_SELECT,
                    false,
                    timeout,
                )
                .await?;

            self.shared().confirms.enabled = true;
        }

        Ok(())
    }

    fn closed_error(&self, code: u16, message: &str, class_method: ClassMethod) -> ClientError {
        ClientError::new(
            ErrorKind::ChannelClosed,
            Some(self.inner.number),
            code,
            message,
            class_method,
        )
    }

    fn ensure_open(&self) -> Result<()> {
        let shared = self.shared();

        match shared.state {
            ChannelState::Open => Ok(()),
            _ => match &shared.close_reason {
                Some(reason) => Err(anyhow::Error::new(reason.clone())),
                None => Err(anyhow::Error::new(self.closed_error(
                    ConnectionError::ChannelError.code(),
                    "Channel is not open",
                    0,
                ))),
            },
        }
    }

    async fn send(&self, frame: impl Into<Frame>) -> Result<()> {
        if self.inner.outgoing.send(frame.into()).await.is_err() {
            return client_error!(
                ErrorKind::Connection,
                None,
                0,
                "Connection is closed",
                0
            );
        }

        Ok(())
    }

    async fn call(&self, frame: AMQPFrame, expect: &'static [ClassMethod]) -> Result<Reply> {
        self.ensure_open()?;

        let request = match &frame {
            AMQPFrame::Method(_, cm, _) => *cm,
            _ => 0,
        };

        self.inner
            .rpc
            .call(
                &self.inner.outgoing,
                frame.into(),
                expect,
                request,
                false,
                self.command_timeout(),
            )
            .await
    }

    fn unexpected_reply(&self, request: ClassMethod) -> anyhow::Error {
        anyhow::Error::new(ClientError::new(
            ErrorKind::ChannelClosed,
            Some(self.inner.number),
            0,
            "Unexpected reply",
            request,
        ))
    }

    /// Closes the channel. Calling it again or on a channel closed by the server does nothing.
    pub async fn close(&self) -> Result<()> {
        {
            let mut shared = self.shared();

            match shared.state {
                ChannelState::Initializing | ChannelState::Open => shared.state = ChannelState::Closing,
                ChannelState::Closing | ChannelState::Closed => return Ok(()),
            }
        }

        let number = self.inner.number;
        let reason = self.closed_error(ChannelError::Success.code(), "Channel closed by client", 0);

        self.inner.rpc.begin_close(reason.clone());

        let confirmed = self
            .inner
            .rpc
            .call(
                &self.inner.outgoing,
                frame::channel_close(number, ChannelError::Success.code(), "Normal close", 0).into(),
                &[frame::CHANNEL_CLOSE_OK],
                frame::CHANNEL_CLOSE,
                false,
                Some(self.inner.config.close_timeout()),
            )
            .await;

        if let Err(e) = confirmed {
            debug!("Close of channel {} is not confirmed {:?}", number, e);
        }

        self.terminate(reason);

        Ok(())
    }

    /// Puts the channel into closed state, fails everything which waits for the server and runs
    /// the close callbacks. Only the first call has effect.
    pub(crate) fn terminate(&self, reason: ClientError) {
        let (callbacks, confirms) = {
            let mut shared = self.shared();

            if shared.state == ChannelState::Closed {
                return;
            }

            shared.state = ChannelState::Closed;
            shared.close_reason = Some(reason.clone());
            shared.consumers.clear();
            shared.confirms.enabled = false;

            (
                std::mem::take(&mut shared.close_callbacks),
                std::mem::take(&mut shared.confirms.pending),
            )
        };

        info!(
            "Channel {} closed {} {}",
            self.inner.number, reason.code, reason.message
        );

        self.inner.rpc.fail_all(reason.clone());

        for (_, tx) in confirms {
            let _ = tx.send(Err(reason.clone()));
        }

        if let Some(connection) = self.inner.connection.upgrade() {
            connection.release_channel(self.inner.number);
        }

        for callback in callbacks {
            callback(&reason);
        }
    }

    /// Registers a function which is called once with the reason when the channel closes. If the
    /// channel is closed already, it is called immediately.
    pub fn add_close_callback<F>(&self, callback: F)
    where
        F: FnOnce(&ClientError) + Send + 'static,
    {
        let reason = {
            let mut shared = self.shared();

            if shared.state != ChannelState::Closed {
                shared.close_callbacks.push(Box::new(callback));
                return;
            }

            shared.close_reason.clone()
        };

        if let Some(reason) = reason {
            callback(&reason);
        }
    }

    /// Registers a function which gets the mandatory messages the broker couldn't route.
    pub fn add_return_callback<F>(&self, callback: F)
    where
        F: Fn(&ReturnedMessage) + Send + Sync + 'static,
    {
        self.shared().return_callbacks.push(Arc::new(callback));
    }

    /// Handle of the nameless direct exchange which routes to the queue named by the routing key.
    pub fn default_exchange(&self) -> Exchange {
        Exchange::new(self.clone(), "", ExchangeType::Direct)
    }

    pub async fn declare_exchange(
        &self,
        name: &str,
        exchange_type: ExchangeType,
        opts: ExchangeDeclareOpts,
    ) -> Result<Exchange> {
        let args = ExchangeDeclareArgs::default()
            .exchange_name(name)
            .exchange_type(exchange_type.as_str())
            .durable(opts.durable)
            .auto_delete(opts.auto_delete)
            .internal(opts.internal)
            .passive(opts.passive)
            .args(opts.arguments);

        self.call(args.frame(self.inner.number), &[frame::EXCHANGE_DECLARE_OK])
            .await?;

        Ok(Exchange::new(self.clone(), name, exchange_type))
    }

    pub async fn exchange_delete(&self, name: &str, if_unused: bool) -> Result<()> {
        let args = ExchangeDeleteArgs::default().exchange_name(name).if_unused(if_unused);

        self.call(args.frame(self.inner.number), &[frame::EXCHANGE_DELETE_OK])
            .await?;

        Ok(())
    }

    /// Declares a queue, with empty name the server generates one.
    pub async fn declare_queue(&self, name: &str, opts: QueueDeclareOpts) -> Result<Queue> {
        let args = QueueDeclareArgs::default()
            .name(name)
            .durable(opts.durable)
            .exclusive(opts.exclusive)
            .auto_delete(opts.auto_delete)
            .passive(opts.passive)
            .args(opts.arguments);

        match self
            .call(args.frame(self.inner.number), &[frame::QUEUE_DECLARE_OK])
            .await?
        {
            Reply::Method(MethodFrameArgs::QueueDeclareOk(ok)) => Ok(Queue::new(
                self.clone(),
                &ok.name,
                ok.message_count,
                ok.consumer_count,
            )),
            _ => Err(self.unexpected_reply(frame::QUEUE_DECLARE)),
        }
    }

    pub async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: Option<FieldTable>,
    ) -> Result<()> {
        let args = QueueBindArgs::new(queue, exchange)
            .routing_key(routing_key)
            .args(arguments);

        self.call(args.frame(self.inner.number), &[frame::QUEUE_BIND_OK])
            .await?;

        Ok(())
    }

    pub async fn queue_unbind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: Option<FieldTable>,
    ) -> Result<()> {
        let args = QueueUnbindArgs::new(queue, exchange)
            .routing_key(routing_key)
            .args(arguments);

        self.call(args.frame(self.inner.number), &[frame::QUEUE_UNBIND_OK])
            .await?;

        Ok(())
    }

    /// Removes every ready message of the queue, it returns the number of removed messages.
    pub async fn queue_purge(&self, queue: &str) -> Result<u32> {
        let args = QueuePurgeArgs::default().queue_name(queue);

        match self
            .call(args.frame(self.inner.number), &[frame::QUEUE_PURGE_OK])
            .await?
        {
            Reply::Method(MethodFrameArgs::QueuePurgeOk(ok)) => Ok(ok.message_count),
            _ => Err(self.unexpected_reply(frame::QUEUE_PURGE)),
        }
    }

    /// Deletes the queue and forgets its consumers, it returns the number of deleted messages.
    pub async fn queue_delete(&self, queue: &str, if_unused: bool, if_empty: bool) -> Result<u32> {
        let args = QueueDeleteArgs::default()
            .queue_name(queue)
            .if_unused(if_unused)
            .if_empty(if_empty);

        match self
            .call(args.frame(self.inner.number), &[frame::QUEUE_DELETE_OK])
            .await?
        {
            Reply::Method(MethodFrameArgs::QueueDeleteOk(ok)) => {
                self.shared().consumers.retain(|_, consumer| consumer.queue != queue);

                Ok(ok.message_count)
            }
            _ => Err(self.unexpected_reply(frame::QUEUE_DELETE)),
        }
    }

    /// Limits the number of unacked messages the broker sends to the consumers of the channel,
    /// or of the connection if `global` is set.
    pub async fn set_qos(&self, prefetch_count: u16, global: bool) -> Result<()> {
        let args = BasicQosArgs::default()
            .prefetch_count(prefetch_count)
            .global(global);

        self.call(args.frame(self.inner.number), &[frame::BASIC_QOS_OK])
            .await?;

        Ok(())
    }

    /// Asks the broker to redeliver the unacked messages of the channel.
    pub async fn recover(&self, requeue: bool) -> Result<()> {
        let args = BasicRecoverArgs::default().requeue(requeue);

        self.call(args.frame(self.inner.number), &[frame::BASIC_RECOVER_OK])
            .await?;

        Ok(())
    }

    /// Publishes a message. With publisher confirms it returns when the broker took
    /// responsibility for the message, and fails if the broker nacked it.
    pub async fn publish(
        &self,
        message: &Message,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
    ) -> Result<()> {
        self.ensure_open()?;

        let number = self.inner.number;
        let mut frames = vec![
            BasicPublishArgs::new(exchange)
                .routing_key(routing_key)
                .mandatory(mandatory)
                .frame(number),
            message
                .properties
                .to_header(number, message.body.len() as u64)
                .frame(),
        ];

        for chunk in message.body.chunks(max_body_size(self.inner.frame_max, message.body.len())) {
            frames.push(
                ContentBodyFrame {
                    channel: number,
                    body: chunk.to_vec(),
                }
                .frame(),
            );
        }

        let confirm = {
            let _order = self.inner.publish_order.lock().await;

            let confirm = {
                let mut shared = self.shared();

                if shared.state != ChannelState::Open {
                    drop(shared);

                    return self.ensure_open();
                }

                if shared.confirms.enabled {
                    let (tx, rx) = oneshot::channel();

                    shared.confirms.next_tag += 1;

                    let tag = shared.confirms.next_tag;

                    shared.confirms.pending.insert(tag, tx);

                    Some((tag, rx))
                } else {
                    None
                }
            };

            if let Err(e) = self.send(Frame::Frames(frames)).await {
                if let Some((tag, _)) = &confirm {
                    self.shared().confirms.pending.remove(tag);
                }

                return Err(e);
            }

            confirm
        };

        match confirm {
            Some((tag, rx)) => self.wait_for_confirm(tag, rx).await,
            None => Ok(()),
        }
    }

    async fn wait_for_confirm(
        &self,
        tag: u64,
        rx: oneshot::Receiver<Result<(), ClientError>>,
    ) -> Result<()> {
        let outcome = match self.command_timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.shared().confirms.pending.remove(&tag);

                    return client_error!(
                        ErrorKind::Timeout,
                        Some(self.inner.number),
                        0,
                        format!("Publish {} is not confirmed in {:?}", tag, deadline),
                        frame::BASIC_PUBLISH
                    );
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::new(e)),
            Err(_) => Err(self.ensure_open().err().unwrap_or_else(|| {
                anyhow::Error::new(self.closed_error(0, "Publish confirm is lost", frame::BASIC_PUBLISH))
            })),
        }
    }

    /// Fetches one message from the queue. An empty queue fails with a [`ErrorKind::Timeout`]
    /// error whose class method is `basic.get-empty`, see [`ClientError::is_queue_empty`].
    pub async fn get(&self, queue: &str, no_ack: bool, timeout: Option<Duration>) -> Result<IncomingMessage> {
        self.ensure_open()?;

        let number = self.inner.number;
        let reply = self
            .inner
            .rpc
            .call(
                &self.inner.outgoing,
                BasicGetArgs::new(queue).no_ack(no_ack).frame(number).into(),
                &[frame::BASIC_GET_OK, frame::BASIC_GET_EMPTY],
                frame::BASIC_GET,
                no_ack,
                timeout.or_else(|| self.command_timeout()),
            )
            .await?;

        match reply {
            Reply::Message(message) => Ok(*message),
            Reply::Method(MethodFrameArgs::BasicGetEmpty) => client_error!(
                ErrorKind::Timeout,
                Some(number),
                0,
                format!("Queue {} is empty", queue),
                frame::BASIC_GET_EMPTY
            ),
            _ => Err(self.unexpected_reply(frame::BASIC_GET)),
        }
    }

    /// Starts consuming the queue, it returns the generated consumer tag. Each message is passed
    /// to the handler in a new task.
    pub async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn ConsumerHandler>,
        opts: ConsumeOpts,
    ) -> Result<String> {
        self.ensure_open()?;

        let consumer_tag = format!(
            "{}-{:032x}",
            self.inner.config.consumer_tag_prefix,
            rand::random::<u128>()
        );

        // deliveries can arrive before the consume-ok
        self.shared().consumers.insert(
            consumer_tag.clone(),
            ConsumerEntry {
                queue: queue.to_string(),
                no_ack: opts.no_ack,
                handler,
            },
        );

        let args = BasicConsumeArgs::default()
            .queue(queue)
            .consumer_tag(&consumer_tag)
            .no_ack(opts.no_ack)
            .exclusive(opts.exclusive)
            .args(opts.arguments);

        if let Err(e) = self
            .call(args.frame(self.inner.number), &[frame::BASIC_CONSUME_OK])
            .await
        {
            self.shared().consumers.remove(&consumer_tag);

            return Err(e);
        }

        debug!("Consumer {} started on queue {}", consumer_tag, queue);

        Ok(consumer_tag)
    }

    /// Stops the consumer. Messages which are already delivered are still handled.
    pub async fn cancel(&self, consumer_tag: &str) -> Result<()> {
        self.shared().consumers.remove(consumer_tag);

        self.call(
            BasicCancelArgs::new(consumer_tag).frame(self.inner.number),
            &[frame::BASIC_CANCEL_OK],
        )
        .await?;

        Ok(())
    }

    pub(crate) async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<()> {
        self.ensure_open()?;

        let args = BasicAckArgs::default()
            .delivery_tag(delivery_tag)
            .multiple(multiple);

        self.send(args.frame(self.inner.number)).await
    }

    pub(crate) async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        self.ensure_open()?;

        let args = BasicRejectArgs::default()
            .delivery_tag(delivery_tag)
            .requeue(requeue);

        self.send(args.frame(self.inner.number)).await
    }

    pub(crate) async fn basic_nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()> {
        self.ensure_open()?;

        let args = BasicNackArgs::default()
            .delivery_tag(delivery_tag)
            .multiple(multiple)
            .requeue(requeue);

        self.send(args.frame(self.inner.number)).await
    }

    fn consumer(&self, consumer_tag: &str) -> Option<(Arc<dyn ConsumerHandler>, bool)> {
        self.shared()
            .consumers
            .get(consumer_tag)
            .map(|c| (c.handler.clone(), c.no_ack))
    }

    fn settle_confirms(&self, delivery_tag: u64, multiple: bool, nacked: bool) {
        let settled = self.shared().confirms.settle(delivery_tag, multiple);

        for tx in settled {
            let outcome = if nacked {
                Err(ClientError::new(
                    ErrorKind::Delivery,
                    Some(self.inner.number),
                    0,
                    "Message is nacked by the broker",
                    frame::BASIC_NACK,
                ))
            } else {
                Ok(())
            };

            let _ = tx.send(outcome);
        }
    }
}

/// Largest body chunk which fits into a frame of the negotiated size.
fn max_body_size(frame_max: u32, body_len: usize) -> usize {
    if frame_max == 0 {
        body_len.max(1)
    } else {
        (frame_max as usize).saturating_sub(8).max(1)
    }
}

enum ContentMethod {
    Deliver(BasicDeliverArgs),
    GetOk(BasicGetOkArgs),
    Return(BasicReturnArgs),
}

struct Assembly {
    method: ContentMethod,
    header: Option<ContentHeaderFrame>,
    body: Vec<u8>,
}

struct Dispatcher {
    channel: Channel,
    assembly: Option<Assembly>,
}

impl Dispatcher {
    async fn run(mut self, mut frames: mpsc::UnboundedReceiver<AMQPFrame>) {
        while let Some(frame) = frames.recv().await {
            trace!("Channel {} dispatches {:?}", self.channel.number(), frame);

            match frame {
                AMQPFrame::Method(_, cm, args) => self.handle_method(cm, args).await,
                AMQPFrame::ContentHeader(header) => self.handle_header(header).await,
                AMQPFrame::ContentBody(body) => self.handle_body(body).await,
                other => warn!("Channel {} cannot handle {:?}", self.channel.number(), other),
            }
        }

        trace!("Dispatcher of channel {} stopped", self.channel.number());
    }

    fn start_content(&mut self, method: ContentMethod) {
        if self.assembly.is_some() {
            warn!(
                "Channel {} got a new content method while the previous content is incomplete",
                self.channel.number()
            );
        }

        self.assembly = Some(Assembly {
            method,
            header: None,
            body: vec![],
        });
    }

    async fn handle_method(&mut self, class_method: ClassMethod, args: MethodFrameArgs) {
        let channel = self.channel.clone();

        match args {
            MethodFrameArgs::BasicDeliver(args) => self.start_content(ContentMethod::Deliver(args)),
            MethodFrameArgs::BasicGetOk(args) => self.start_content(ContentMethod::GetOk(args)),
            MethodFrameArgs::BasicReturn(args) => self.start_content(ContentMethod::Return(args)),
            MethodFrameArgs::BasicAck(args) => {
                channel.settle_confirms(args.delivery_tag, args.multiple, false);
            }
            MethodFrameArgs::BasicNack(args) => {
                channel.settle_confirms(args.delivery_tag, args.is_multiple(), true);
            }
            MethodFrameArgs::BasicCancel(args) => {
                warn!(
                    "Consumer {} is cancelled by the broker on channel {}",
                    args.consumer_tag,
                    channel.number()
                );

                channel.shared().consumers.remove(&args.consumer_tag);

                if !args.no_wait {
                    let cancel_ok = frame::BasicCancelOkArgs::new(&args.consumer_tag).frame(channel.number());

                    if let Err(e) = channel.send(cancel_ok).await {
                        error!("Cannot send cancel-ok {:?}", e);
                    }
                }
            }
            MethodFrameArgs::ChannelClose(args) => {
                let reason = channel.closed_error(
                    args.code,
                    &args.text,
                    frame::unify_class_method(args.class_id, args.method_id),
                );

                warn!("Channel {} is closed by the broker {:?}", channel.number(), reason);

                if let Err(e) = channel.send(frame::channel_close_ok(channel.number())).await {
                    error!("Cannot send channel close-ok {:?}", e);
                }

                channel.terminate(reason);
            }
            MethodFrameArgs::ChannelFlow(args) => {
                info!("Channel {} flow active: {}", channel.number(), args.active);

                if let Err(e) = channel
                    .send(frame::channel_flow_ok(channel.number(), args.active))
                    .await
                {
                    error!("Cannot send flow-ok {:?}", e);
                }
            }
            args => {
                if let Resolution::Late(_) = channel.inner.rpc.resolve(class_method, Reply::Method(args)) {
                    debug!(
                        "Late reply {:08X} on channel {} is dropped",
                        class_method,
                        channel.number()
                    );
                }
            }
        }
    }

    async fn handle_header(&mut self, header: ContentHeaderFrame) {
        match &mut self.assembly {
            Some(assembly) if assembly.header.is_none() => {
                let complete = header.body_size == 0;

                assembly.header = Some(header);

                if complete {
                    self.complete().await;
                }
            }
            _ => warn!(
                "Channel {} got an unexpected content header",
                self.channel.number()
            ),
        }
    }

    async fn handle_body(&mut self, body: frame::ContentBodyFrame) {
        match &mut self.assembly {
            Some(Assembly {
                header: Some(header),
                body: content,
                ..
            }) => {
                content.extend_from_slice(&body.body);

                if content.len() as u64 >= header.body_size {
                    self.complete().await;
                }
            }
            _ => warn!(
                "Channel {} got an unexpected content body",
                self.channel.number()
            ),
        }
    }

    async fn complete(&mut self) {
        let (method, header, body) = match self.assembly.take() {
            Some(Assembly {
                method,
                header: Some(header),
                body,
            }) => (method, header, body),
            _ => return,
        };

        let channel = self.channel.clone();

        match method {
            ContentMethod::Deliver(args) => {
                let (handler, no_ack) = match channel.consumer(&args.consumer_tag) {
                    Some(consumer) => consumer,
                    None => {
                        warn!(
                            "Delivery {} for unknown consumer {} is dropped",
                            args.delivery_tag, args.consumer_tag
                        );

                        return;
                    }
                };

                let envelope = Envelope {
                    exchange: args.exchange_name,
                    routing_key: args.routing_key,
                    delivery_tag: args.delivery_tag,
                    redelivered: args.redelivered,
                    consumer_tag: Some(args.consumer_tag),
                    message_count: None,
                    synchronous: false,
                };
                let message = IncomingMessage::new(channel, envelope, header, body, no_ack);

                tokio::spawn(async move {
                    handler.handle(message).await;
                });
            }
            ContentMethod::GetOk(args) => {
                let envelope = Envelope {
                    exchange: args.exchange_name,
                    routing_key: args.routing_key,
                    delivery_tag: args.delivery_tag,
                    redelivered: args.redelivered,
                    consumer_tag: None,
                    message_count: Some(args.message_count),
                    synchronous: true,
                };
                let message = IncomingMessage::new(channel.clone(), envelope, header, body, false);

                match channel
                    .inner
                    .rpc
                    .resolve(frame::BASIC_GET_OK, Reply::Message(Box::new(message)))
                {
                    Resolution::Delivered => (),
                    Resolution::Late(Reply::Message(message)) | Resolution::Unexpected(Reply::Message(message)) => {
                        if !message.no_ack() {
                            debug!("Nobody waits for message {}, requeue it", message.delivery_tag);

                            if let Err(e) = channel.basic_reject(message.delivery_tag, true).await {
                                warn!("Cannot requeue message {:?}", e);
                            }
                        }
                    }
                    _ => (),
                }
            }
            ContentMethod::Return(args) => {
                let returned = ReturnedMessage {
                    reply_code: args.reply_code,
                    reply_text: args.reply_text,
                    exchange: args.exchange_name,
                    routing_key: args.routing_key,
                    message: Message::with_properties(body, MessageProperties::from_header(header).0),
                };

                let callbacks = channel.shared().return_callbacks.clone();

                if callbacks.is_empty() {
                    warn!(
                        "Message returned {} {} from exchange {:?} routing key {:?}",
                        returned.reply_code, returned.reply_text, returned.exchange, returned.routing_key
                    );
                }

                for callback in callbacks {
                    callback(&returned);
                }
            }
        }
    }
}
