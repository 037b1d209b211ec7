//! Pairing of synchronous AMQP commands with their replies.
//!
//! The server answers the synchronous commands of a channel in the order they were sent, so one
//! request is in flight per channel and replies are matched against it by class method. A caller
//! which gives up (deadline or cancellation) leaves an abandoned entry behind, so the late reply
//! is recognised and discarded instead of being handed to the next request.
use crate::error::{ClientError, ErrorKind};
use crate::message::IncomingMessage;
use crate::model::{ChannelNumber, ClassMethod};
use anyhow::Result;
use burrow_codec::codec::Frame;
use burrow_codec::frame::{self, BasicRejectArgs, MethodFrameArgs};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// The reply of a synchronous command. A `basic.get-ok` carries the whole assembled message.
#[derive(Debug)]
pub(crate) enum Reply {
    Method(MethodFrameArgs),
    Message(Box<IncomingMessage>),
}

impl Reply {
    fn set_no_ack(&mut self, no_ack: bool) {
        if let Reply::Message(message) = self {
            message.no_ack = no_ack;
        }
    }
}

pub(crate) enum Resolution {
    /// The reply is handed to the waiting caller.
    Delivered,
    /// The caller of the request gave up already.
    Late(Reply),
    /// Nobody expects this reply.
    Unexpected(Reply),
}

struct Waiter {
    id: u64,
    expect: &'static [ClassMethod],
    no_ack: bool,
    tx: oneshot::Sender<Result<Reply, ClientError>>,
}

struct Abandoned {
    expect: &'static [ClassMethod],
    no_ack: bool,
}

enum State {
    Open,
    Closing(ClientError),
    Closed(ClientError),
}

struct Pending {
    next_id: u64,
    waiter: Option<Waiter>,
    abandoned: VecDeque<Abandoned>,
    state: State,
}

pub(crate) struct Correlator {
    channel: ChannelNumber,
    order: tokio::sync::Mutex<()>,
    pending: Mutex<Pending>,
}

/// Removes the waiter if the call future is dropped before the reply arrives. If the request had
/// been sent, its reply is still expected. A message handed over but never taken by the caller
/// goes back to the queue.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    outgoing: &'a mpsc::Sender<Frame>,
    id: u64,
    rx: oneshot::Receiver<Result<Reply, ClientError>>,
    sent: bool,
    done: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        {
            let mut pending = self.correlator.lock();

            match pending.waiter.take() {
                Some(waiter) if waiter.id == self.id => {
                    if self.sent {
                        trace!(
                            "Channel {} abandons request waiting for {:08X?}",
                            self.correlator.channel,
                            waiter.expect
                        );

                        pending.abandoned.push_back(Abandoned {
                            expect: waiter.expect,
                            no_ack: waiter.no_ack,
                        });
                    }
                }
                other => pending.waiter = other,
            }
        }

        if let Ok(Ok(Reply::Message(message))) = self.rx.try_recv() {
            if !message.no_ack() {
                self.correlator.requeue(self.outgoing, message.delivery_tag);
            }
        }
    }
}

impl Correlator {
    pub(crate) fn new(channel: ChannelNumber) -> Self {
        Self {
            channel,
            order: tokio::sync::Mutex::new(()),
            pending: Mutex::new(Pending {
                next_id: 0,
                waiter: None,
                abandoned: VecDeque::new(),
                state: State::Open,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channel_id(&self) -> Option<ChannelNumber> {
        if self.channel == 0 {
            None
        } else {
            Some(self.channel)
        }
    }

    /// Sends a synchronous command and waits for one of the `expect`ed replies. The deadline
    /// covers the wait for the preceding requests too.
    pub(crate) async fn call(
        &self,
        outgoing: &mpsc::Sender<Frame>,
        frame: Frame,
        expect: &'static [ClassMethod],
        request: ClassMethod,
        no_ack: bool,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let exchange = async {
            let _order = self.order.lock().await;
            let (id, rx) = self.register(expect, no_ack)?;
            let mut guard = PendingGuard {
                correlator: self,
                outgoing,
                id,
                rx,
                sent: false,
                done: false,
            };

            if outgoing.send(frame).await.is_err() {
                return client_error!(
                    ErrorKind::Connection,
                    None,
                    0,
                    "Connection is closed",
                    request
                );
            }

            guard.sent = true;

            let reply = (&mut guard.rx).await;

            guard.done = true;

            match reply {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(err)) => Err(anyhow::Error::new(err)),
                Err(_) => client_error!(
                    ErrorKind::ChannelClosed,
                    self.channel_id(),
                    0,
                    "Channel is closed",
                    request
                ),
            }
        };

        match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, exchange).await {
                Ok(result) => result,
                Err(_) => client_error!(
                    ErrorKind::Timeout,
                    self.channel_id(),
                    0,
                    format!("No reply in {:?}", deadline),
                    request
                ),
            },
            None => exchange.await,
        }
    }

    fn register(
        &self,
        expect: &'static [ClassMethod],
        no_ack: bool,
    ) -> Result<(u64, oneshot::Receiver<Result<Reply, ClientError>>)> {
        let mut pending = self.lock();

        match &pending.state {
            State::Open => (),
            State::Closing(_) if is_close_reply(expect) => (),
            State::Closing(err) | State::Closed(err) => return Err(anyhow::Error::new(err.clone())),
        }

        let (tx, rx) = oneshot::channel();
        let id = pending.next_id;

        pending.next_id += 1;
        pending.waiter = Some(Waiter { id, expect, no_ack, tx });

        Ok((id, rx))
    }

    /// Hands over a reply to the waiting caller.
    pub(crate) fn resolve(&self, class_method: ClassMethod, mut reply: Reply) -> Resolution {
        let mut pending = self.lock();

        if let Some(front) = pending.abandoned.front() {
            if front.expect.contains(&class_method) {
                reply.set_no_ack(front.no_ack);
                pending.abandoned.pop_front();

                return Resolution::Late(reply);
            }
        }

        match pending.waiter.take() {
            Some(waiter) if waiter.expect.contains(&class_method) => {
                reply.set_no_ack(waiter.no_ack);

                match waiter.tx.send(Ok(reply)) {
                    Ok(()) => Resolution::Delivered,
                    Err(Ok(reply)) => Resolution::Late(reply),
                    Err(Err(_)) => Resolution::Delivered,
                }
            }
            other => {
                pending.waiter = other;

                warn!(
                    "Channel {} got unexpected reply {:08X}",
                    self.channel, class_method
                );

                Resolution::Unexpected(reply)
            }
        }
    }

    /// Gives back a fetched message nobody is going to process.
    fn requeue(&self, outgoing: &mpsc::Sender<Frame>, delivery_tag: u64) {
        debug!(
            "Channel {} has nobody waiting for message {}, requeue it",
            self.channel, delivery_tag
        );

        let frame = BasicRejectArgs::default()
            .delivery_tag(delivery_tag)
            .requeue(true)
            .frame(self.channel);

        match outgoing.try_send(frame.into()) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(frame)) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let outgoing = outgoing.clone();

                    handle.spawn(async move {
                        let _ = outgoing.send(frame).await;
                    });
                }
                Err(_) => warn!("Cannot requeue message {}, no runtime", delivery_tag),
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Cannot requeue message {}, connection is closed", delivery_tag)
            }
        }
    }

    /// Refuses new requests except the close handshake. The pending request fails but its reply
    /// may still arrive before the close confirmation.
    pub(crate) fn begin_close(&self, err: ClientError) {
        let mut pending = self.lock();

        if let Some(waiter) = pending.waiter.take() {
            pending.abandoned.push_back(Abandoned {
                expect: waiter.expect,
                no_ack: waiter.no_ack,
            });

            let _ = waiter.tx.send(Err(err.clone()));
        }

        if let State::Open = pending.state {
            pending.state = State::Closing(err);
        }
    }

    /// Fails the pending request and every later one with `err`.
    pub(crate) fn fail_all(&self, err: ClientError) {
        let mut pending = self.lock();

        if let Some(waiter) = pending.waiter.take() {
            let _ = waiter.tx.send(Err(err.clone()));
        }

        pending.abandoned.clear();
        pending.state = State::Closed(err);
    }
}

fn is_close_reply(expect: &[ClassMethod]) -> bool {
    expect.contains(&frame::CHANNEL_CLOSE_OK) || expect.contains(&frame::CONNECTION_CLOSE_OK)
}
