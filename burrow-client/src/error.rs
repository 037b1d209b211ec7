use crate::model::{ChannelNumber, ClassMethod};
use burrow_codec::frame;
use std::fmt;

/// Category of a client error, it decides whether the failed operation can be retried and what
/// needs to be rebuilt after the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server refused the credentials during the handshake.
    Authentication,
    /// The connection is refused, lost or closed. Every channel of the connection is closed.
    Connection,
    /// The channel is closed by the server or by the client, a new channel needs to be opened.
    ChannelClosed,
    /// A bounded wait exceeded its deadline, the channel is still usable.
    Timeout,
    /// The message is already acked or rejected.
    MessageProcess,
    /// The message was delivered in no-ack mode, so it cannot be acked or rejected.
    NotAckable,
    /// The server refused to take responsibility of a published message.
    Delivery,
}

/// Represents a connection or channel error. If `channel` is `None` it is a
/// connection error.
#[derive(Clone, Debug)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub channel: Option<ChannelNumber>,
    pub code: u16,
    pub message: String,
    pub class_method: ClassMethod,
}

impl ClientError {
    pub fn new(
        kind: ErrorKind,
        channel: Option<ChannelNumber>,
        code: u16,
        message: impl Into<String>,
        class_method: ClassMethod,
    ) -> Self {
        Self {
            kind,
            channel,
            code,
            message: message.into(),
            class_method,
        }
    }

    /// The basic.get found the queue empty. It has `Timeout` kind, what distinguishes it from an
    /// elapsed deadline is the `basic.get-empty` class method.
    pub fn is_queue_empty(&self) -> bool {
        self.kind == ErrorKind::Timeout && self.class_method == frame::BASIC_GET_EMPTY
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientError")
            .field("kind", &self.kind)
            .field("channel", &self.channel)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("class_method", &format!("{:08X}", &self.class_method))
            .finish()
    }
}

impl std::error::Error for ClientError {}

/// Returns the kind of the error if it is a `ClientError`.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<ClientError>().map(|e| e.kind)
}

/// Shorthand for creating errors in async functions.
#[macro_export]
macro_rules! client_error {
    ($kind:expr, $channel:expr, $code:expr, $message:expr, $cm:expr) => {
        ::std::result::Result::Err(anyhow::Error::new($crate::error::ClientError {
            kind: $kind,
            channel: $channel,
            code: $code,
            message: ::std::string::String::from($message),
            class_method: $cm,
        }))
    };
}
