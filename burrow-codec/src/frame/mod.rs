//! Frame model of AMQP 0-9-1.
//!
//! Every method has an argument struct (or none when the method carries no fields) with builder
//! style setters, and a `frame` function which wraps it into an [`AMQPFrame`] ready to be
//! encoded.

/// Builder setters of argument structs. `str` setters copy the value, `flag` setters switch one
/// bit of the `flags` field, anything else is stored as it is.
macro_rules! setters {
    ($args:ident { $($setter:ident($($kind:tt)+)),* $(,)? }) => {
        impl $args {
            $(setters!(@setter $setter $($kind)+);)*
        }
    };
    (@setter $setter:ident str) => {
        pub fn $setter(mut self, value: &str) -> Self {
            self.$setter = value.to_string();
            self
        }
    };
    (@setter $setter:ident flag $flags:ident::$bit:ident) => {
        pub fn $setter(mut self, value: bool) -> Self {
            self.flags.set($flags::$bit, value);
            self
        }
    };
    (@setter $setter:ident $value:ty) => {
        pub fn $setter(mut self, value: $value) -> Self {
            self.$setter = value;
            self
        }
    };
}

/// Implements `frame` for argument structs. Connection level methods always travel on
/// channel 0, so their `frame` doesn't take a channel.
macro_rules! method_frame {
    (connection $args:ident => $variant:ident, $class_method:ident) => {
        impl $args {
            pub fn frame(self) -> $crate::frame::AMQPFrame {
                $crate::frame::AMQPFrame::Method(
                    0,
                    $crate::frame::$class_method,
                    $crate::frame::MethodFrameArgs::$variant(self),
                )
            }
        }
    };
    ($args:ident => $variant:ident, $class_method:ident) => {
        impl $args {
            pub fn frame(self, channel: $crate::frame::Channel) -> $crate::frame::AMQPFrame {
                $crate::frame::AMQPFrame::Method(
                    channel,
                    $crate::frame::$class_method,
                    $crate::frame::MethodFrameArgs::$variant(self),
                )
            }
        }
    };
}

/// Functions building the method frames which don't carry any arguments.
macro_rules! empty_frames {
    ($($(#[$meta:meta])* $name:ident => $variant:ident, $class_method:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(channel: $crate::frame::Channel) -> $crate::frame::AMQPFrame {
                $crate::frame::AMQPFrame::Method(
                    channel,
                    $crate::frame::$class_method,
                    $crate::frame::MethodFrameArgs::$variant,
                )
            }
        )*
    };
}

mod basic;
mod channel;
mod connection;
mod exchange;
mod queue;

pub use self::{
    basic::{
        basic_get_empty, basic_qos_ok, basic_recover_ok, confirm_select, confirm_select_ok, BasicAckArgs,
        BasicCancelArgs, BasicCancelOkArgs, BasicConsumeArgs, BasicConsumeFlags, BasicConsumeOkArgs, BasicDeliverArgs,
        BasicGetArgs, BasicGetOkArgs, BasicNackArgs, BasicNackFlags, BasicPublishArgs, BasicPublishFlags,
        BasicQosArgs, BasicRecoverArgs, BasicRejectArgs, BasicReturnArgs, ConfirmSelectArgs,
    },
    channel::{
        channel_close, channel_close_ok, channel_flow_ok, channel_open, channel_open_ok, ChannelCloseArgs,
        ChannelFlowArgs,
    },
    connection::{
        connection_close, connection_close_ok, connection_open_ok, ConnectionBlockedArgs, ConnectionCloseArgs,
        ConnectionOpenArgs, ConnectionStartArgs, ConnectionStartOkArgs, ConnectionTuneArgs, ConnectionTuneOkArgs,
    },
    exchange::{
        exchange_declare_ok, exchange_delete_ok, ExchangeDeclareArgs, ExchangeDeclareFlags, ExchangeDeleteArgs,
        ExchangeDeleteFlags,
    },
    queue::{
        queue_bind_ok, queue_unbind_ok, QueueBindArgs, QueueDeclareArgs, QueueDeclareFlags, QueueDeclareOkArgs,
        QueueDeleteArgs, QueueDeleteFlags, QueueDeleteOkArgs, QueuePurgeArgs, QueuePurgeOkArgs, QueueUnbindArgs,
    },
};
use std::collections::HashMap;

pub type Channel = u16;
pub type ClassMethod = u32;
pub type ClassId = u16;
pub type Weight = u16;

pub const CONNECTION_CLASS: ClassId = 10;
pub const CHANNEL_CLASS: ClassId = 20;
pub const EXCHANGE_CLASS: ClassId = 40;
pub const QUEUE_CLASS: ClassId = 50;
/// Content headers of messages carry the id of the basic class.
pub const BASIC_CLASS: ClassId = 60;
pub const CONFIRM_CLASS: ClassId = 85;

pub const CONNECTION_START: ClassMethod = unify_class_method(CONNECTION_CLASS, 10);
pub const CONNECTION_START_OK: ClassMethod = unify_class_method(CONNECTION_CLASS, 11);
pub const CONNECTION_TUNE: ClassMethod = unify_class_method(CONNECTION_CLASS, 30);
pub const CONNECTION_TUNE_OK: ClassMethod = unify_class_method(CONNECTION_CLASS, 31);
pub const CONNECTION_OPEN: ClassMethod = unify_class_method(CONNECTION_CLASS, 40);
pub const CONNECTION_OPEN_OK: ClassMethod = unify_class_method(CONNECTION_CLASS, 41);
pub const CONNECTION_CLOSE: ClassMethod = unify_class_method(CONNECTION_CLASS, 50);
pub const CONNECTION_CLOSE_OK: ClassMethod = unify_class_method(CONNECTION_CLASS, 51);
pub const CONNECTION_BLOCKED: ClassMethod = unify_class_method(CONNECTION_CLASS, 60);
pub const CONNECTION_UNBLOCKED: ClassMethod = unify_class_method(CONNECTION_CLASS, 61);

pub const CHANNEL_OPEN: ClassMethod = unify_class_method(CHANNEL_CLASS, 10);
pub const CHANNEL_OPEN_OK: ClassMethod = unify_class_method(CHANNEL_CLASS, 11);
pub const CHANNEL_FLOW: ClassMethod = unify_class_method(CHANNEL_CLASS, 20);
pub const CHANNEL_FLOW_OK: ClassMethod = unify_class_method(CHANNEL_CLASS, 21);
pub const CHANNEL_CLOSE: ClassMethod = unify_class_method(CHANNEL_CLASS, 40);
pub const CHANNEL_CLOSE_OK: ClassMethod = unify_class_method(CHANNEL_CLASS, 41);

pub const EXCHANGE_DECLARE: ClassMethod = unify_class_method(EXCHANGE_CLASS, 10);
pub const EXCHANGE_DECLARE_OK: ClassMethod = unify_class_method(EXCHANGE_CLASS, 11);
pub const EXCHANGE_DELETE: ClassMethod = unify_class_method(EXCHANGE_CLASS, 20);
pub const EXCHANGE_DELETE_OK: ClassMethod = unify_class_method(EXCHANGE_CLASS, 21);

pub const QUEUE_DECLARE: ClassMethod = unify_class_method(QUEUE_CLASS, 10);
pub const QUEUE_DECLARE_OK: ClassMethod = unify_class_method(QUEUE_CLASS, 11);
pub const QUEUE_BIND: ClassMethod = unify_class_method(QUEUE_CLASS, 20);
pub const QUEUE_BIND_OK: ClassMethod = unify_class_method(QUEUE_CLASS, 21);
pub const QUEUE_PURGE: ClassMethod = unify_class_method(QUEUE_CLASS, 30);
pub const QUEUE_PURGE_OK: ClassMethod = unify_class_method(QUEUE_CLASS, 31);
pub const QUEUE_DELETE: ClassMethod = unify_class_method(QUEUE_CLASS, 40);
pub const QUEUE_DELETE_OK: ClassMethod = unify_class_method(QUEUE_CLASS, 41);
pub const QUEUE_UNBIND: ClassMethod = unify_class_method(QUEUE_CLASS, 50);
pub const QUEUE_UNBIND_OK: ClassMethod = unify_class_method(QUEUE_CLASS, 51);

pub const BASIC_QOS: ClassMethod = unify_class_method(BASIC_CLASS, 10);
pub const BASIC_QOS_OK: ClassMethod = unify_class_method(BASIC_CLASS, 11);
pub const BASIC_CONSUME: ClassMethod = unify_class_method(BASIC_CLASS, 20);
pub const BASIC_CONSUME_OK: ClassMethod = unify_class_method(BASIC_CLASS, 21);
pub const BASIC_CANCEL: ClassMethod = unify_class_method(BASIC_CLASS, 30);
pub const BASIC_CANCEL_OK: ClassMethod = unify_class_method(BASIC_CLASS, 31);
pub const BASIC_PUBLISH: ClassMethod = unify_class_method(BASIC_CLASS, 40);
pub const BASIC_RETURN: ClassMethod = unify_class_method(BASIC_CLASS, 50);
pub const BASIC_DELIVER: ClassMethod = unify_class_method(BASIC_CLASS, 60);
pub const BASIC_GET: ClassMethod = unify_class_method(BASIC_CLASS, 70);
pub const BASIC_GET_OK: ClassMethod = unify_class_method(BASIC_CLASS, 71);
pub const BASIC_GET_EMPTY: ClassMethod = unify_class_method(BASIC_CLASS, 72);
pub const BASIC_ACK: ClassMethod = unify_class_method(BASIC_CLASS, 80);
pub const BASIC_REJECT: ClassMethod = unify_class_method(BASIC_CLASS, 90);
pub const BASIC_RECOVER: ClassMethod = unify_class_method(BASIC_CLASS, 110);
pub const BASIC_RECOVER_OK: ClassMethod = unify_class_method(BASIC_CLASS, 111);
pub const BASIC_NACK: ClassMethod = unify_class_method(BASIC_CLASS, 120);

pub const CONFIRM_SELECT: ClassMethod = unify_class_method(CONFIRM_CLASS, 10);
pub const CONFIRM_SELECT_OK: ClassMethod = unify_class_method(CONFIRM_CLASS, 11);

/// Combines a class id and a method id into the single value the frames carry.
pub const fn unify_class_method(class: ClassId, method: u16) -> ClassMethod {
    ((class as u32) << 16) | method as u32
}

/// Inverse of [`unify_class_method`].
pub const fn split_class_method(class_method: ClassMethod) -> (ClassId, u16) {
    ((class_method >> 16) as u16, class_method as u16)
}

/// One unit of the wire protocol.
pub enum AMQPFrame {
    /// The `AMQP0091` protocol header, the first bytes a client sends.
    Header,
    /// Method frame. Connection methods go on channel 0, the rest on the channel they belong to.
    Method(Channel, ClassMethod, MethodFrameArgs),
    ContentHeader(ContentHeaderFrame),
    ContentBody(ContentBodyFrame),
    Heartbeat(Channel),
}

impl AMQPFrame {
    pub fn channel(&self) -> Channel {
        match self {
            AMQPFrame::Header => 0,
            AMQPFrame::Method(channel, _, _) | AMQPFrame::Heartbeat(channel) => *channel,
            AMQPFrame::ContentHeader(header) => header.channel,
            AMQPFrame::ContentBody(body) => body.channel,
        }
    }
}

impl std::fmt::Debug for AMQPFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AMQPFrame::Header => f.write_str("Header"),
            AMQPFrame::Method(channel, class_method, args) => {
                let (class_id, method_id) = split_class_method(*class_method);

                write!(f, "Method({} {}.{} {:?})", channel, class_id, method_id, args)
            }
            AMQPFrame::ContentHeader(header) => f.debug_tuple("ContentHeader").field(header).finish(),
            AMQPFrame::ContentBody(body) => f.debug_tuple("ContentBody").field(body).finish(),
            AMQPFrame::Heartbeat(channel) => write!(f, "Heartbeat({})", channel),
        }
    }
}

impl From<ContentHeaderFrame> for AMQPFrame {
    fn from(header: ContentHeaderFrame) -> AMQPFrame {
        header.frame()
    }
}

impl From<ContentBodyFrame> for AMQPFrame {
    fn from(body: ContentBodyFrame) -> AMQPFrame {
        body.frame()
    }
}

/// Arguments of the method frames, one variant per method. Methods without fields have unit
/// variants.
#[derive(Debug)]
pub enum MethodFrameArgs {
    ConnectionStart(ConnectionStartArgs),
    ConnectionStartOk(ConnectionStartOkArgs),
    ConnectionTune(ConnectionTuneArgs),
    ConnectionTuneOk(ConnectionTuneOkArgs),
    ConnectionOpen(ConnectionOpenArgs),
    ConnectionOpenOk,
    ConnectionClose(ConnectionCloseArgs),
    ConnectionCloseOk,
    ConnectionBlocked(ConnectionBlockedArgs),
    ConnectionUnblocked,

    ChannelOpen,
    ChannelOpenOk,
    ChannelFlow(ChannelFlowArgs),
    ChannelFlowOk(ChannelFlowArgs),
    ChannelClose(ChannelCloseArgs),
    ChannelCloseOk,

    ExchangeDeclare(ExchangeDeclareArgs),
    ExchangeDeclareOk,
    ExchangeDelete(ExchangeDeleteArgs),
    ExchangeDeleteOk,

    QueueDeclare(QueueDeclareArgs),
    QueueDeclareOk(QueueDeclareOkArgs),
    QueueBind(QueueBindArgs),
    QueueBindOk,
    QueuePurge(QueuePurgeArgs),
    QueuePurgeOk(QueuePurgeOkArgs),
    QueueDelete(QueueDeleteArgs),
    QueueDeleteOk(QueueDeleteOkArgs),
    QueueUnbind(QueueUnbindArgs),
    QueueUnbindOk,

    BasicQos(BasicQosArgs),
    BasicQosOk,
    BasicConsume(BasicConsumeArgs),
    BasicConsumeOk(BasicConsumeOkArgs),
    BasicCancel(BasicCancelArgs),
    BasicCancelOk(BasicCancelOkArgs),
    BasicGet(BasicGetArgs),
    BasicGetOk(BasicGetOkArgs),
    BasicGetEmpty,
    BasicPublish(BasicPublishArgs),
    BasicReturn(BasicReturnArgs),
    BasicDeliver(BasicDeliverArgs),
    BasicAck(BasicAckArgs),
    BasicReject(BasicRejectArgs),
    BasicNack(BasicNackArgs),
    BasicRecover(BasicRecoverArgs),
    BasicRecoverOk,

    ConfirmSelect(ConfirmSelectArgs),
    ConfirmSelectOk,
}

bitflags! {
    /// Presence bits of the basic properties, the first property is the highest bit.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct HeaderPropertyFlags: u16 {
        const CONTENT_TYPE     = 1 << 15;
        const CONTENT_ENCODING = 1 << 14;
        const HEADERS          = 1 << 13;
        const DELIVERY_MODE    = 1 << 12;
        const PRIORITY         = 1 << 11;
        const CORRELATION_ID   = 1 << 10;
        const REPLY_TO         = 1 << 9;
        const EXPIRATION       = 1 << 8;
        const MESSAGE_ID       = 1 << 7;
        const TIMESTAMP        = 1 << 6;
        const MESSAGE_TYPE     = 1 << 5;
        const USER_ID          = 1 << 4;
        const APP_ID           = 1 << 3;
        const CLUSTER_ID       = 1 << 2;
    }
}

/// Content header of a message: the size of the body which follows and the basic properties.
///
/// The property flags are not stored, the encoder derives them from the properties present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentHeaderFrame {
    pub channel: Channel,
    pub class_id: ClassId,
    pub weight: Weight,
    pub body_size: u64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
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
    pub cluster_id: Option<String>,
}

impl ContentHeaderFrame {
    /// Header of a basic message without properties.
    pub fn new(channel: Channel, body_size: u64) -> Self {
        Self {
            channel,
            class_id: BASIC_CLASS,
            body_size,
            ..Default::default()
        }
    }

    pub fn property_flags(&self) -> HeaderPropertyFlags {
        let present = [
            (HeaderPropertyFlags::CONTENT_TYPE, self.content_type.is_some()),
            (HeaderPropertyFlags::CONTENT_ENCODING, self.content_encoding.is_some()),
            (HeaderPropertyFlags::HEADERS, self.headers.is_some()),
            (HeaderPropertyFlags::DELIVERY_MODE, self.delivery_mode.is_some()),
            (HeaderPropertyFlags::PRIORITY, self.priority.is_some()),
            (HeaderPropertyFlags::CORRELATION_ID, self.correlation_id.is_some()),
            (HeaderPropertyFlags::REPLY_TO, self.reply_to.is_some()),
            (HeaderPropertyFlags::EXPIRATION, self.expiration.is_some()),
            (HeaderPropertyFlags::MESSAGE_ID, self.message_id.is_some()),
            (HeaderPropertyFlags::TIMESTAMP, self.timestamp.is_some()),
            (HeaderPropertyFlags::MESSAGE_TYPE, self.message_type.is_some()),
            (HeaderPropertyFlags::USER_ID, self.user_id.is_some()),
            (HeaderPropertyFlags::APP_ID, self.app_id.is_some()),
            (HeaderPropertyFlags::CLUSTER_ID, self.cluster_id.is_some()),
        ];

        present
            .into_iter()
            .filter(|(_, is_set)| *is_set)
            .fold(HeaderPropertyFlags::empty(), |flags, (flag, _)| flags | flag)
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentHeader(self)
    }
}

/// One slice of a message body. Bodies larger than the negotiated frame size span more frames.
#[derive(Clone, PartialEq)]
pub struct ContentBodyFrame {
    pub channel: Channel,
    pub body: Vec<u8>,
}

impl ContentBodyFrame {
    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentBody(self)
    }
}

impl std::fmt::Debug for ContentBodyFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview = &self.body[..self.body.len().min(64)];

        f.debug_struct("ContentBodyFrame")
            .field("channel", &self.channel)
            .field("len", &self.body.len())
            .field("body", &String::from_utf8_lossy(preview))
            .finish()
    }
}

pub type FieldTable = HashMap<String, AMQPFieldValue>;

/// Values of field tables and field arrays, one variant per type tag RabbitMQ understands.
#[derive(Clone, Debug, PartialEq)]
pub enum AMQPFieldValue {
    Bool(bool),
    ShortShortInt(i8),
    ShortShortUInt(u8),
    ShortInt(i16),
    ShortUInt(u16),
    LongInt(i32),
    LongUInt(u32),
    LongLongInt(i64),
    Float(f32),
    Double(f64),
    Decimal(u8, u32),
    LongString(String),
    ByteArray(Vec<u8>),
    FieldArray(Vec<AMQPFieldValue>),
    Timestamp(u64),
    FieldTable(Box<FieldTable>),
    Void,
}

macro_rules! field_value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$from> for AMQPFieldValue {
                fn from(value: $from) -> Self {
                    AMQPFieldValue::$variant(value)
                }
            }
        )*
    };
}

field_value_from! {
    bool => Bool,
    i8 => ShortShortInt,
    u8 => ShortShortUInt,
    i16 => ShortInt,
    u16 => ShortUInt,
    i32 => LongInt,
    u32 => LongUInt,
    i64 => LongLongInt,
    f32 => Float,
    f64 => Double,
    String => LongString,
    Vec<AMQPFieldValue> => FieldArray,
}

impl From<&str> for AMQPFieldValue {
    fn from(value: &str) -> Self {
        AMQPFieldValue::LongString(value.to_string())
    }
}

impl From<FieldTable> for AMQPFieldValue {
    fn from(value: FieldTable) -> Self {
        AMQPFieldValue::FieldTable(Box::new(value))
    }
}

pub fn heartbeat() -> AMQPFrame {
    AMQPFrame::Heartbeat(0)
}
