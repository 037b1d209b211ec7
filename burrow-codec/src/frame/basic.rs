use super::{AMQPFrame, Channel, FieldTable};

/// Prefetch limits. A zero means no limit, `global` applies them to the whole channel instead of
/// each consumer.
#[derive(Debug, Default)]
pub struct BasicQosArgs {
    pub prefetch_size: u32,
    pub prefetch_count: u16,
    pub global: bool,
}

setters!(BasicQosArgs {
    prefetch_size(u32),
    prefetch_count(u16),
    global(bool),
});

method_frame!(BasicQosArgs => BasicQos, BASIC_QOS);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BasicConsumeFlags: u8 {
        const NO_LOCAL  = 1;
        const NO_ACK    = 1 << 1;
        const EXCLUSIVE = 1 << 2;
        const NO_WAIT   = 1 << 3;
    }
}

/// Starting a consumer. An empty consumer tag asks the broker to generate one.
#[derive(Debug, Default)]
pub struct BasicConsumeArgs {
    pub queue: String,
    pub consumer_tag: String,
    pub flags: BasicConsumeFlags,
    pub args: Option<FieldTable>,
}

impl BasicConsumeArgs {
    pub fn is_no_ack(&self) -> bool {
        self.flags.contains(BasicConsumeFlags::NO_ACK)
    }
}

setters!(BasicConsumeArgs {
    queue(str),
    consumer_tag(str),
    no_local(flag BasicConsumeFlags::NO_LOCAL),
    no_ack(flag BasicConsumeFlags::NO_ACK),
    exclusive(flag BasicConsumeFlags::EXCLUSIVE),
    no_wait(flag BasicConsumeFlags::NO_WAIT),
    args(Option<FieldTable>),
});

method_frame!(BasicConsumeArgs => BasicConsume, BASIC_CONSUME);

#[derive(Clone, Debug, Default)]
pub struct BasicConsumeOkArgs {
    pub consumer_tag: String,
}

impl BasicConsumeOkArgs {
    pub fn new(consumer_tag: &str) -> Self {
        Self::default().consumer_tag(consumer_tag)
    }
}

setters!(BasicConsumeOkArgs { consumer_tag(str) });

method_frame!(BasicConsumeOkArgs => BasicConsumeOk, BASIC_CONSUME_OK);

/// Cancelling a consumer. RabbitMQ sends it to the client too when the queue of the consumer
/// goes away.
#[derive(Clone, Debug, Default)]
pub struct BasicCancelArgs {
    pub consumer_tag: String,
    pub no_wait: bool,
}

impl BasicCancelArgs {
    pub fn new(consumer_tag: &str) -> Self {
        Self::default().consumer_tag(consumer_tag)
    }
}

setters!(BasicCancelArgs {
    consumer_tag(str),
    no_wait(bool),
});

method_frame!(BasicCancelArgs => BasicCancel, BASIC_CANCEL);

#[derive(Clone, Debug, Default)]
pub struct BasicCancelOkArgs {
    pub consumer_tag: String,
}

impl BasicCancelOkArgs {
    pub fn new(consumer_tag: &str) -> Self {
        Self::default().consumer_tag(consumer_tag)
    }
}

setters!(BasicCancelOkArgs { consumer_tag(str) });

method_frame!(BasicCancelOkArgs => BasicCancelOk, BASIC_CANCEL_OK);

/// Fetching a single message, answered by get-ok with content or get-empty.
#[derive(Clone, Debug, Default)]
pub struct BasicGetArgs {
    pub queue: String,
    pub no_ack: bool,
}

impl BasicGetArgs {
    pub fn new(queue: &str) -> Self {
        Self::default().queue(queue)
    }
}

setters!(BasicGetArgs {
    queue(str),
    no_ack(bool),
});

method_frame!(BasicGetArgs => BasicGet, BASIC_GET);

/// Get-ok is followed by the content header and the body frames of the message. The message
/// count is the number of messages left in the queue.
#[derive(Clone, Debug, Default)]
pub struct BasicGetOkArgs {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange_name: String,
    pub routing_key: String,
    pub message_count: u32,
}

impl BasicGetOkArgs {
    pub fn new(delivery_tag: u64, exchange_name: &str) -> Self {
        Self::default().delivery_tag(delivery_tag).exchange_name(exchange_name)
    }
}

setters!(BasicGetOkArgs {
    delivery_tag(u64),
    redelivered(bool),
    exchange_name(str),
    routing_key(str),
    message_count(u32),
});

method_frame!(BasicGetOkArgs => BasicGetOk, BASIC_GET_OK);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BasicPublishFlags: u8 {
        const MANDATORY = 1;
        const IMMEDIATE = 1 << 1;
    }
}

/// Publish is followed by the content frames. A mandatory message which cannot be routed comes
/// back in a basic-return.
#[derive(Clone, Debug, Default)]
pub struct BasicPublishArgs {
    pub exchange_name: String,
    pub routing_key: String,
    pub flags: BasicPublishFlags,
}

impl BasicPublishArgs {
    pub fn new(exchange_name: &str) -> Self {
        Self::default().exchange_name(exchange_name)
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags.contains(BasicPublishFlags::MANDATORY)
    }

    pub fn is_immediate(&self) -> bool {
        self.flags.contains(BasicPublishFlags::IMMEDIATE)
    }
}

setters!(BasicPublishArgs {
    exchange_name(str),
    routing_key(str),
    mandatory(flag BasicPublishFlags::MANDATORY),
    immediate(flag BasicPublishFlags::IMMEDIATE),
});

method_frame!(BasicPublishArgs => BasicPublish, BASIC_PUBLISH);

#[derive(Clone, Debug, Default)]
pub struct BasicReturnArgs {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange_name: String,
    pub routing_key: String,
}

impl BasicReturnArgs {
    pub fn new(reply_code: u16, reply_text: &str) -> Self {
        Self::default().reply_code(reply_code).reply_text(reply_text)
    }
}

setters!(BasicReturnArgs {
    reply_code(u16),
    reply_text(str),
    exchange_name(str),
    routing_key(str),
});

method_frame!(BasicReturnArgs => BasicReturn, BASIC_RETURN);

/// Delivery of a message to a consumer, the content frames follow.
#[derive(Clone, Debug, Default)]
pub struct BasicDeliverArgs {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange_name: String,
    pub routing_key: String,
}

impl BasicDeliverArgs {
    pub fn new(consumer_tag: &str, delivery_tag: u64, exchange_name: &str) -> Self {
        Self::default()
            .consumer_tag(consumer_tag)
            .delivery_tag(delivery_tag)
            .exchange_name(exchange_name)
    }
}

setters!(BasicDeliverArgs {
    consumer_tag(str),
    delivery_tag(u64),
    redelivered(bool),
    exchange_name(str),
    routing_key(str),
});

method_frame!(BasicDeliverArgs => BasicDeliver, BASIC_DELIVER);

/// Acknowledgement of a delivery, or with `multiple` of every delivery up to the tag. In confirm
/// mode the broker sends it to confirm publishes.
#[derive(Clone, Debug, Default)]
pub struct BasicAckArgs {
    pub delivery_tag: u64,
    pub multiple: bool,
}

setters!(BasicAckArgs {
    delivery_tag(u64),
    multiple(bool),
});

method_frame!(BasicAckArgs => BasicAck, BASIC_ACK);

#[derive(Clone, Debug, Default)]
pub struct BasicRejectArgs {
    pub delivery_tag: u64,
    pub requeue: bool,
}

setters!(BasicRejectArgs {
    delivery_tag(u64),
    requeue(bool),
});

method_frame!(BasicRejectArgs => BasicReject, BASIC_REJECT);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BasicNackFlags: u8 {
        const MULTIPLE = 1;
        const REQUEUE  = 1 << 1;
    }
}

/// Negative acknowledgement, the RabbitMQ extension which can reject many deliveries at once.
#[derive(Clone, Debug, Default)]
pub struct BasicNackArgs {
    pub delivery_tag: u64,
    pub flags: BasicNackFlags,
}

impl BasicNackArgs {
    pub fn is_multiple(&self) -> bool {
        self.flags.contains(BasicNackFlags::MULTIPLE)
    }
}

setters!(BasicNackArgs {
    delivery_tag(u64),
    multiple(flag BasicNackFlags::MULTIPLE),
    requeue(flag BasicNackFlags::REQUEUE),
});

method_frame!(BasicNackArgs => BasicNack, BASIC_NACK);

#[derive(Clone, Debug, Default)]
pub struct BasicRecoverArgs {
    pub requeue: bool,
}

setters!(BasicRecoverArgs { requeue(bool) });

method_frame!(BasicRecoverArgs => BasicRecover, BASIC_RECOVER);

/// Switching the channel to publisher confirm mode.
#[derive(Clone, Debug, Default)]
pub struct ConfirmSelectArgs {
    pub no_wait: bool,
}

setters!(ConfirmSelectArgs { no_wait(bool) });

method_frame!(ConfirmSelectArgs => ConfirmSelect, CONFIRM_SELECT);

empty_frames! {
    basic_qos_ok => BasicQosOk, BASIC_QOS_OK;
    basic_get_empty => BasicGetEmpty, BASIC_GET_EMPTY;
    basic_recover_ok => BasicRecoverOk, BASIC_RECOVER_OK;
    confirm_select_ok => ConfirmSelectOk, CONFIRM_SELECT_OK;
}

pub fn confirm_select(channel: Channel) -> AMQPFrame {
    ConfirmSelectArgs::default().frame(channel)
}
