use super::FieldTable;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct QueueDeclareFlags: u8 {
        const PASSIVE     = 1;
        const DURABLE     = 1 << 1;
        const EXCLUSIVE   = 1 << 2;
        const AUTO_DELETE = 1 << 3;
        const NO_WAIT     = 1 << 4;
    }
}

/// Declaring a queue. An empty name asks the broker to generate one, declare-ok returns it.
#[derive(Debug, Default)]
pub struct QueueDeclareArgs {
    pub name: String,
    pub flags: QueueDeclareFlags,
    pub args: Option<FieldTable>,
}

setters!(QueueDeclareArgs {
    name(str),
    passive(flag QueueDeclareFlags::PASSIVE),
    durable(flag QueueDeclareFlags::DURABLE),
    exclusive(flag QueueDeclareFlags::EXCLUSIVE),
    auto_delete(flag QueueDeclareFlags::AUTO_DELETE),
    no_wait(flag QueueDeclareFlags::NO_WAIT),
    args(Option<FieldTable>),
});

method_frame!(QueueDeclareArgs => QueueDeclare, QUEUE_DECLARE);

/// The declared (or generated) queue name with its current counters.
#[derive(Debug, Default)]
pub struct QueueDeclareOkArgs {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

setters!(QueueDeclareOkArgs {
    name(str),
    message_count(u32),
    consumer_count(u32),
});

method_frame!(QueueDeclareOkArgs => QueueDeclareOk, QUEUE_DECLARE_OK);

#[derive(Debug, Default)]
pub struct QueueBindArgs {
    pub queue_name: String,
    pub exchange_name: String,
    pub routing_key: String,
    pub no_wait: bool,
    pub args: Option<FieldTable>,
}

impl QueueBindArgs {
    pub fn new(queue_name: &str, exchange_name: &str) -> Self {
        Self::default().queue_name(queue_name).exchange_name(exchange_name)
    }
}

setters!(QueueBindArgs {
    queue_name(str),
    exchange_name(str),
    routing_key(str),
    args(Option<FieldTable>),
});

method_frame!(QueueBindArgs => QueueBind, QUEUE_BIND);

/// Unbind has no `no_wait` field, the broker always answers it.
#[derive(Debug, Default)]
pub struct QueueUnbindArgs {
    pub queue_name: String,
    pub exchange_name: String,
    pub routing_key: String,
    pub args: Option<FieldTable>,
}

impl QueueUnbindArgs {
    pub fn new(queue_name: &str, exchange_name: &str) -> Self {
        Self::default().queue_name(queue_name).exchange_name(exchange_name)
    }
}

setters!(QueueUnbindArgs {
    queue_name(str),
    exchange_name(str),
    routing_key(str),
    args(Option<FieldTable>),
});

method_frame!(QueueUnbindArgs => QueueUnbind, QUEUE_UNBIND);

#[derive(Debug, Default)]
pub struct QueuePurgeArgs {
    pub queue_name: String,
    pub no_wait: bool,
}

setters!(QueuePurgeArgs { queue_name(str) });

method_frame!(QueuePurgeArgs => QueuePurge, QUEUE_PURGE);

/// Number of messages removed by the purge.
#[derive(Debug, Default)]
pub struct QueuePurgeOkArgs {
    pub message_count: u32,
}

setters!(QueuePurgeOkArgs { message_count(u32) });

method_frame!(QueuePurgeOkArgs => QueuePurgeOk, QUEUE_PURGE_OK);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct QueueDeleteFlags: u8 {
        const IF_UNUSED = 1;
        const IF_EMPTY  = 1 << 1;
        const NO_WAIT   = 1 << 2;
    }
}

/// Deleting a queue, optionally only when it has no consumers or no messages.
#[derive(Debug, Default)]
pub struct QueueDeleteArgs {
    pub queue_name: String,
    pub flags: QueueDeleteFlags,
}

setters!(QueueDeleteArgs {
    queue_name(str),
    if_unused(flag QueueDeleteFlags::IF_UNUSED),
    if_empty(flag QueueDeleteFlags::IF_EMPTY),
    no_wait(flag QueueDeleteFlags::NO_WAIT),
});

method_frame!(QueueDeleteArgs => QueueDelete, QUEUE_DELETE);

/// Number of messages dropped together with the queue.
#[derive(Debug, Default)]
pub struct QueueDeleteOkArgs {
    pub message_count: u32,
}

setters!(QueueDeleteOkArgs { message_count(u32) });

method_frame!(QueueDeleteOkArgs => QueueDeleteOk, QUEUE_DELETE_OK);

empty_frames! {
    queue_bind_ok => QueueBindOk, QUEUE_BIND_OK;
    queue_unbind_ok => QueueUnbindOk, QUEUE_UNBIND_OK;
}
