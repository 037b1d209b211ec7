use super::FieldTable;

bitflags! {
    /// Bits of the exchange declare flag octet, in wire order.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ExchangeDeclareFlags: u8 {
        const PASSIVE     = 1;
        const DURABLE     = 1 << 1;
        const AUTO_DELETE = 1 << 2;
        const INTERNAL    = 1 << 3;
        const NO_WAIT     = 1 << 4;
    }
}

/// Declaring an exchange. A passive declare only checks that the exchange exists, the type and
/// the other flags are ignored then.
#[derive(Debug, Default)]
pub struct ExchangeDeclareArgs {
    pub exchange_name: String,
    pub exchange_type: String,
    pub flags: ExchangeDeclareFlags,
    pub args: Option<FieldTable>,
}

impl ExchangeDeclareArgs {
    pub fn new(exchange_name: &str, exchange_type: &str) -> Self {
        Self::default().exchange_name(exchange_name).exchange_type(exchange_type)
    }
}

setters!(ExchangeDeclareArgs {
    exchange_name(str),
    exchange_type(str),
    passive(flag ExchangeDeclareFlags::PASSIVE),
    durable(flag ExchangeDeclareFlags::DURABLE),
    auto_delete(flag ExchangeDeclareFlags::AUTO_DELETE),
    internal(flag ExchangeDeclareFlags::INTERNAL),
    no_wait(flag ExchangeDeclareFlags::NO_WAIT),
    args(Option<FieldTable>),
});

method_frame!(ExchangeDeclareArgs => ExchangeDeclare, EXCHANGE_DECLARE);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ExchangeDeleteFlags: u8 {
        const IF_UNUSED = 1;
        const NO_WAIT   = 1 << 1;
    }
}

/// Deleting an exchange, with `if_unused` the broker refuses it while queues are bound to it.
#[derive(Debug, Default)]
pub struct ExchangeDeleteArgs {
    pub exchange_name: String,
    pub flags: ExchangeDeleteFlags,
}

setters!(ExchangeDeleteArgs {
    exchange_name(str),
    if_unused(flag ExchangeDeleteFlags::IF_UNUSED),
    no_wait(flag ExchangeDeleteFlags::NO_WAIT),
});

method_frame!(ExchangeDeleteArgs => ExchangeDelete, EXCHANGE_DELETE);

empty_frames! {
    exchange_declare_ok => ExchangeDeclareOk, EXCHANGE_DECLARE_OK;
    exchange_delete_ok => ExchangeDeleteOk, EXCHANGE_DELETE_OK;
}
