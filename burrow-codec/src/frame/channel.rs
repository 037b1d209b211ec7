use super::{split_class_method, AMQPFrame, Channel, ClassId, ClassMethod};

/// Closing a channel, either on request or because the peer refused a method. In the latter case
/// `class_id` and `method_id` point to the offending method.
#[derive(Debug, Default)]
pub struct ChannelCloseArgs {
    pub code: u16,
    pub text: String,
    pub class_id: ClassId,
    pub method_id: u16,
}

impl ChannelCloseArgs {
    pub fn new(code: u16, text: &str, class_method: ClassMethod) -> Self {
        let (class_id, method_id) = split_class_method(class_method);

        Self {
            code,
            text: text.to_string(),
            class_id,
            method_id,
        }
    }
}

method_frame!(ChannelCloseArgs => ChannelClose, CHANNEL_CLOSE);

/// Flow control: the peer asks to pause (`active = false`) or resume content delivery.
#[derive(Debug, Default)]
pub struct ChannelFlowArgs {
    pub active: bool,
}

impl ChannelFlowArgs {
    pub fn new(active: bool) -> Self {
        Self { active }
    }
}

method_frame!(ChannelFlowArgs => ChannelFlow, CHANNEL_FLOW);

empty_frames! {
    channel_open => ChannelOpen, CHANNEL_OPEN;
    channel_open_ok => ChannelOpenOk, CHANNEL_OPEN_OK;
    channel_close_ok => ChannelCloseOk, CHANNEL_CLOSE_OK;
}

/// Flow-ok echoes the state the peer asked for.
pub fn channel_flow_ok(channel: Channel, active: bool) -> AMQPFrame {
    AMQPFrame::Method(
        channel,
        super::CHANNEL_FLOW_OK,
        super::MethodFrameArgs::ChannelFlowOk(ChannelFlowArgs::new(active)),
    )
}

pub fn channel_close(channel: Channel, code: u16, text: &str, class_method: ClassMethod) -> AMQPFrame {
    ChannelCloseArgs::new(code, text, class_method).frame(channel)
}
